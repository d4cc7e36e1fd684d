// handlers/tarefas/delete.rs - DELETE /tarefas/:id handler

use axum::{
    extract::{rejection::PathRejection, Extension, Path, State},
    response::Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::state::AppState;

/// DELETE /tarefas/:id - Hard delete. Requires the `delete:tasks` scope.
pub async fn tarefa_delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id?;

    if !state.store.delete(id).await? {
        return Err(ApiError::not_found("Tarefa não encontrada"));
    }

    tracing::info!("Task {} deleted by {}", id, principal.subject);
    Ok(Json(json!({ "mensagem": "Tarefa deletada com sucesso" })))
}
