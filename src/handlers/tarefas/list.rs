// handlers/tarefas/list.rs - GET /tarefas handler

use axum::{
    extract::{Extension, State},
    response::Json,
};

use crate::auth::Principal;
use crate::database::models::Task;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /tarefas - All tasks in creation order. Any valid token may list.
pub async fn tarefa_list(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state.store.list_all().await?;
    tracing::debug!("Listed {} tasks for {}", tasks.len(), principal.subject);
    Ok(Json(tasks))
}
