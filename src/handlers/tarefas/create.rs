// handlers/tarefas/create.rs - POST /tarefas handler

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::StatusCode,
    response::Json,
};

use crate::auth::Principal;
use crate::database::models::{NewTask, Task};
use crate::error::ApiError;
use crate::state::AppState;

/**
 * POST /tarefas - Create a task
 *
 * Requires the `create:tasks` scope.
 *
 * Expected Input (every key optional):
 * ```json
 * {
 *   "titulo": "string",
 *   "descricao": "string",
 *   "concluida": false
 * }
 * ```
 *
 * @returns 201 with the stored task, including its generated `id`
 */
pub async fn tarefa_create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<NewTask>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let Json(new_task) = body?;

    let task = state.store.insert(new_task).await?;
    tracing::info!("Task {} created by {}", task.id, principal.subject);

    Ok((StatusCode::CREATED, Json(task)))
}
