// handlers/tarefas/update.rs - PUT /tarefas/:id handler

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Extension, Path, State,
    },
    response::Json,
};
use uuid::Uuid;

use crate::auth::Principal;
use crate::database::models::{Task, TaskPatch};
use crate::error::ApiError;
use crate::state::AppState;

/**
 * PUT /tarefas/:id - Partially update a task
 *
 * Requires the `update:tasks` scope. Keys missing from the body keep their
 * stored value; `null` clears `titulo` or `descricao`. `concluida` cannot be
 * null.
 *
 * @returns 200 with the task as stored after the update, 404 if no task has this id
 */
pub async fn tarefa_update(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<Uuid>, PathRejection>,
    body: Result<Json<TaskPatch>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Path(id) = id?;
    let Json(patch) = body?;
    patch.validate()?;

    let task = state
        .store
        .update(id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Tarefa não encontrada"))?;

    tracing::info!("Task {} updated by {}", task.id, principal.subject);
    Ok(Json(task))
}
