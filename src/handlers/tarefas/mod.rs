// handlers/tarefas/mod.rs - Task collection handlers
//
// Every route here sits behind the bearer token middleware. Writes are
// additionally gated per route on the matching scope:
//   POST   /tarefas      create:tasks
//   PUT    /tarefas/:id  update:tasks
//   DELETE /tarefas/:id  delete:tasks

pub mod create;  // POST /tarefas
pub mod delete;  // DELETE /tarefas/:id
pub mod list;    // GET /tarefas
pub mod update;  // PUT /tarefas/:id

pub use create::tarefa_create;
pub use delete::tarefa_delete;
pub use list::tarefa_list;
pub use update::tarefa_update;
