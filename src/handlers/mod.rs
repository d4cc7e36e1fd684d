// handlers/mod.rs - Route handlers
//
// Public (no auth) → Protected (bearer token, plus a scope for writes)

pub mod health;   // GET /health
pub mod tarefas;  // /tarefas CRUD

pub use health::health;
