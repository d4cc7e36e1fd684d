pub mod task;

pub use task::{NewTask, Task, TaskError, TaskPatch};
