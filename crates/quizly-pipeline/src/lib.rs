//! Pipeline orchestration: quiz creation (acquire → generate → persist)
//! as a cancellable background task with observable states, and attempt
//! submission (load → score → persist).

pub mod orchestrator;
pub mod task;

pub use orchestrator::{CreationHandle, Orchestrator, QuizlyError};
pub use task::{TaskId, TaskState, TaskStatus};
