use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use quizly_core::{now_rfc3339, QuizId};

/// Task ID format: `task_<ulid>`
pub type TaskId = String;

pub fn new_task_id() -> TaskId {
    format!("task_{}", ulid::Ulid::new().to_string().to_lowercase())
}

/// Observable states of one quiz-creation task. The API layer polls these
/// without the pipeline knowing anything about HTTP.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Acquiring,
    Generating,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

const VALID_TRANSITIONS: &[(TaskStatus, &[TaskStatus])] = &[
    (
        TaskStatus::Pending,
        &[TaskStatus::Acquiring, TaskStatus::Cancelled, TaskStatus::Failed],
    ),
    (
        TaskStatus::Acquiring,
        &[TaskStatus::Generating, TaskStatus::Failed, TaskStatus::Cancelled],
    ),
    (
        TaskStatus::Generating,
        &[TaskStatus::Completed, TaskStatus::Failed, TaskStatus::Cancelled],
    ),
    // Completed, Failed and Cancelled are terminal.
];

fn is_valid_transition(from: TaskStatus, to: TaskStatus) -> bool {
    VALID_TRANSITIONS
        .iter()
        .any(|(f, targets)| *f == from && targets.contains(&to))
}

/// Snapshot of one creation task, published over a watch channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub task_id: TaskId,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_id: Option<QuizId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
}

impl TaskState {
    pub fn new() -> Self {
        Self {
            task_id: new_task_id(),
            status: TaskStatus::Pending,
            quiz_id: None,
            error: None,
            started_at: now_rfc3339(),
            finished_at: None,
        }
    }

    /// Transition to `to`, stamping `finished_at` on terminal states.
    pub fn advance(&mut self, to: TaskStatus) -> Result<()> {
        if !is_valid_transition(self.status, to) {
            bail!(
                "invalid task transition: {} {:?} → {to:?}",
                self.task_id,
                self.status
            );
        }
        self.status = to;
        if to.is_terminal() {
            self.finished_at = Some(now_rfc3339());
        }
        Ok(())
    }

    pub fn complete(&mut self, quiz_id: QuizId) -> Result<()> {
        self.quiz_id = Some(quiz_id);
        self.advance(TaskStatus::Completed)
    }

    pub fn fail(&mut self, error: impl ToString) -> Result<()> {
        self.error = Some(error.to_string());
        self.advance(TaskStatus::Failed)
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_is_pending() {
        let state = TaskState::new();
        assert_eq!(state.status, TaskStatus::Pending);
        assert!(state.task_id.starts_with("task_"));
        assert!(state.finished_at.is_none());
    }

    #[test]
    fn happy_path_transitions() {
        let mut state = TaskState::new();
        state.advance(TaskStatus::Acquiring).unwrap();
        state.advance(TaskStatus::Generating).unwrap();
        state.complete("qz_x".into()).unwrap();
        assert_eq!(state.status, TaskStatus::Completed);
        assert_eq!(state.quiz_id.as_deref(), Some("qz_x"));
        assert!(state.finished_at.is_some());
    }

    #[test]
    fn skipping_a_stage_is_invalid() {
        let mut state = TaskState::new();
        assert!(state.advance(TaskStatus::Generating).is_err());
        assert!(state.advance(TaskStatus::Completed).is_err());
    }

    #[test]
    fn every_live_state_can_fail_or_cancel() {
        for live in [TaskStatus::Pending, TaskStatus::Acquiring, TaskStatus::Generating] {
            assert!(is_valid_transition(live, TaskStatus::Failed));
            assert!(is_valid_transition(live, TaskStatus::Cancelled));
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for terminal in [TaskStatus::Completed, TaskStatus::Failed, TaskStatus::Cancelled] {
            for to in [
                TaskStatus::Pending,
                TaskStatus::Acquiring,
                TaskStatus::Generating,
                TaskStatus::Completed,
                TaskStatus::Failed,
                TaskStatus::Cancelled,
            ] {
                assert!(!is_valid_transition(terminal, to));
            }
        }
    }

    #[test]
    fn fail_records_the_reason() {
        let mut state = TaskState::new();
        state.advance(TaskStatus::Acquiring).unwrap();
        state.fail("video too long").unwrap();
        assert_eq!(state.status, TaskStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("video too long"));
    }

    #[test]
    fn state_roundtrip_json() {
        let state = TaskState::new();
        let json = serde_json::to_string(&state).unwrap();
        let restored: TaskState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.status, TaskStatus::Pending);
        assert_eq!(restored.task_id, state.task_id);
    }
}
