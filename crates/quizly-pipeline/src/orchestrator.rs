use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use quizly_acquire::{AcquireError, Acquirer};
use quizly_core::{Attempt, Quiz, QuizId, QuizSummary, Transcript, UserId, VideoReference};
use quizly_generate::{GenerateError, Generator};
use quizly_score::{build_attempt, ScoreError};
use quizly_store::{QuizStore, StoreError};

use crate::task::{TaskState, TaskStatus};

/// Top-level error surfaced to the API layer. Component errors propagate
/// unchanged; nothing here swallows or reclassifies them.
#[derive(Debug, Error)]
pub enum QuizlyError {
    #[error(transparent)]
    Acquire(#[from] AcquireError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Score(#[from] ScoreError),
    #[error("operation was cancelled")]
    Cancelled,
    #[error("creation task failed: {0}")]
    Internal(String),
}

/// Handle to one spawned quiz-creation task.
///
/// The watch receiver exposes the task's observable state so callers can
/// poll or subscribe; `cancel()` aborts outstanding provider calls and
/// guarantees nothing is persisted afterwards.
pub struct CreationHandle {
    pub task_id: String,
    status: watch::Receiver<TaskState>,
    cancel: CancellationToken,
    join: JoinHandle<Result<Quiz, QuizlyError>>,
}

impl CreationHandle {
    /// Latest published snapshot of the task.
    pub fn status(&self) -> TaskState {
        self.status.borrow().clone()
    }

    /// A receiver the API layer can hold onto for change notifications.
    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.status.clone()
    }

    /// Request cancellation of the in-flight task.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the task to finish and return its outcome.
    pub async fn await_result(self) -> Result<Quiz, QuizlyError> {
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(QuizlyError::Cancelled),
            Err(e) => Err(QuizlyError::Internal(e.to_string())),
        }
    }
}

/// Sequences the pipeline: Acquirer → Generator → Store for creation,
/// Store → Scorer → Store for submission. The store is the only shared
/// mutable resource; everything else is per-task.
pub struct Orchestrator {
    acquirer: Acquirer,
    generator: Generator,
    store: Mutex<QuizStore>,
}

impl Orchestrator {
    pub fn new(acquirer: Acquirer, generator: Generator, store: QuizStore) -> Self {
        Self {
            acquirer,
            generator,
            store: Mutex::new(store),
        }
    }

    /// Create a quiz end to end, awaiting completion in place.
    ///
    /// Long-running: both provider stages run within this call. Nothing is
    /// persisted unless every stage succeeds.
    pub async fn create_quiz(
        &self,
        video: VideoReference,
        user: UserId,
        desired_questions: Option<usize>,
        cancel: CancellationToken,
    ) -> Result<Quiz, QuizlyError> {
        let (tx, _rx) = watch::channel(TaskState::new());
        self.run_creation(video, user, desired_questions, cancel, tx)
            .await
    }

    /// Spawn quiz creation as a background task and return a handle the
    /// API layer can poll, await, or cancel.
    pub fn spawn_create_quiz(
        self: &Arc<Self>,
        video: VideoReference,
        user: UserId,
        desired_questions: Option<usize>,
    ) -> CreationHandle {
        let state = TaskState::new();
        let task_id = state.task_id.clone();
        let (tx, rx) = watch::channel(state);
        let cancel = CancellationToken::new();

        let orchestrator = Arc::clone(self);
        let token = cancel.clone();
        let join = tokio::spawn(async move {
            orchestrator
                .run_creation(video, user, desired_questions, token, tx)
                .await
        });

        CreationHandle {
            task_id,
            status: rx,
            cancel,
            join,
        }
    }

    async fn run_creation(
        &self,
        video: VideoReference,
        user: UserId,
        desired_questions: Option<usize>,
        cancel: CancellationToken,
        tx: watch::Sender<TaskState>,
    ) -> Result<Quiz, QuizlyError> {
        let task_id = tx.borrow().task_id.clone();
        tracing::info!(%task_id, %video, "quiz creation started");

        set_status(&tx, TaskStatus::Acquiring);
        let transcript: Transcript = match self.acquirer.acquire(&video, cancel.child_token()).await
        {
            Ok(t) => t,
            Err(e) => return Err(finish_failed(&tx, &cancel, e.into())),
        };
        if cancel.is_cancelled() {
            return Err(finish_cancelled(&tx));
        }

        set_status(&tx, TaskStatus::Generating);
        let quiz = match self
            .generator
            .generate(
                &transcript,
                &user,
                &video,
                desired_questions,
                cancel.child_token(),
            )
            .await
        {
            Ok(q) => q,
            Err(e) => return Err(finish_failed(&tx, &cancel, e.into())),
        };

        // A cancellation that lands before persistence still wins: no quiz
        // becomes visible for a request the caller abandoned.
        if cancel.is_cancelled() {
            return Err(finish_cancelled(&tx));
        }
        if let Err(e) = self.store.lock().unwrap().save_quiz(&quiz) {
            return Err(finish_failed(&tx, &cancel, e.into()));
        }

        tx.send_modify(|s| {
            if let Err(e) = s.complete(quiz.id.clone()) {
                tracing::error!(%task_id, %e, "task state out of sync");
            }
        });
        tracing::info!(%task_id, quiz_id = %quiz.id, questions = quiz.questions.len(), "quiz created");
        Ok(quiz)
    }

    /// Load the quiz, score the submission, persist the attempt.
    pub fn submit_attempt(
        &self,
        quiz_id: &QuizId,
        user: &UserId,
        answers: Vec<Option<usize>>,
    ) -> Result<Attempt, QuizlyError> {
        let store = self.store.lock().unwrap();
        let quiz = store.get_quiz(quiz_id)?;
        let attempt = build_attempt(&quiz, user, answers)?;
        store.save_attempt(&attempt)?;
        tracing::info!(attempt_id = %attempt.id, %quiz_id, score = attempt.score, "attempt scored");
        Ok(attempt)
    }

    /// A user's quizzes, newest first.
    pub fn list_quizzes(&self, user: &UserId) -> Result<Vec<QuizSummary>, QuizlyError> {
        Ok(self.store.lock().unwrap().list_for_user(user)?)
    }

    /// Soft-delete a quiz on behalf of `user`.
    pub fn delete_quiz(&self, quiz_id: &QuizId, user: &UserId) -> Result<(), QuizlyError> {
        Ok(self.store.lock().unwrap().soft_delete(quiz_id, user)?)
    }
}

fn set_status(tx: &watch::Sender<TaskState>, to: TaskStatus) {
    tx.send_modify(|s| {
        if let Err(e) = s.advance(to) {
            tracing::error!(%e, "task state out of sync");
        }
    });
}

/// A stage failed. If the failure raced with a cancellation request, the
/// cancellation wins and is what the caller sees.
fn finish_failed(
    tx: &watch::Sender<TaskState>,
    cancel: &CancellationToken,
    error: QuizlyError,
) -> QuizlyError {
    if cancel.is_cancelled() {
        return finish_cancelled(tx);
    }
    let message = error.to_string();
    tx.send_modify(|s| {
        if let Err(e) = s.fail(&message) {
            tracing::error!(%e, "task state out of sync");
        }
    });
    tracing::warn!(%error, "quiz creation failed");
    error
}

fn finish_cancelled(tx: &watch::Sender<TaskState>) -> QuizlyError {
    tx.send_modify(|s| {
        if let Err(e) = s.advance(TaskStatus::Cancelled) {
            tracing::error!(%e, "task state out of sync");
        }
    });
    QuizlyError::Cancelled
}
