use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use quizly_core::{
    new_quiz_id, now_rfc3339, ProviderFailure, Quiz, Transcript, UserId, VideoReference,
};

use crate::parse::parse_quiz_payload;
use crate::prompt::quiz_prompt;
use crate::provider::TextGenerator;
use crate::validate::valid_questions;

/// Quiz generation failures.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("text-generation provider failed: {0}")]
    Provider(String),
    #[error("provider response was not a parseable quiz payload: {0}")]
    MalformedResponse(String),
    #[error("only {valid} valid questions survived validation (minimum {minimum})")]
    InsufficientValidQuestions { valid: usize, minimum: usize },
    #[error("text-generation provider timed out")]
    Timeout,
}

#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Questions requested from the provider when the caller does not ask
    /// for a specific count.
    pub question_count: usize,
    /// Candidate answers requested per question.
    pub candidate_count: usize,
    /// A generation attempt that validates to fewer questions than this
    /// fails outright instead of returning a thin quiz.
    pub min_valid_questions: usize,
    /// Bounded validate-then-retry attempts against the non-deterministic
    /// provider. Transport errors are not retried here.
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            question_count: 10,
            candidate_count: 4,
            min_valid_questions: 3,
            max_attempts: 2,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Turns a transcript into a validated quiz.
pub struct Generator {
    provider: Arc<dyn TextGenerator>,
    config: GenerateConfig,
}

impl Generator {
    pub fn new(provider: Arc<dyn TextGenerator>, config: GenerateConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &GenerateConfig {
        &self.config
    }

    /// Generate a quiz from `transcript` for `owner`.
    ///
    /// `desired_questions` overrides the configured default count. The
    /// returned quiz carries only questions that passed deterministic
    /// post-validation, never fewer than `min_valid_questions`.
    pub async fn generate(
        &self,
        transcript: &Transcript,
        owner: &UserId,
        video: &VideoReference,
        desired_questions: Option<usize>,
        cancel: CancellationToken,
    ) -> Result<Quiz, GenerateError> {
        let question_count = desired_questions.unwrap_or(self.config.question_count).max(1);
        let prompt = quiz_prompt(transcript, question_count, self.config.candidate_count);

        let mut last_failure: Option<GenerateError> = None;
        for attempt in 1..=self.config.max_attempts {
            let raw = match tokio::time::timeout(
                self.config.timeout,
                self.provider.complete(&prompt, cancel.child_token()),
            )
            .await
            {
                Ok(Ok(raw)) => raw,
                Ok(Err(failure)) => return Err(map_provider_failure(failure)),
                Err(_) => return Err(GenerateError::Timeout),
            };

            match self.build_quiz(&raw, owner, video) {
                Ok(quiz) => return Ok(quiz),
                Err(failure) => {
                    tracing::warn!(attempt, %failure, "generation attempt produced an unusable quiz");
                    last_failure = Some(failure);
                }
            }
            if cancel.is_cancelled() {
                break;
            }
        }
        Err(last_failure.unwrap_or(GenerateError::Provider("no generation attempt ran".into())))
    }

    fn build_quiz(
        &self,
        raw: &str,
        owner: &UserId,
        video: &VideoReference,
    ) -> Result<Quiz, GenerateError> {
        let payload = parse_quiz_payload(raw).map_err(GenerateError::MalformedResponse)?;
        let questions = valid_questions(&payload);
        if questions.len() < self.config.min_valid_questions {
            return Err(GenerateError::InsufficientValidQuestions {
                valid: questions.len(),
                minimum: self.config.min_valid_questions,
            });
        }

        let title = if payload.title.trim().is_empty() {
            format!("Quiz for {}", video.short_label())
        } else {
            payload.title.trim().to_string()
        };
        Ok(Quiz {
            id: new_quiz_id(),
            owner: owner.clone(),
            title,
            description: payload.description.trim().to_string(),
            video: video.clone(),
            questions,
            created_at: now_rfc3339(),
        })
    }
}

fn map_provider_failure(failure: ProviderFailure) -> GenerateError {
    GenerateError::Provider(failure.to_string())
}
