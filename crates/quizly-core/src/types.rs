use serde::{Deserialize, Serialize};

use crate::question::Question;
use crate::video::VideoReference;

/// Quiz ID format: `qz_<ulid>`
pub type QuizId = String;

/// Attempt ID format: `att_<ulid>`
pub type AttemptId = String;

/// Opaque user reference owned by the (out-of-scope) auth layer.
pub type UserId = String;

pub fn new_quiz_id() -> QuizId {
    format!("qz_{}", ulid::Ulid::new().to_string().to_lowercase())
}

pub fn new_attempt_id() -> AttemptId {
    format!("att_{}", ulid::Ulid::new().to_string().to_lowercase())
}

pub fn now_rfc3339() -> String {
    let now = time::OffsetDateTime::now_utc();
    now.format(&time::format_description::well_known::Rfc3339)
        .expect("RFC3339 formatting should not fail")
}

/// One time-aligned span of transcribed speech.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptSegment {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

/// Plain-text rendering of a video's spoken content.
///
/// Transcripts live only for the duration of quiz generation; the store
/// never persists them on their own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<TranscriptSegment>,
}

impl Transcript {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            segments: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// An ordered set of multiple-choice questions derived from one transcript.
/// Immutable after creation except for store-level soft delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: QuizId,
    pub owner: UserId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub video: VideoReference,
    pub questions: Vec<Question>,
    pub created_at: String,
}

/// Listing row for a quiz: everything but the question bodies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: QuizId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub video: VideoReference,
    pub question_count: usize,
    pub created_at: String,
}

/// One user's submitted answers to a quiz plus the computed score.
/// `answers[i]` is the chosen candidate index for question `i`, or `None`
/// if unanswered. Immutable once scored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: AttemptId,
    pub quiz_id: QuizId,
    pub user: UserId,
    pub answers: Vec<Option<usize>>,
    /// Whole-number percentage, 0..=100, rounded half-up.
    pub score: u8,
    /// Per-question correctness, same order as the quiz's questions.
    pub breakdown: Vec<bool>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_id_has_prefix() {
        let id = new_quiz_id();
        assert!(id.starts_with("qz_"));
        assert_eq!(id.len(), "qz_".len() + 26);
    }

    #[test]
    fn attempt_id_has_prefix() {
        assert!(new_attempt_id().starts_with("att_"));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(new_quiz_id(), new_quiz_id());
    }

    #[test]
    fn now_rfc3339_parses_back() {
        let ts = now_rfc3339();
        assert!(time::OffsetDateTime::parse(
            &ts,
            &time::format_description::well_known::Rfc3339
        )
        .is_ok());
    }

    #[test]
    fn empty_transcript_detected() {
        assert!(Transcript::from_text("   \n").is_empty());
        assert!(!Transcript::from_text("hello").is_empty());
    }
}
