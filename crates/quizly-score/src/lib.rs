//! Attempt scoring: deterministic evaluation of a submission against a
//! stored quiz. Single-choice only; an unanswered position scores as
//! incorrect, there is no partial credit.

use quizly_core::{new_attempt_id, now_rfc3339, Attempt, Quiz, UserId};
use thiserror::Error;

/// The caller's submission violates an invariant. Client-input errors,
/// never retried.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ScoreError {
    #[error("quiz has no questions to score")]
    NoQuestions,
    #[error("submitted {submitted} answers for a {expected}-question quiz")]
    AnswerCountMismatch { submitted: usize, expected: usize },
    #[error("answer {index} at position {position} is not a valid candidate (question has {candidates})")]
    InvalidCandidateIndex {
        position: usize,
        index: usize,
        candidates: usize,
    },
}

/// Result of scoring one submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    /// Whole-number percentage, rounded half-up.
    pub score: u8,
    /// Per-question correctness in quiz order, for feedback display.
    pub breakdown: Vec<bool>,
    pub correct: usize,
}

/// Score a submission against a quiz.
///
/// `answers` must carry exactly one entry per question; each `Some(i)` must
/// be a valid candidate index for its question. `None` means unanswered.
pub fn score_answers(quiz: &Quiz, answers: &[Option<usize>]) -> Result<Scored, ScoreError> {
    if quiz.questions.is_empty() {
        return Err(ScoreError::NoQuestions);
    }
    if answers.len() != quiz.questions.len() {
        return Err(ScoreError::AnswerCountMismatch {
            submitted: answers.len(),
            expected: quiz.questions.len(),
        });
    }

    let mut breakdown = Vec::with_capacity(answers.len());
    for (position, (question, answer)) in quiz.questions.iter().zip(answers).enumerate() {
        if let Some(index) = answer {
            if *index >= question.candidates.len() {
                return Err(ScoreError::InvalidCandidateIndex {
                    position,
                    index: *index,
                    candidates: question.candidates.len(),
                });
            }
        }
        breakdown.push(*answer == Some(question.correct_index));
    }

    let correct = breakdown.iter().filter(|c| **c).count();
    Ok(Scored {
        score: percentage(correct, quiz.questions.len()),
        breakdown,
        correct,
    })
}

/// Score a submission and freeze it as an immutable `Attempt`.
pub fn build_attempt(
    quiz: &Quiz,
    user: &UserId,
    answers: Vec<Option<usize>>,
) -> Result<Attempt, ScoreError> {
    let scored = score_answers(quiz, &answers)?;
    Ok(Attempt {
        id: new_attempt_id(),
        quiz_id: quiz.id.clone(),
        user: user.clone(),
        answers,
        score: scored.score,
        breakdown: scored.breakdown,
        created_at: now_rfc3339(),
    })
}

/// Integer round-half-up percentage: 2/3 → 67, 1/8 → 13.
/// Callers guard against `total == 0` before reaching this.
fn percentage(correct: usize, total: usize) -> u8 {
    ((200 * correct + total) / (2 * total)) as u8
}
