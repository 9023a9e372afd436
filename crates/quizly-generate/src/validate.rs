use quizly_core::Question;

use crate::parse::{map_question, RawQuiz};

/// Deterministic post-validation: map each raw question and keep only the
/// ones satisfying the structural invariants. Order is preserved.
pub fn valid_questions(raw: &RawQuiz) -> Vec<Question> {
    raw.questions
        .iter()
        .filter_map(|r| {
            let q = map_question(r)?;
            match q.validate() {
                Ok(()) => Some(q),
                Err(reason) => {
                    tracing::debug!(%reason, prompt = %r.question_title, "dropping invalid question");
                    None
                }
            }
        })
        .collect()
}
