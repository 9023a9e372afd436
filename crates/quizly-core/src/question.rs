use serde::{Deserialize, Serialize};

use crate::error::QuestionInvalid;

/// Minimum number of candidate answers per question.
pub const MIN_CANDIDATES: usize = 2;
/// Maximum number of candidate answers per question.
pub const MAX_CANDIDATES: usize = 6;

/// One multiple-choice question: a prompt, 2–6 candidate answers in display
/// order, and the index of the correct candidate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub prompt: String,
    pub candidates: Vec<String>,
    pub correct_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    /// Check the structural invariants: non-empty prompt, 2–6 non-empty
    /// distinct candidates, correct index in bounds.
    pub fn validate(&self) -> Result<(), QuestionInvalid> {
        if self.prompt.trim().is_empty() {
            return Err(QuestionInvalid::EmptyPrompt);
        }
        if self.candidates.len() < MIN_CANDIDATES || self.candidates.len() > MAX_CANDIDATES {
            return Err(QuestionInvalid::CandidateCount {
                count: self.candidates.len(),
            });
        }
        if self.candidates.iter().any(|c| c.trim().is_empty()) {
            return Err(QuestionInvalid::EmptyCandidate);
        }
        for (i, a) in self.candidates.iter().enumerate() {
            if self.candidates[..i].contains(a) {
                return Err(QuestionInvalid::DuplicateCandidate { text: a.clone() });
            }
        }
        if self.correct_index >= self.candidates.len() {
            return Err(QuestionInvalid::CorrectIndexOutOfRange {
                index: self.correct_index,
                candidates: self.candidates.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(candidates: &[&str], correct: usize) -> Question {
        Question {
            prompt: "What is discussed?".into(),
            candidates: candidates.iter().map(|s| s.to_string()).collect(),
            correct_index: correct,
            explanation: None,
        }
    }

    #[test]
    fn valid_question_passes() {
        assert!(question(&["a", "b", "c", "d"], 2).validate().is_ok());
    }

    #[test]
    fn two_candidates_is_enough() {
        assert!(question(&["yes", "no"], 0).validate().is_ok());
    }

    #[test]
    fn empty_prompt_rejected() {
        let mut q = question(&["a", "b"], 0);
        q.prompt = "   ".into();
        assert!(matches!(q.validate(), Err(QuestionInvalid::EmptyPrompt)));
    }

    #[test]
    fn too_few_candidates_rejected() {
        assert!(matches!(
            question(&["only"], 0).validate(),
            Err(QuestionInvalid::CandidateCount { count: 1 })
        ));
    }

    #[test]
    fn too_many_candidates_rejected() {
        assert!(matches!(
            question(&["a", "b", "c", "d", "e", "f", "g"], 0).validate(),
            Err(QuestionInvalid::CandidateCount { count: 7 })
        ));
    }

    #[test]
    fn duplicate_candidates_rejected() {
        assert!(matches!(
            question(&["a", "b", "a"], 0).validate(),
            Err(QuestionInvalid::DuplicateCandidate { .. })
        ));
    }

    #[test]
    fn blank_candidate_rejected() {
        assert!(matches!(
            question(&["a", " "], 0).validate(),
            Err(QuestionInvalid::EmptyCandidate)
        ));
    }

    #[test]
    fn correct_index_out_of_range_rejected() {
        assert!(matches!(
            question(&["a", "b"], 2).validate(),
            Err(QuestionInvalid::CorrectIndexOutOfRange { index: 2, .. })
        ));
    }
}
