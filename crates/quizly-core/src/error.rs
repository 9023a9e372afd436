use thiserror::Error;

/// Why a single generated question failed structural validation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QuestionInvalid {
    #[error("question prompt is empty")]
    EmptyPrompt,
    #[error("question has {count} candidates (expected 2–6)")]
    CandidateCount { count: usize },
    #[error("question has an empty candidate")]
    EmptyCandidate,
    #[error("duplicate candidate {text:?}")]
    DuplicateCandidate { text: String },
    #[error("correct index {index} out of range for {candidates} candidates")]
    CorrectIndexOutOfRange { index: usize, candidates: usize },
}

/// Failure reported by an external provider call, classified so the owning
/// component can decide whether a retry makes sense.
#[derive(Debug, Clone, Error)]
pub enum ProviderFailure {
    /// Worth retrying with backoff (network hiccup, 5xx-equivalent).
    #[error("transient provider failure: {0}")]
    Transient(String),
    /// Not worth retrying (bad input, unsupported media, auth).
    #[error("permanent provider failure: {0}")]
    Permanent(String),
    /// Provider asked us to slow down (HTTP 429-equivalent).
    #[error("provider rate limited the request")]
    RateLimited,
}

impl ProviderFailure {
    /// True when waiting and retrying could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderFailure::Transient(_) | ProviderFailure::RateLimited
        )
    }
}
