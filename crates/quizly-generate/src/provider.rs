use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use quizly_core::ProviderFailure;

/// External text-generation capability: one prompt in, raw text out.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<String, ProviderFailure>;
}

/// Mock generator for testing. Pops scripted responses per call; when the
/// script is exhausted it repeats the last response.
pub struct MockTextGenerator {
    script: Mutex<Vec<Result<String, ProviderFailure>>>,
    last: Mutex<Option<Result<String, ProviderFailure>>>,
    calls: AtomicUsize,
}

impl Default for MockTextGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTextGenerator {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Vec::new()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn replying(response: &str) -> Self {
        let g = Self::new();
        g.script_responses(vec![Ok(response.to_string())]);
        g
    }

    pub fn script_responses(&self, responses: Vec<Result<String, ProviderFailure>>) {
        *self.script.lock().unwrap() = responses;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TextGenerator for MockTextGenerator {
    async fn complete(
        &self,
        _prompt: &str,
        cancel: CancellationToken,
    ) -> Result<String, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(ProviderFailure::Permanent("cancelled".into()));
        }
        let mut script = self.script.lock().unwrap();
        if script.is_empty() {
            return self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Err(ProviderFailure::Permanent("no scripted response".into())));
        }
        let next = script.remove(0);
        *self.last.lock().unwrap() = Some(next.clone());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_pops_then_repeats_last() {
        let g = MockTextGenerator::new();
        g.script_responses(vec![Ok("one".into()), Ok("two".into())]);
        let cancel = CancellationToken::new;
        assert_eq!(g.complete("p", cancel()).await.unwrap(), "one");
        assert_eq!(g.complete("p", cancel()).await.unwrap(), "two");
        assert_eq!(g.complete("p", cancel()).await.unwrap(), "two");
        assert_eq!(g.calls(), 3);
    }

    #[tokio::test]
    async fn unscripted_mock_fails() {
        let g = MockTextGenerator::new();
        assert!(g.complete("p", CancellationToken::new()).await.is_err());
    }
}
