use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use quizly_core::{ProviderFailure, Transcript, VideoReference};

use crate::backoff::Backoff;
use crate::provider::{MediaFetcher, MediaProbe, SpeechToText};

/// Transcript acquisition failures. Everything surfaces; nothing is
/// silently swallowed so the caller can report a specific reason.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("source is unreachable: {0}")]
    UnreachableSource(String),
    #[error("unsupported media format: {0}")]
    UnsupportedFormat(String),
    #[error("video is {duration_secs:.0}s long, exceeding the {max_secs}s limit")]
    DurationExceeded { duration_secs: f64, max_secs: u64 },
    #[error("transcription provider failed: {0}")]
    Provider(String),
    #[error("provider call timed out during {0}")]
    Timeout(&'static str),
}

#[derive(Debug, Clone)]
pub struct AcquireConfig {
    /// Videos longer than this are rejected up front to bound downstream
    /// transcription and generation cost.
    pub max_duration_secs: u64,
    /// Container/extension allowlist checked against the probe result.
    pub supported_formats: Vec<String>,
    pub probe_timeout: Duration,
    pub fetch_timeout: Duration,
    pub transcribe_timeout: Duration,
    pub backoff: Backoff,
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: 1800,
            supported_formats: ["mp4", "webm", "mkv", "m4a", "mp3", "wav", "ogg"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            probe_timeout: Duration::from_secs(30),
            fetch_timeout: Duration::from_secs(600),
            transcribe_timeout: Duration::from_secs(900),
            backoff: Backoff::default(),
        }
    }
}

/// Resolves a video reference to a transcript: probe, duration gate,
/// download, transcribe. Stateless apart from configuration.
pub struct Acquirer {
    fetcher: Arc<dyn MediaFetcher>,
    stt: Arc<dyn SpeechToText>,
    config: AcquireConfig,
}

impl Acquirer {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        stt: Arc<dyn SpeechToText>,
        config: AcquireConfig,
    ) -> Self {
        Self {
            fetcher,
            stt,
            config,
        }
    }

    /// Acquire a transcript for `video`.
    ///
    /// The probe runs first so oversized or unsupported sources are
    /// rejected before any download or transcription cost is paid.
    pub async fn acquire(
        &self,
        video: &VideoReference,
        cancel: CancellationToken,
    ) -> Result<Transcript, AcquireError> {
        let probe = self.probe(video, &cancel).await?;
        tracing::debug!(
            video = %video,
            duration_secs = probe.duration_secs,
            format = %probe.format,
            "probed source"
        );

        if probe.duration_secs > self.config.max_duration_secs as f64 {
            return Err(AcquireError::DurationExceeded {
                duration_secs: probe.duration_secs,
                max_secs: self.config.max_duration_secs,
            });
        }
        let format = probe.format.to_lowercase();
        if !self.config.supported_formats.iter().any(|f| *f == format) {
            return Err(AcquireError::UnsupportedFormat(probe.format));
        }

        let audio = self.fetch(video, &cancel).await?;
        let transcript = self.transcribe(&audio, &cancel).await?;

        if transcript.is_empty() {
            return Err(AcquireError::UnsupportedFormat(
                "no speech detected in source audio".into(),
            ));
        }
        tracing::info!(video = %video, chars = transcript.text.len(), "transcript acquired");
        Ok(transcript)
    }

    async fn probe(
        &self,
        video: &VideoReference,
        cancel: &CancellationToken,
    ) -> Result<MediaProbe, AcquireError> {
        let fetcher = &self.fetcher;
        self.with_retry("probe", self.config.probe_timeout, cancel, || {
            fetcher.probe(video, cancel.child_token())
        })
        .await
        .map_err(|e| match e {
            RetryError::Exhausted(f) | RetryError::Permanent(f) => {
                AcquireError::UnreachableSource(f.to_string())
            }
            RetryError::Timeout => AcquireError::Timeout("probe"),
        })
    }

    async fn fetch(
        &self,
        video: &VideoReference,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, AcquireError> {
        let fetcher = &self.fetcher;
        self.with_retry("fetch", self.config.fetch_timeout, cancel, || {
            fetcher.fetch(video, cancel.child_token())
        })
        .await
        .map_err(|e| match e {
            RetryError::Exhausted(f) | RetryError::Permanent(f) => {
                AcquireError::UnreachableSource(f.to_string())
            }
            RetryError::Timeout => AcquireError::Timeout("fetch"),
        })
    }

    async fn transcribe(
        &self,
        audio: &std::path::Path,
        cancel: &CancellationToken,
    ) -> Result<Transcript, AcquireError> {
        let stt = &self.stt;
        self.with_retry("transcribe", self.config.transcribe_timeout, cancel, || {
            stt.transcribe(audio, cancel.child_token())
        })
        .await
        .map_err(|e| match e {
            RetryError::Exhausted(f) | RetryError::Permanent(f) => {
                AcquireError::Provider(f.to_string())
            }
            RetryError::Timeout => AcquireError::Timeout("transcribe"),
        })
    }

    /// Run one provider call with a per-call timeout, retrying transient
    /// and rate-limited failures per the backoff schedule. Permanent
    /// failures and timeouts surface immediately.
    async fn with_retry<T, F, Fut>(
        &self,
        what: &'static str,
        timeout: Duration,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderFailure>>,
    {
        let backoff = &self.config.backoff;
        let mut attempt = 1u32;
        loop {
            let outcome = tokio::time::timeout(timeout, op()).await;
            let failure = match outcome {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(failure)) => failure,
                Err(_) => return Err(RetryError::Timeout),
            };

            if !failure.is_retryable() {
                return Err(RetryError::Permanent(failure));
            }
            if !backoff.attempts_left(attempt) || cancel.is_cancelled() {
                return Err(RetryError::Exhausted(failure));
            }

            let delay = match failure {
                ProviderFailure::RateLimited => backoff.rate_limited_delay(attempt),
                _ => backoff.delay(attempt),
            };
            tracing::warn!(%failure, attempt, delay_ms = delay.as_millis() as u64, "retrying {what}");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

enum RetryError {
    Permanent(ProviderFailure),
    Exhausted(ProviderFailure),
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockFetcher, MockSpeechToText};

    fn video() -> VideoReference {
        VideoReference::Url("https://youtu.be/dQw4w9WgXcQ".into())
    }

    fn fast_config() -> AcquireConfig {
        AcquireConfig {
            backoff: Backoff {
                max_attempts: 3,
                base: Duration::from_millis(1),
                cap: Duration::from_millis(5),
            },
            ..Default::default()
        }
    }

    fn acquirer(fetcher: MockFetcher, stt: MockSpeechToText, config: AcquireConfig) -> Acquirer {
        Acquirer::new(Arc::new(fetcher), Arc::new(stt), config)
    }

    #[tokio::test]
    async fn happy_path_returns_transcript() {
        let a = acquirer(
            MockFetcher::new(),
            MockSpeechToText::new("hello world from the video"),
            fast_config(),
        );
        let t = a.acquire(&video(), CancellationToken::new()).await.unwrap();
        assert_eq!(t.text, "hello world from the video");
    }

    #[tokio::test]
    async fn over_long_video_is_rejected() {
        let fetcher = MockFetcher::new().with_probe(MediaProbe {
            duration_secs: 3600.0,
            format: "mp4".into(),
            title: None,
        });
        let a = acquirer(fetcher, MockSpeechToText::new("unused"), fast_config());
        let err = a.acquire(&video(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            AcquireError::DurationExceeded { max_secs: 1800, .. }
        ));
    }

    #[tokio::test]
    async fn duration_gate_skips_fetch_and_transcription() {
        let fetcher = Arc::new(MockFetcher::new().with_probe(MediaProbe {
            duration_secs: 7200.0,
            format: "mp4".into(),
            title: None,
        }));
        let stt = Arc::new(MockSpeechToText::new("unused"));
        let a = Acquirer::new(fetcher.clone(), stt.clone(), fast_config());

        let err = a.acquire(&video(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AcquireError::DurationExceeded { .. }));
        assert_eq!(fetcher.fetch_calls(), 0);
        assert_eq!(stt.calls(), 0);
    }

    #[tokio::test]
    async fn unsupported_format_is_rejected() {
        let fetcher = MockFetcher::new().with_probe(MediaProbe {
            duration_secs: 60.0,
            format: "wmv".into(),
            title: None,
        });
        let a = acquirer(fetcher, MockSpeechToText::new("unused"), fast_config());
        let err = a.acquire(&video(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AcquireError::UnsupportedFormat(f) if f == "wmv"));
    }

    #[tokio::test]
    async fn transient_probe_failure_is_retried() {
        let fetcher = MockFetcher::new();
        fetcher.script_probe(vec![
            Err(ProviderFailure::Transient("connection reset".into())),
            Ok(MediaProbe {
                duration_secs: 60.0,
                format: "mp4".into(),
                title: None,
            }),
        ]);
        let fetcher = Arc::new(fetcher);
        let a = Acquirer::new(
            fetcher.clone(),
            Arc::new(MockSpeechToText::new("recovered")),
            fast_config(),
        );

        let t = a.acquire(&video(), CancellationToken::new()).await.unwrap();
        assert_eq!(t.text, "recovered");
        assert_eq!(fetcher.probe_calls(), 2);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let fetcher = MockFetcher::new();
        fetcher.script_probe(vec![Err(ProviderFailure::Permanent(
            "video unavailable".into(),
        ))]);
        let fetcher = Arc::new(fetcher);
        let a = Acquirer::new(
            fetcher.clone(),
            Arc::new(MockSpeechToText::new("unused")),
            fast_config(),
        );

        let err = a.acquire(&video(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AcquireError::UnreachableSource(_)));
        assert_eq!(fetcher.probe_calls(), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let fetcher = MockFetcher::new();
        fetcher.script_probe(vec![
            Err(ProviderFailure::Transient("1".into())),
            Err(ProviderFailure::Transient("2".into())),
            Err(ProviderFailure::Transient("3".into())),
            Err(ProviderFailure::Transient("4".into())),
        ]);
        let fetcher = Arc::new(fetcher);
        let a = Acquirer::new(
            fetcher.clone(),
            Arc::new(MockSpeechToText::new("unused")),
            fast_config(),
        );

        let err = a.acquire(&video(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AcquireError::UnreachableSource(_)));
        assert_eq!(fetcher.probe_calls(), 3);
    }

    #[tokio::test]
    async fn empty_transcript_is_an_error() {
        let a = acquirer(MockFetcher::new(), MockSpeechToText::new("   "), fast_config());
        let err = a.acquire(&video(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AcquireError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn transcription_timeout_surfaces_as_timeout() {
        let config = AcquireConfig {
            transcribe_timeout: Duration::from_millis(10),
            ..fast_config()
        };
        let a = acquirer(MockFetcher::new(), MockSpeechToText::hanging(), config);
        let err = a.acquire(&video(), CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AcquireError::Timeout("transcribe")));
    }
}
