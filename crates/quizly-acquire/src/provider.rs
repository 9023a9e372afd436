use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use quizly_core::{ProviderFailure, Transcript, VideoReference};

/// What a fetcher learns about a video before downloading it.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaProbe {
    pub duration_secs: f64,
    /// Container/codec extension as reported by the source, e.g. "mp4".
    pub format: String,
    pub title: Option<String>,
}

/// Resolves a video reference to a downloaded audio file.
#[async_trait::async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Inspect the source without downloading it.
    async fn probe(
        &self,
        video: &VideoReference,
        cancel: CancellationToken,
    ) -> Result<MediaProbe, ProviderFailure>;

    /// Download the source's audio and return the local file path.
    async fn fetch(
        &self,
        video: &VideoReference,
        cancel: CancellationToken,
    ) -> Result<PathBuf, ProviderFailure>;
}

/// Turns an audio file into a transcript.
#[async_trait::async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(
        &self,
        audio: &Path,
        cancel: CancellationToken,
    ) -> Result<Transcript, ProviderFailure>;
}

// ── Test doubles ──

/// Mock fetcher for testing. Pops scripted outcomes per call; when the
/// script is exhausted it returns the configured defaults.
pub struct MockFetcher {
    probe_script: Mutex<Vec<Result<MediaProbe, ProviderFailure>>>,
    fetch_script: Mutex<Vec<Result<PathBuf, ProviderFailure>>>,
    default_probe: MediaProbe,
    default_path: PathBuf,
    probe_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            probe_script: Mutex::new(Vec::new()),
            fetch_script: Mutex::new(Vec::new()),
            default_probe: MediaProbe {
                duration_secs: 300.0,
                format: "mp4".into(),
                title: Some("Mock video".into()),
            },
            default_path: PathBuf::from("/tmp/mock-audio.mp3"),
            probe_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_probe(mut self, probe: MediaProbe) -> Self {
        self.default_probe = probe;
        self
    }

    pub fn script_probe(&self, outcomes: Vec<Result<MediaProbe, ProviderFailure>>) {
        *self.probe_script.lock().unwrap() = outcomes;
    }

    pub fn script_fetch(&self, outcomes: Vec<Result<PathBuf, ProviderFailure>>) {
        *self.fetch_script.lock().unwrap() = outcomes;
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MediaFetcher for MockFetcher {
    async fn probe(
        &self,
        _video: &VideoReference,
        _cancel: CancellationToken,
    ) -> Result<MediaProbe, ProviderFailure> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.probe_script.lock().unwrap();
        if script.is_empty() {
            Ok(self.default_probe.clone())
        } else {
            script.remove(0)
        }
    }

    async fn fetch(
        &self,
        _video: &VideoReference,
        _cancel: CancellationToken,
    ) -> Result<PathBuf, ProviderFailure> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.fetch_script.lock().unwrap();
        if script.is_empty() {
            Ok(self.default_path.clone())
        } else {
            script.remove(0)
        }
    }
}

/// Mock speech-to-text. Returns a fixed transcript, or hangs until
/// cancelled when constructed with `hanging()`.
pub struct MockSpeechToText {
    transcript: Transcript,
    hang: bool,
    calls: AtomicUsize,
}

impl MockSpeechToText {
    pub fn new(text: &str) -> Self {
        Self {
            transcript: Transcript::from_text(text),
            hang: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// A provider that never answers; only useful with a cancel token.
    pub fn hanging() -> Self {
        Self {
            transcript: Transcript::default(),
            hang: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SpeechToText for MockSpeechToText {
    async fn transcribe(
        &self,
        _audio: &Path,
        cancel: CancellationToken,
    ) -> Result<Transcript, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            cancel.cancelled().await;
            return Err(ProviderFailure::Permanent("cancelled".into()));
        }
        Ok(self.transcript.clone())
    }
}
