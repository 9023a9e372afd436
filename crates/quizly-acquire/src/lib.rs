//! Transcript acquisition: resolve a video reference to a plain-text
//! transcript via external media and speech-to-text providers.
//!
//! The Acquirer owns the transport retry policy: transient provider
//! failures are retried with bounded exponential backoff, permanent ones
//! surface immediately. Videos over the configured duration limit are
//! rejected before any download happens.

pub mod acquirer;
pub mod backoff;
pub mod provider;
pub mod whisper;
pub mod ytdlp;

pub use acquirer::{AcquireConfig, AcquireError, Acquirer};
pub use backoff::Backoff;
pub use provider::{MediaFetcher, MediaProbe, MockFetcher, MockSpeechToText, SpeechToText};
pub use whisper::WhisperCli;
pub use ytdlp::YtDlpFetcher;
