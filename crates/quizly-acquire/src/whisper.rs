use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use quizly_core::{ProviderFailure, Transcript, TranscriptSegment};

use crate::provider::SpeechToText;

/// Speech-to-text backed by the `whisper` CLI. Writes a JSON transcript
/// next to the audio file and reads it back.
pub struct WhisperCli {
    pub bin: PathBuf,
    pub model: String,
    /// Where whisper writes its `<stem>.json` output.
    pub out_dir: PathBuf,
}

impl WhisperCli {
    pub fn new(out_dir: PathBuf) -> Self {
        Self {
            bin: PathBuf::from("whisper"),
            model: "base".into(),
            out_dir,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Check that the whisper binary is reachable.
    pub fn verify_available(&self) -> anyhow::Result<()> {
        let status = std::process::Command::new(&self.bin)
            .arg("--help")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => Ok(()),
            _ => anyhow::bail!("whisper not found (looked for {:?})", self.bin),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WhisperOutput {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<WhisperSegment>,
}

#[derive(Debug, Deserialize)]
struct WhisperSegment {
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default)]
    text: String,
}

fn to_transcript(out: WhisperOutput) -> Transcript {
    Transcript {
        text: out.text.trim().to_string(),
        segments: out
            .segments
            .into_iter()
            .map(|s| TranscriptSegment {
                start_secs: s.start,
                end_secs: s.end,
                text: s.text.trim().to_string(),
            })
            .collect(),
    }
}

#[async_trait::async_trait]
impl SpeechToText for WhisperCli {
    async fn transcribe(
        &self,
        audio: &Path,
        cancel: CancellationToken,
    ) -> Result<Transcript, ProviderFailure> {
        std::fs::create_dir_all(&self.out_dir).map_err(|e| {
            ProviderFailure::Permanent(format!("cannot prepare transcript directory: {e}"))
        })?;

        let mut cmd = tokio::process::Command::new(&self.bin);
        cmd.arg(audio)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(&self.out_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            ProviderFailure::Permanent(format!("failed to launch {:?}: {e}", self.bin))
        })?;

        let output = tokio::select! {
            out = child.wait_with_output() => out.map_err(|e| {
                ProviderFailure::Transient(format!("whisper did not exit cleanly: {e}"))
            })?,
            _ = cancel.cancelled() => {
                return Err(ProviderFailure::Permanent("cancelled".into()));
            }
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProviderFailure::Permanent(format!(
                "whisper failed: {}",
                stderr.lines().last().unwrap_or("unknown error").trim()
            )));
        }

        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let json_path = self.out_dir.join(format!("{stem}.json"));
        let raw = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            ProviderFailure::Permanent(format!(
                "whisper produced no transcript at {}: {e}",
                json_path.display()
            ))
        })?;
        let parsed: WhisperOutput = serde_json::from_str(&raw).map_err(|e| {
            ProviderFailure::Permanent(format!("unreadable whisper transcript: {e}"))
        })?;
        Ok(to_transcript(parsed))
    }
}
