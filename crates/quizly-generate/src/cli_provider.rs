use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use quizly_core::ProviderFailure;

use crate::provider::TextGenerator;

/// Text generation via a local model CLI: the prompt is piped to stdin and
/// the completion read from stdout. The command is configurable so the
/// deployment chooses the vendor (e.g. `llm -m <model>`, `claude -p -`).
pub struct CliTextGenerator {
    pub bin: PathBuf,
    pub args: Vec<String>,
}

impl CliTextGenerator {
    pub fn new(bin: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            bin: bin.into(),
            args,
        }
    }

    /// Check that the model CLI is reachable.
    pub fn verify_available(&self) -> anyhow::Result<()> {
        let status = std::process::Command::new(&self.bin)
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => Ok(()),
            _ => anyhow::bail!("model CLI not found (looked for {:?})", self.bin),
        }
    }
}

#[async_trait::async_trait]
impl TextGenerator for CliTextGenerator {
    async fn complete(
        &self,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<String, ProviderFailure> {
        let mut cmd = tokio::process::Command::new(&self.bin);
        cmd.args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            ProviderFailure::Permanent(format!("failed to launch {:?}: {e}", self.bin))
        })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderFailure::Permanent("failed to open model CLI stdin".into()))?;
        stdin
            .write_all(prompt.as_bytes())
            .await
            .map_err(|e| ProviderFailure::Transient(format!("writing prompt failed: {e}")))?;
        drop(stdin); // close stdin so the CLI starts generating

        let output = tokio::select! {
            out = child.wait_with_output() => out.map_err(|e| {
                ProviderFailure::Transient(format!("model CLI did not exit cleanly: {e}"))
            })?,
            _ = cancel.cancelled() => {
                return Err(ProviderFailure::Permanent("cancelled".into()));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lower = stderr.to_lowercase();
            if lower.contains("429") || lower.contains("rate limit") {
                return Err(ProviderFailure::RateLimited);
            }
            return Err(ProviderFailure::Transient(format!(
                "model CLI exited with {}: {}",
                output.status,
                stderr.lines().last().unwrap_or("").trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(ProviderFailure::Transient("model returned no content".into()));
        }
        Ok(text)
    }
}
