use std::path::PathBuf;
use std::process::Stdio;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use quizly_core::{ProviderFailure, VideoReference};

use crate::provider::{MediaFetcher, MediaProbe};

/// Media fetcher backed by the `yt-dlp` CLI: probe via `--dump-json`,
/// download bestaudio extracted to mp3.
pub struct YtDlpFetcher {
    pub bin: PathBuf,
    /// Where downloaded audio files land.
    pub out_dir: PathBuf,
}

impl YtDlpFetcher {
    pub fn new(out_dir: PathBuf) -> Self {
        Self {
            bin: PathBuf::from("yt-dlp"),
            out_dir,
        }
    }

    pub fn with_bin(mut self, bin: PathBuf) -> Self {
        self.bin = bin;
        self
    }

    /// Check that the yt-dlp binary is reachable.
    pub fn verify_available(&self) -> anyhow::Result<()> {
        let status = std::process::Command::new(&self.bin)
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status();
        match status {
            Ok(s) if s.success() => Ok(()),
            _ => anyhow::bail!("yt-dlp not found (looked for {:?})", self.bin),
        }
    }

    fn url_for(video: &VideoReference) -> Result<&str, ProviderFailure> {
        match video {
            VideoReference::Url(u) => Ok(u),
            VideoReference::Upload(_) => Err(ProviderFailure::Permanent(
                "uploaded sources are resolved by the media layer, not yt-dlp".into(),
            )),
        }
    }

    async fn run(
        &self,
        args: &[&str],
        cancel: CancellationToken,
    ) -> Result<std::process::Output, ProviderFailure> {
        let mut cmd = tokio::process::Command::new(&self.bin);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            ProviderFailure::Permanent(format!("failed to launch {:?}: {e}", self.bin))
        })?;

        tokio::select! {
            out = child.wait_with_output() => {
                out.map_err(|e| ProviderFailure::Transient(format!("yt-dlp did not exit cleanly: {e}")))
            }
            _ = cancel.cancelled() => {
                // kill_on_drop reaps the child.
                Err(ProviderFailure::Permanent("cancelled".into()))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct DumpInfo {
    #[serde(default)]
    id: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Map a non-zero yt-dlp exit to a retry classification based on stderr.
fn classify_stderr(stderr: &str) -> ProviderFailure {
    let lower = stderr.to_lowercase();
    if lower.contains("429") || lower.contains("rate-limit") || lower.contains("rate limit") {
        return ProviderFailure::RateLimited;
    }
    if lower.contains("timed out")
        || lower.contains("connection")
        || lower.contains("temporary")
        || lower.contains("unable to download")
    {
        return ProviderFailure::Transient(first_line(stderr));
    }
    ProviderFailure::Permanent(first_line(stderr))
}

fn first_line(s: &str) -> String {
    s.lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("yt-dlp failed")
        .trim()
        .to_string()
}

fn parse_dump(stdout: &[u8]) -> Result<DumpInfo, ProviderFailure> {
    serde_json::from_slice(stdout)
        .map_err(|e| ProviderFailure::Permanent(format!("unreadable yt-dlp metadata: {e}")))
}

#[async_trait::async_trait]
impl MediaFetcher for YtDlpFetcher {
    async fn probe(
        &self,
        video: &VideoReference,
        cancel: CancellationToken,
    ) -> Result<MediaProbe, ProviderFailure> {
        let url = Self::url_for(video)?;
        let output = self
            .run(
                &["--dump-json", "--no-download", "--no-warnings", url],
                cancel,
            )
            .await?;
        if !output.status.success() {
            return Err(classify_stderr(&String::from_utf8_lossy(&output.stderr)));
        }
        let info = parse_dump(&output.stdout)?;
        Ok(MediaProbe {
            duration_secs: info.duration.unwrap_or(0.0),
            format: info.ext.unwrap_or_else(|| "unknown".into()),
            title: info.title,
        })
    }

    async fn fetch(
        &self,
        video: &VideoReference,
        cancel: CancellationToken,
    ) -> Result<PathBuf, ProviderFailure> {
        let url = Self::url_for(video)?;
        std::fs::create_dir_all(&self.out_dir).map_err(|e| {
            ProviderFailure::Permanent(format!("cannot prepare audio directory: {e}"))
        })?;
        let template = self.out_dir.join("%(id)s.%(ext)s");
        let template = template.to_string_lossy().to_string();

        let output = self
            .run(
                &[
                    "-f",
                    "bestaudio/best",
                    "-x",
                    "--audio-format",
                    "mp3",
                    "-o",
                    &template,
                    "--dump-json",
                    "--no-simulate",
                    "--no-progress",
                    "--no-warnings",
                    url,
                ],
                cancel,
            )
            .await?;
        if !output.status.success() {
            return Err(classify_stderr(&String::from_utf8_lossy(&output.stderr)));
        }
        let info = parse_dump(&output.stdout)?;
        if info.id.is_empty() {
            return Err(ProviderFailure::Permanent(
                "yt-dlp metadata is missing the video id".into(),
            ));
        }
        Ok(self.out_dir.join(format!("{}.mp3", info.id)))
    }
}
