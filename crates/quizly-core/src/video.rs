use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Opaque locator for a source video/audio asset. Immutable once a quiz
/// has been generated from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum VideoReference {
    /// A remote URL (YouTube watch/short links are the common case).
    Url(String),
    /// An uploaded file id resolved by the media layer.
    Upload(String),
}

impl VideoReference {
    /// Human-readable locator, used for titles and log lines.
    pub fn locator(&self) -> &str {
        match self {
            VideoReference::Url(u) => u,
            VideoReference::Upload(id) => id,
        }
    }

    /// Short label for the referenced video: the YouTube id when one can
    /// be extracted, otherwise the raw locator.
    pub fn short_label(&self) -> String {
        match self {
            VideoReference::Url(u) => youtube_video_id(u).unwrap_or_else(|| u.clone()),
            VideoReference::Upload(id) => id.clone(),
        }
    }
}

impl std::fmt::Display for VideoReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.locator())
    }
}

fn yt_regex() -> &'static Regex {
    static YT_RX: OnceLock<Regex> = OnceLock::new();
    YT_RX.get_or_init(|| Regex::new(r"(?:youtu\.be/|v=)([\w\-]{11})").expect("valid regex"))
}

/// Extract the 11-character YouTube video id from a watch/shortened URL.
pub fn youtube_video_id(url: &str) -> Option<String> {
    yt_regex()
        .captures(url.trim())
        .map(|c| c[1].to_string())
}

/// Quick validation for a YouTube URL via id extraction.
pub fn is_youtube_url(url: &str) -> bool {
    youtube_video_id(url).is_some()
}
