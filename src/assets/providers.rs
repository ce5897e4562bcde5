use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;

/// Failure of one upstream fetch.
///
/// Only the first three variants are worth retrying.
#[derive(thiserror::Error, Clone, Debug, PartialEq)]
pub enum FetchError {
    /// Upstream asked us to slow down (HTTP 429).
    #[error("rate limited")]
    RateLimited {
        /// Server-provided wait, if any.
        retry_after: Option<Duration>,
    },

    /// Upstream is temporarily unavailable (5xx, 408).
    #[error("upstream unavailable (status {status})")]
    Unavailable {
        /// HTTP status code.
        status: u16,
    },

    /// Transport failure before a response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// Upstream refused the request; retrying will not help.
    #[error("rejected (status {status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Diagnostic text from upstream.
        message: String,
    },

    /// A payload arrived but could not be decoded.
    #[error("undecodable payload: {0}")]
    Undecodable(String),

    /// The provider is disabled for this run.
    #[error("offline")]
    Offline,
}

impl FetchError {
    /// Return `true` for transient failures.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::RateLimited { .. } | FetchError::Unavailable { .. } | FetchError::Network(_)
        )
    }

    /// Server-provided minimum wait before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, retry_after: Option<Duration>, body: &str) -> Self {
        match status {
            429 => FetchError::RateLimited { retry_after },
            408 | 500..=599 => FetchError::Unavailable { status },
            _ => FetchError::Rejected {
                status,
                message: body.trim().chars().take(200).collect(),
            },
        }
    }
}

/// Result of a speech request.
#[derive(Clone, Debug, PartialEq)]
pub enum SpeechPayload {
    /// Encoded audio bytes (WAV, MP3, ...).
    Encoded(Vec<u8>),
    /// Upstream produced no audio for this text.
    Silence,
}

/// Looks up image bytes for a search keyword.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Fetch encoded image bytes for `keyword`.
    async fn fetch_image(&self, keyword: &str) -> Result<Vec<u8>, FetchError>;
}

/// Turns narration text into encoded speech.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Synthesize `text`.
    async fn synthesize(&self, text: &str) -> Result<SpeechPayload, FetchError>;
}

/// Image provider for offline runs: every lookup is [`FetchError::Offline`].
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineImageProvider;

#[async_trait]
impl ImageProvider for OfflineImageProvider {
    async fn fetch_image(&self, _keyword: &str) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Offline)
    }
}

/// Speech provider for offline runs: every scene is silent.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentSpeechProvider;

#[async_trait]
impl SpeechProvider for SilentSpeechProvider {
    async fn synthesize(&self, _text: &str) -> Result<SpeechPayload, FetchError> {
        Ok(SpeechPayload::Silence)
    }
}

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Reads `{dir}/{slug}.{png,jpg,jpeg,webp}` for each keyword.
#[derive(Clone, Debug)]
pub struct DirectoryImageProvider {
    dir: PathBuf,
}

impl DirectoryImageProvider {
    /// Serve images from `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Candidate paths for `keyword`, in lookup order.
    pub fn candidates(&self, keyword: &str) -> Vec<PathBuf> {
        let slug = keyword_slug(keyword);
        IMAGE_EXTENSIONS
            .iter()
            .map(|ext| self.dir.join(format!("{slug}.{ext}")))
            .collect()
    }
}

#[async_trait]
impl ImageProvider for DirectoryImageProvider {
    async fn fetch_image(&self, keyword: &str) -> Result<Vec<u8>, FetchError> {
        for path in self.candidates(keyword) {
            match tokio::fs::read(&path).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(FetchError::Rejected {
                        status: 0,
                        message: format!("{}: {e}", path.display()),
                    });
                }
            }
        }
        Err(FetchError::Rejected {
            status: 404,
            message: format!("no image for '{keyword}' in {}", self.dir.display()),
        })
    }
}

/// Lowercase ASCII slug: alphanumerics kept, everything else collapsed to single `-`.
pub fn keyword_slug(keyword: &str) -> String {
    let mut out = String::with_capacity(keyword.len());
    let mut dash = false;
    for c in keyword.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !out.is_empty() {
            out.push('-');
            dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/assets/providers.rs"]
mod tests;
