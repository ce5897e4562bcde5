//! Engine configuration: one JSON document, every field defaulted.
//!
//! API keys never live in the file; they are read from the environment (see [`ApiKeys`]).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assets::cache::{ContentCache, DiskCache, MemoryCache};
use crate::assets::decode::FfmpegAudioDecoder;
use crate::assets::http::{HttpImageProvider, HttpSpeechProvider};
use crate::assets::providers::{
    DirectoryImageProvider, ImageProvider, OfflineImageProvider, SilentSpeechProvider,
    SpeechProvider,
};
use crate::assets::resolver::{AssetResolver, ResolverOpts};
use crate::assets::retry::RetryPolicy;
use crate::audio::master::MasterAudioOpts;
use crate::audio::tone::KeepAliveTone;
use crate::encode::backend::{BackendKind, EncodeSettings, RemoteSettings};
use crate::encode::validate::DEFAULT_MIN_ARTIFACT_BYTES;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::render::compositor::CompositorOpts;
use crate::render::text::FontSet;

/// Environment variable holding the image search API key.
pub const IMAGE_API_KEY_ENV: &str = "STORYREEL_IMAGE_API_KEY";
/// Environment variable holding the speech API key.
pub const SPEECH_API_KEY_ENV: &str = "STORYREEL_SPEECH_API_KEY";
/// Environment variable holding the remote transcode API key.
pub const REMOTE_API_KEY_ENV: &str = "STORYREEL_REMOTE_API_KEY";

/// Upstream adapter selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Image search endpoint; `None` disables HTTP image search.
    pub image_search_url: Option<String>,
    /// JSON pointer to the image URL in the search response.
    pub image_url_pointer: String,
    /// Query parameter carrying the keyword.
    pub image_query_param: String,
    /// Local image directory; takes precedence over HTTP search.
    pub images_dir: Option<PathBuf>,
    /// Speech synthesis endpoint; `None` means every scene is silent.
    pub speech_url: Option<String>,
    /// Voice name sent with each synthesis request.
    pub speech_voice: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            image_search_url: None,
            image_url_pointer: "/results/0/url".to_string(),
            image_query_param: "query".to_string(),
            images_dir: None,
            speech_url: None,
            speech_voice: "default".to_string(),
        }
    }
}

/// Encode backend settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    /// Backend used by `render`.
    pub backend: BackendKind,
    /// Remote transcode base URL.
    pub remote_endpoint: Option<String>,
    /// Remote status poll interval, in milliseconds.
    pub poll_interval_ms: u64,
    /// Remote job deadline, in seconds.
    pub timeout_secs: u64,
    /// Smallest acceptable artifact.
    pub min_artifact_bytes: u64,
    /// Tone mixed under captured audio.
    pub keep_alive: KeepAliveTone,
    /// Overwrite existing outputs.
    pub overwrite: bool,
    /// Still worker threads; `None` uses rayon defaults.
    pub threads: Option<usize>,
    /// Parent of per-export scratch directories.
    pub work_dir: Option<PathBuf>,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            remote_endpoint: None,
            poll_interval_ms: 2_000,
            timeout_secs: 600,
            min_artifact_bytes: DEFAULT_MIN_ARTIFACT_BYTES,
            keep_alive: KeepAliveTone::default(),
            overwrite: true,
            threads: None,
            work_dir: None,
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Export resolution.
    pub canvas: Canvas,
    /// Preview resolution.
    pub preview_canvas: Canvas,
    /// Frame rate for export, capture and preview.
    pub fps: Fps,
    /// Master audio layout.
    pub audio: MasterAudioOpts,
    /// Frame compositor options.
    pub compositor: CompositorOpts,
    /// Retry policy shared by image and speech fetches.
    pub retry: RetryPolicy,
    /// Resolver tuning. Its sample rate and channels are overridden by `audio`.
    pub resolver: ResolverOpts,
    /// Upstream adapters.
    pub providers: ProviderConfig,
    /// Encode settings.
    pub encode: EncodeConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canvas: Canvas::EXPORT,
            preview_canvas: Canvas::PREVIEW,
            fps: Fps::EXPORT,
            audio: MasterAudioOpts::default(),
            compositor: CompositorOpts::default(),
            retry: RetryPolicy::default(),
            resolver: ResolverOpts::default(),
            providers: ProviderConfig::default(),
            encode: EncodeConfig::default(),
        }
    }
}

/// Secrets read from the environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKeys {
    /// Image search key.
    pub image: Option<String>,
    /// Speech key.
    pub speech: Option<String>,
    /// Remote transcode key.
    pub remote: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mask = |k: &Option<String>| if k.is_some() { "set" } else { "unset" };
        f.debug_struct("ApiKeys")
            .field("image", &mask(&self.image))
            .field("speech", &mask(&self.speech))
            .field("remote", &mask(&self.remote))
            .finish()
    }
}

impl ApiKeys {
    /// Read the `STORYREEL_*_API_KEY` variables. Empty values count as unset.
    pub fn from_env() -> Self {
        let get = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            image: get(IMAGE_API_KEY_ENV),
            speech: get(SPEECH_API_KEY_ENV),
            remote: get(REMOTE_API_KEY_ENV),
        }
    }
}

impl EngineConfig {
    /// Load and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> StoryreelResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            StoryreelError::validation(format!("failed to read config '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&text)
    }

    /// Parse and validate a JSON config document.
    pub fn from_json_str(text: &str) -> StoryreelResult<Self> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| StoryreelError::validation(format!("invalid config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> StoryreelResult<()> {
        self.canvas.validate()?;
        self.preview_canvas.validate()?;
        Fps::new(self.fps.num, self.fps.den)?;
        if self.audio.sample_rate == 0 || !(1..=2).contains(&self.audio.channels) {
            return Err(StoryreelError::validation(
                "audio needs sample_rate > 0 and 1 or 2 channels",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(StoryreelError::validation("retry.max_attempts must be >= 1"));
        }
        if self.resolver.image_concurrency == 0 || self.resolver.narration_concurrency == 0 {
            return Err(StoryreelError::validation(
                "resolver concurrency must be >= 1",
            ));
        }
        if self.encode.backend == BackendKind::Remote && self.encode.remote_endpoint.is_none() {
            return Err(StoryreelError::validation(
                "encode.backend 'remote' requires encode.remote_endpoint",
            ));
        }
        Ok(())
    }

    /// Master audio layout.
    pub fn master_opts(&self) -> MasterAudioOpts {
        self.audio
    }

    /// Resolver options aligned with the master audio layout.
    pub fn resolver_opts(&self) -> ResolverOpts {
        ResolverOpts {
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            ..self.resolver.clone()
        }
    }

    /// Image adapter: offline, local directory or HTTP search, in that precedence.
    pub fn image_provider(
        &self,
        offline: bool,
        keys: &ApiKeys,
    ) -> StoryreelResult<Arc<dyn ImageProvider>> {
        let p = &self.providers;
        let provider: Arc<dyn ImageProvider> = match (&p.images_dir, &p.image_search_url) {
            (Some(dir), _) => Arc::new(DirectoryImageProvider::new(dir)),
            _ if offline => Arc::new(OfflineImageProvider),
            (None, Some(url)) => Arc::new(
                HttpImageProvider::new(url, &p.image_url_pointer, keys.image.clone())?
                    .with_query_param(&p.image_query_param),
            ),
            (None, None) => Arc::new(OfflineImageProvider),
        };
        Ok(provider)
    }

    /// Speech adapter: HTTP when configured and online, otherwise silence.
    pub fn speech_provider(
        &self,
        offline: bool,
        keys: &ApiKeys,
    ) -> StoryreelResult<Arc<dyn SpeechProvider>> {
        let provider: Arc<dyn SpeechProvider> = match &self.providers.speech_url {
            Some(url) if !offline => Arc::new(HttpSpeechProvider::new(
                url,
                &self.providers.speech_voice,
                keys.speech.clone(),
            )?),
            _ => Arc::new(SilentSpeechProvider),
        };
        Ok(provider)
    }

    /// Fully wired resolver: adapters, cache, decoder and retry policy.
    pub fn build_resolver(&self, offline: bool, keys: &ApiKeys) -> StoryreelResult<AssetResolver> {
        let opts = self.resolver_opts();
        let cache: Arc<dyn ContentCache> = match &opts.cache_dir {
            Some(dir) => Arc::new(DiskCache::open(dir)?),
            None => Arc::new(MemoryCache::new()),
        };
        Ok(AssetResolver::new(
            self.image_provider(offline, keys)?,
            self.speech_provider(offline, keys)?,
        )
        .with_cache(cache)
        .with_decoder(Arc::new(FfmpegAudioDecoder::new(
            opts.sample_rate,
            opts.channels,
        )))
        .with_retry(self.retry.clone())
        .with_opts(opts))
    }

    /// Fonts named by the compositor options, or probed system fonts.
    pub fn load_fonts(&self) -> StoryreelResult<FontSet> {
        FontSet::load(
            self.compositor.title_font.as_deref(),
            self.compositor.caption_font.as_deref(),
        )
    }

    /// Encode settings for the export canvas, loading fonts from the compositor options.
    pub fn encode_settings(&self, keys: &ApiKeys) -> StoryreelResult<EncodeSettings> {
        Ok(self.encode_settings_with_fonts(keys, self.load_fonts()?))
    }

    /// Encode settings for the export canvas over already loaded fonts.
    pub fn encode_settings_with_fonts(&self, keys: &ApiKeys, fonts: FontSet) -> EncodeSettings {
        let e = &self.encode;
        EncodeSettings {
            canvas: self.canvas,
            fps: self.fps,
            compositor: self.compositor.clone(),
            fonts,
            overwrite: e.overwrite,
            min_artifact_bytes: e.min_artifact_bytes,
            keep_alive: e.keep_alive,
            work_dir: e.work_dir.clone(),
            threads: e.threads,
            remote: RemoteSettings {
                endpoint: e.remote_endpoint.clone(),
                api_key: keys.remote.clone(),
                poll_interval: Duration::from_millis(e.poll_interval_ms.max(1)),
                timeout: Duration::from_secs(e.timeout_secs.max(1)),
            },
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
