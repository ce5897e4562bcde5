use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::join;
use futures_util::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::assets::cache::{ContentCache, ContentKey, NoCache};
use crate::assets::decode::{AudioDecoder, FfmpegAudioDecoder, PreparedImage, decode_image};
use crate::assets::placeholder::{PLACEHOLDER_SIZE, render_placeholder};
use crate::assets::providers::{FetchError, ImageProvider, SpeechPayload, SpeechProvider};
use crate::assets::retry::RetryPolicy;
use crate::audio::clip::NarrationClip;
use crate::audio::master::EXPORT_SAMPLE_RATE;
use crate::foundation::cancel::CancelFlag;
use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::timeline::model::{Scene, SceneId, Script};

const IMAGE_NS: &str = "image";
const SPEECH_NS: &str = "speech";

/// What a scene shows when its image cannot be resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFallback {
    /// A deterministic gradient keyed by the scene id.
    #[default]
    Placeholder,
    /// No image: the compositor leaves the background black.
    None,
}

/// Resolver tuning.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ResolverOpts {
    /// Images fetched concurrently.
    pub image_concurrency: usize,
    /// Narration requests in flight at once (1 = sequential).
    pub narration_concurrency: usize,
    /// Behavior for scenes whose image fails.
    pub image_fallback: ImageFallback,
    /// Narration is conformed to this sample rate.
    pub sample_rate: u32,
    /// Narration is conformed to this channel count.
    pub channels: u16,
    /// Directory for the on-disk content cache; `None` keeps everything in memory.
    pub cache_dir: Option<PathBuf>,
}

impl Default for ResolverOpts {
    fn default() -> Self {
        Self {
            image_concurrency: 4,
            narration_concurrency: 1,
            image_fallback: ImageFallback::Placeholder,
            sample_rate: EXPORT_SAMPLE_RATE,
            channels: 1,
            cache_dir: None,
        }
    }
}

/// Per-scene outputs of a resolution pass.
///
/// Scenes without an entry in `images` render over a black background.
#[derive(Clone, Debug, Default)]
pub struct ResolvedAssets {
    /// Decoded image per scene (real or placeholder).
    pub images: HashMap<SceneId, PreparedImage>,
    /// Narration per scene; every scene of the script has an entry.
    pub narration: HashMap<SceneId, NarrationClip>,
}

impl ResolvedAssets {
    /// Image for `id`, if one was resolved.
    pub fn image(&self, id: &SceneId) -> Option<&PreparedImage> {
        self.images.get(id)
    }

    /// Narration for `id`; missing entries read as silence.
    pub fn narration(&self, id: &SceneId) -> &NarrationClip {
        self.narration.get(id).unwrap_or(&NarrationClip::Silence)
    }

    /// Number of scenes with audible narration.
    pub fn voiced_scenes(&self) -> usize {
        self.narration.values().filter(|c| !c.is_silence()).count()
    }
}

/// Resolves one image and one narration clip per scene.
///
/// Individual lookups never fail: exhausted retries and permanent errors degrade to the configured
/// image fallback and to [`NarrationClip::Silence`].
pub struct AssetResolver {
    images: Arc<dyn ImageProvider>,
    speech: Arc<dyn SpeechProvider>,
    cache: Arc<dyn ContentCache>,
    decoder: Arc<dyn AudioDecoder>,
    retry: RetryPolicy,
    opts: ResolverOpts,
    cancel: CancelFlag,
}

impl AssetResolver {
    /// Create a resolver with default options, no cache and the ffmpeg-backed decoder.
    pub fn new(images: Arc<dyn ImageProvider>, speech: Arc<dyn SpeechProvider>) -> Self {
        let opts = ResolverOpts::default();
        Self {
            images,
            speech,
            cache: Arc::new(NoCache),
            decoder: Arc::new(FfmpegAudioDecoder::new(opts.sample_rate, opts.channels)),
            retry: RetryPolicy::default(),
            opts,
            cancel: CancelFlag::new(),
        }
    }

    /// Replace the content cache.
    pub fn with_cache(mut self, cache: Arc<dyn ContentCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the audio decoder.
    pub fn with_decoder(mut self, decoder: Arc<dyn AudioDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the options.
    pub fn with_opts(mut self, opts: ResolverOpts) -> Self {
        self.opts = opts;
        self
    }

    /// Observe `cancel` between scenes.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Resolver options.
    pub fn opts(&self) -> &ResolverOpts {
        &self.opts
    }

    /// Image for `scene`, or its fallback.
    pub async fn resolve_image(&self, scene: &Scene) -> Option<PreparedImage> {
        let keyword = scene.image_keyword.trim();
        if keyword.is_empty() {
            debug!(scene = %scene.id, "no image keyword");
            return self.image_fallback(&scene.id);
        }

        match self.fetch_and_decode_image(keyword).await {
            Ok(img) => Some(img),
            Err(e) => {
                warn!(scene = %scene.id, keyword, error = %e, "image unavailable, using fallback");
                self.image_fallback(&scene.id)
            }
        }
    }

    async fn fetch_and_decode_image(&self, keyword: &str) -> Result<PreparedImage, FetchError> {
        let key = ContentKey::new(IMAGE_NS, keyword);
        if let Some(bytes) = self.cache.get(key) {
            match decode_image_blocking(bytes).await {
                Ok(img) => return Ok(img),
                Err(e) => debug!(keyword, error = %e, "cached image undecodable, refetching"),
            }
        }

        let bytes = self
            .retry
            .run(IMAGE_NS, |_| self.images.fetch_image(keyword))
            .await?;
        let bytes = Arc::new(bytes);
        let img = decode_image_blocking(bytes.clone()).await?;
        self.cache.put(key, bytes);
        Ok(img)
    }

    fn image_fallback(&self, id: &SceneId) -> Option<PreparedImage> {
        match self.opts.image_fallback {
            ImageFallback::None => None,
            ImageFallback::Placeholder => {
                match render_placeholder(id, PLACEHOLDER_SIZE.0, PLACEHOLDER_SIZE.1) {
                    Ok(img) => Some(img),
                    Err(e) => {
                        warn!(scene = %id, error = %e, "placeholder render failed");
                        None
                    }
                }
            }
        }
    }

    /// Narration for `text`, conformed to the session layout, or silence.
    pub async fn resolve_narration(&self, text: &str) -> NarrationClip {
        let text = text.trim();
        if text.is_empty() {
            return NarrationClip::Silence;
        }
        match self.fetch_and_decode_narration(text).await {
            Ok(clip) => clip,
            Err(e) => {
                warn!(chars = text.chars().count(), error = %e, "narration unavailable, using silence");
                NarrationClip::Silence
            }
        }
    }

    async fn fetch_and_decode_narration(&self, text: &str) -> Result<NarrationClip, FetchError> {
        let key = ContentKey::new(SPEECH_NS, text);
        if let Some(bytes) = self.cache.get(key) {
            match self.decode_narration(bytes).await {
                Ok(clip) => return Ok(clip),
                Err(e) => debug!(error = %e, "cached narration undecodable, refetching"),
            }
        }

        let payload = self
            .retry
            .run(SPEECH_NS, |_| self.speech.synthesize(text))
            .await?;
        // Silence is cached as an empty payload so repeated passes skip the upstream call.
        let bytes = match payload {
            SpeechPayload::Encoded(b) => Arc::new(b),
            SpeechPayload::Silence => Arc::new(Vec::new()),
        };
        let clip = self.decode_narration(bytes.clone()).await?;
        self.cache.put(key, bytes);
        Ok(clip)
    }

    async fn decode_narration(&self, bytes: Arc<Vec<u8>>) -> Result<NarrationClip, FetchError> {
        if bytes.is_empty() {
            return Ok(NarrationClip::Silence);
        }
        let decoder = self.decoder.clone();
        let (rate, channels) = (self.opts.sample_rate, self.opts.channels);
        let clip = tokio::task::spawn_blocking(move || {
            decoder
                .decode(&bytes)
                .and_then(|c| c.conform(rate, channels))
        })
        .await
        .map_err(|e| FetchError::Undecodable(e.to_string()))?
        .map_err(|e| FetchError::Undecodable(e.to_string()))?;
        if clip.is_empty() {
            return Ok(NarrationClip::Silence);
        }
        Ok(NarrationClip::Pcm(clip))
    }

    /// Resolve every scene of `script`.
    ///
    /// Images and narration run side by side, each bounded by its concurrency setting. The
    /// cancellation flag is checked before each scene starts.
    #[tracing::instrument(skip(self, script), fields(scenes = script.len()))]
    pub async fn resolve_script(&self, script: &Script) -> StoryreelResult<ResolvedAssets> {
        self.cancel.check()?;

        let images = stream::iter(script.scenes())
            .map(|scene| async move {
                self.cancel.check()?;
                Ok::<_, StoryreelError>((scene.id.clone(), self.resolve_image(scene).await))
            })
            .buffer_unordered(self.opts.image_concurrency.max(1))
            .collect::<Vec<StoryreelResult<(SceneId, Option<PreparedImage>)>>>();

        let narration = stream::iter(script.scenes())
            .map(|scene| async move {
                self.cancel.check()?;
                Ok::<_, StoryreelError>((
                    scene.id.clone(),
                    self.resolve_narration(&scene.narration_text).await,
                ))
            })
            .buffered(self.opts.narration_concurrency.max(1))
            .collect::<Vec<StoryreelResult<(SceneId, NarrationClip)>>>();

        let (images, narration) = join(images, narration).await;

        let mut out = ResolvedAssets::default();
        for r in images {
            let (id, img) = r?;
            if let Some(img) = img {
                out.images.insert(id, img);
            }
        }
        for r in narration {
            let (id, clip) = r?;
            out.narration.insert(id, clip);
        }

        info!(
            images = out.images.len(),
            voiced = out.voiced_scenes(),
            "assets resolved"
        );
        Ok(out)
    }
}

async fn decode_image_blocking(bytes: Arc<Vec<u8>>) -> Result<PreparedImage, FetchError> {
    tokio::task::spawn_blocking(move || decode_image(&bytes))
        .await
        .map_err(|e| FetchError::Undecodable(e.to_string()))?
        .map_err(|e| FetchError::Undecodable(e.to_string()))
}

#[cfg(test)]
#[path = "../../tests/unit/assets/resolver.rs"]
mod tests;
