use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::assets::resolver::{AssetResolver, ResolvedAssets};
use crate::audio::master::{MasterAudioBuffer, synthesize_master};
use crate::config::{ApiKeys, EngineConfig};
use crate::encode::backend::{
    BackendKind, EncodeArtifact, EncodeJob, EncodeSettings, create_backend,
};
use crate::encode::stills::{StillFrame, StillsRequest, materialize_stills};
use crate::foundation::cancel::CancelFlag;
use crate::foundation::core::Canvas;
use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::playback::clock::Clock;
use crate::playback::output::AudioOutput;
use crate::playback::scheduler::PlaybackScheduler;
use crate::render::compositor::{Compositor, FrameInput};
use crate::render::frame::FrameRGBA;
use crate::render::text::FontSet;
use crate::timeline::model::Script;

/// One script's trip through the engine.
///
/// Assets and the master buffer are computed once and shared by preview, stills and export. A
/// new script means a new session.
pub struct RenderSession {
    config: EngineConfig,
    script: Arc<Script>,
    keys: ApiKeys,
    offline: bool,
    fonts: FontSet,
    resolver: Option<AssetResolver>,
    cancel: CancelFlag,

    assets: Option<Arc<ResolvedAssets>>,
    master: Option<Arc<MasterAudioBuffer>>,
}

impl RenderSession {
    /// Create a session, loading the configured fonts.
    pub fn new(config: EngineConfig, script: Script) -> StoryreelResult<Self> {
        config.validate()?;
        let fonts = config.load_fonts()?;
        Ok(Self {
            config,
            script: Arc::new(script),
            keys: ApiKeys::default(),
            offline: false,
            fonts,
            resolver: None,
            cancel: CancelFlag::new(),
            assets: None,
            master: None,
        })
    }

    /// Use `keys` for upstream adapters and the remote backend.
    pub fn with_keys(mut self, keys: ApiKeys) -> Self {
        self.keys = keys;
        self
    }

    /// Never contact image or speech services.
    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Replace the fonts loaded from configuration.
    pub fn with_fonts(mut self, fonts: FontSet) -> Self {
        self.fonts = fonts;
        self
    }

    /// Resolve with `resolver` instead of one built from configuration.
    pub fn with_resolver(mut self, resolver: AssetResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Share `cancel` with resolution, stills and export.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// The script.
    pub fn script(&self) -> &Arc<Script> {
        &self.script
    }

    /// The configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Cancellation flag observed by every stage.
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Resolve images and narration once; later calls return the same assets.
    #[tracing::instrument(skip(self), fields(scenes = self.script.len(), offline = self.offline))]
    pub async fn resolve(&mut self) -> StoryreelResult<Arc<ResolvedAssets>> {
        if let Some(assets) = &self.assets {
            return Ok(assets.clone());
        }
        let resolver = match self.resolver.take() {
            Some(r) => r,
            None => self.config.build_resolver(self.offline, &self.keys)?,
        }
        .with_cancel(self.cancel.clone());

        let result = resolver.resolve_script(&self.script).await;
        self.resolver = Some(resolver);
        let assets = Arc::new(result?);
        self.assets = Some(assets.clone());
        Ok(assets)
    }

    /// Build the master buffer from resolved narration; later calls return the same buffer.
    pub async fn master(&mut self) -> StoryreelResult<Arc<MasterAudioBuffer>> {
        if let Some(master) = &self.master {
            return Ok(master.clone());
        }
        let assets = self.resolve().await?;
        let master = Arc::new(synthesize_master(
            &self.script,
            &assets.narration,
            self.config.master_opts(),
        )?);
        self.master = Some(master.clone());
        Ok(master)
    }

    /// Resolve, synthesize and write the master track as a 16-bit WAV.
    pub async fn write_master_wav(&mut self, path: &Path) -> StoryreelResult<Arc<MasterAudioBuffer>> {
        let master = self.master().await?;
        master.write_wav_file(path)?;
        info!(path = %path.display(), secs = master.duration_secs(), "master wav written");
        Ok(master)
    }

    /// Compose the screen at timeline time `at_secs` on `canvas`.
    pub async fn render_frame(&mut self, at_secs: f64, canvas: Canvas) -> StoryreelResult<FrameRGBA> {
        if !at_secs.is_finite() || at_secs < 0.0 || at_secs >= self.script.total_duration() {
            return Err(StoryreelError::validation(format!(
                "frame time {at_secs} is outside [0, {})",
                self.script.total_duration()
            )));
        }
        let assets = self.resolve().await?;
        let (scene, pos) = self.script.scene_and_position(at_secs);
        let mut compositor = self.compositor()?;
        compositor.compose(
            &FrameInput {
                scene,
                image: assets.image(&scene.id),
                progress: pos.progress,
                recording: false,
            },
            canvas,
        )
    }

    /// Materialize one HD still per scene into `out_dir`.
    pub async fn stills(&mut self, out_dir: &Path) -> StoryreelResult<Vec<StillFrame>> {
        let assets = self.resolve().await?;
        let script = self.script.clone();
        let fonts = self.fonts.clone();
        let compositor = self.config.compositor.clone();
        let canvas = self.config.canvas;
        let threads = self.config.encode.threads;
        let out_dir = out_dir.to_path_buf();
        let cancel = self.cancel.clone();
        spawn_blocking(move || {
            materialize_stills(
                &StillsRequest {
                    script: &script,
                    assets: &assets,
                    compositor: &compositor,
                    fonts: &fonts,
                    canvas,
                    out_dir: &out_dir,
                    threads,
                },
                &cancel,
            )
        })
        .await
    }

    /// Encode settings for this session's fonts and keys.
    pub fn encode_settings(&self) -> EncodeSettings {
        self.config
            .encode_settings_with_fonts(&self.keys, self.fonts.clone())
    }

    /// Everything a backend needs to export to `out_path`.
    pub async fn encode_job(&mut self, out_path: impl Into<PathBuf>) -> StoryreelResult<EncodeJob> {
        let assets = self.resolve().await?;
        let master = self.master().await?;
        Ok(EncodeJob {
            script: self.script.clone(),
            assets,
            master,
            out_path: out_path.into(),
            cancel: self.cancel.clone(),
        })
    }

    /// Run the full pipeline with backend `kind`.
    ///
    /// Encoding runs on the blocking pool so the async runtime stays responsive.
    #[tracing::instrument(skip(self, out_path), fields(backend = %kind))]
    pub async fn export(
        &mut self,
        kind: BackendKind,
        out_path: impl Into<PathBuf>,
    ) -> StoryreelResult<EncodeArtifact> {
        let job = self.encode_job(out_path).await?;
        let settings = self.encode_settings();
        let artifact = spawn_blocking(move || {
            let mut backend = create_backend(kind, settings)?;
            backend.render(&job)
        })
        .await?;
        info!(path = %artifact.path.display(), bytes = artifact.byte_size, "export finished");
        Ok(artifact)
    }

    /// A scheduler in the `Ready` state for live preview on the preview canvas.
    pub async fn playback<C: Clock, A: AudioOutput>(
        &mut self,
        clock: C,
        audio: A,
    ) -> StoryreelResult<PlaybackScheduler<C, A>> {
        let mut scheduler = PlaybackScheduler::new(
            self.script.clone(),
            Arc::new(ResolvedAssets::default()),
            self.compositor()?,
            self.config.preview_canvas,
            self.config.fps,
            clock,
            audio,
        )
        .with_cancel(self.cancel.clone());
        scheduler.begin_loading()?;
        let assets = self.resolve().await?;
        let master = self.master().await?;
        scheduler.set_assets(assets)?;
        scheduler.finish_loading(master)?;
        Ok(scheduler)
    }

    fn compositor(&self) -> StoryreelResult<Compositor> {
        Compositor::with_fonts(self.config.compositor.clone(), &self.fonts)
    }
}

async fn spawn_blocking<T, F>(f: F) -> StoryreelResult<T>
where
    F: FnOnce() -> StoryreelResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoryreelError::Other(anyhow::anyhow!("blocking task failed: {e}")))?
}

#[cfg(test)]
#[path = "../../tests/unit/session/render_session.rs"]
mod tests;
