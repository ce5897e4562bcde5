use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::assets::resolver::ResolvedAssets;
use crate::audio::master::MasterAudioBuffer;
use crate::audio::tone::KeepAliveTone;
use crate::encode::capture::CaptureBackend;
use crate::encode::graph::FilterGraph;
use crate::encode::local::LocalTranscodeBackend;
use crate::encode::remote::RemoteTranscodeBackend;
use crate::encode::stills::{StillFrame, StillsRequest, check_preconditions, materialize_stills};
use crate::encode::validate::DEFAULT_MIN_ARTIFACT_BYTES;
use crate::foundation::cancel::CancelFlag;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::render::compositor::CompositorOpts;
use crate::render::text::FontSet;
use crate::timeline::model::Script;

/// Which encode strategy to run.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Real-time playback captured into a streaming `ffmpeg` sink.
    Capture,
    /// HD stills concatenated by the local `ffmpeg`.
    #[default]
    Local,
    /// HD stills uploaded to a remote transcode service.
    Remote,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BackendKind::Capture => "capture",
            BackendKind::Local => "local",
            BackendKind::Remote => "remote",
        })
    }
}

/// Everything a backend needs for one export.
#[derive(Clone, Debug)]
pub struct EncodeJob {
    /// Script being exported.
    pub script: Arc<Script>,
    /// Resolved images and narration.
    pub assets: Arc<ResolvedAssets>,
    /// Master narration track.
    pub master: Arc<MasterAudioBuffer>,
    /// Final MP4 path.
    pub out_path: PathBuf,
    /// Stops still materialization and capture.
    pub cancel: CancelFlag,
}

/// A produced video file.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct EncodeArtifact {
    /// Output path.
    pub path: PathBuf,
    /// Size on disk.
    pub byte_size: u64,
    /// Container duration from `ffprobe`, when available.
    pub probed_duration_secs: Option<f64>,
}

/// Remote transcode endpoint settings.
#[derive(Clone, Debug, PartialEq)]
pub struct RemoteSettings {
    /// Base URL of the transcode service.
    pub endpoint: Option<String>,
    /// Bearer token.
    pub api_key: Option<String>,
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Overall job deadline.
    pub timeout: Duration,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(600),
        }
    }
}

/// Backend-independent export settings.
#[derive(Clone, Debug)]
pub struct EncodeSettings {
    /// Output resolution.
    pub canvas: Canvas,
    /// Output frame rate.
    pub fps: Fps,
    /// Compositor options for stills and captured frames.
    pub compositor: CompositorOpts,
    /// Fonts shared by every compositor.
    pub fonts: FontSet,
    /// Overwrite an existing output file.
    pub overwrite: bool,
    /// Artifacts below this size are rejected and deleted.
    pub min_artifact_bytes: u64,
    /// Tone mixed under captured audio.
    pub keep_alive: KeepAliveTone,
    /// Scratch directory parent; `None` uses the system temp dir.
    pub work_dir: Option<PathBuf>,
    /// Still worker threads; `None` uses rayon defaults.
    pub threads: Option<usize>,
    /// Remote transcode settings.
    pub remote: RemoteSettings,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            canvas: Canvas::EXPORT,
            fps: Fps::EXPORT,
            compositor: CompositorOpts::default(),
            fonts: FontSet::empty(),
            overwrite: true,
            min_artifact_bytes: DEFAULT_MIN_ARTIFACT_BYTES,
            keep_alive: KeepAliveTone::default(),
            work_dir: None,
            threads: None,
            remote: RemoteSettings::default(),
        }
    }
}

/// Turns a timeline plus master audio into a video file.
pub trait EncodeBackend: Send {
    /// Backend identity.
    fn kind(&self) -> BackendKind;
    /// Produce the artifact for `job`.
    fn render(&mut self, job: &EncodeJob) -> StoryreelResult<EncodeArtifact>;
}

/// Build the backend selected by `kind`.
pub fn create_backend(
    kind: BackendKind,
    settings: EncodeSettings,
) -> StoryreelResult<Box<dyn EncodeBackend>> {
    settings.canvas.validate()?;
    Ok(match kind {
        BackendKind::Capture => Box::new(CaptureBackend::new(settings)),
        BackendKind::Local => Box::new(LocalTranscodeBackend::new(settings)),
        BackendKind::Remote => Box::new(RemoteTranscodeBackend::new(settings)?),
    })
}

/// Scratch directory for one export, removed on drop.
pub(crate) fn work_dir(settings: &EncodeSettings) -> StoryreelResult<tempfile::TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("storyreel-");
    let dir = match settings.work_dir.as_deref() {
        Some(parent) => {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoryreelError::validation(format!(
                    "failed to create work dir '{}': {e}",
                    parent.display()
                ))
            })?;
            builder.tempdir_in(parent)
        }
        None => builder.tempdir(),
    };
    dir.map_err(|e| StoryreelError::mux(format!("failed to create scratch directory: {e}")))
}

/// Inputs shared by both batch backends, all on disk and checked.
pub(crate) struct BatchInputs {
    pub(crate) stills: Vec<StillFrame>,
    pub(crate) audio_path: PathBuf,
    pub(crate) graph: FilterGraph,
}

/// Materialize stills, serialize the master to WAV, check preconditions and build the graph.
pub(crate) fn prepare_batch(
    job: &EncodeJob,
    settings: &EncodeSettings,
    work: &Path,
) -> StoryreelResult<BatchInputs> {
    let stills = materialize_stills(
        &StillsRequest {
            script: &job.script,
            assets: &job.assets,
            compositor: &settings.compositor,
            fonts: &settings.fonts,
            canvas: settings.canvas,
            out_dir: &work.join("stills"),
            threads: settings.threads,
        },
        &job.cancel,
    )?;
    job.cancel.check()?;

    let audio_path = work.join("master.wav");
    job.master.write_wav_file(&audio_path)?;
    check_preconditions(&job.script, &stills, &audio_path)?;

    let graph = FilterGraph::for_stills(
        settings.canvas,
        settings.fps,
        stills.iter().map(|s| (s.path.as_path(), s.duration_secs)),
        &audio_path,
    )?;
    info!(stills = stills.len(), "batch inputs ready");
    Ok(BatchInputs {
        stills,
        audio_path,
        graph,
    })
}
