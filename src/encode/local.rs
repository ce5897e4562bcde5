use tracing::info;

use crate::encode::backend::{
    BackendKind, EncodeArtifact, EncodeBackend, EncodeJob, EncodeSettings, prepare_batch, work_dir,
};
use crate::encode::ffmpeg::{refuse_existing_output, run_ffmpeg};
use crate::encode::graph::lower_to_ffmpeg_args;
use crate::encode::validate::finalize_artifact;
use crate::foundation::error::StoryreelResult;

/// Batch export through the system `ffmpeg`: HD stills plus the master WAV, concatenated by the
/// lowered filter graph.
pub struct LocalTranscodeBackend {
    settings: EncodeSettings,
}

impl LocalTranscodeBackend {
    /// Create the backend.
    pub fn new(settings: EncodeSettings) -> Self {
        Self { settings }
    }
}

impl EncodeBackend for LocalTranscodeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    #[tracing::instrument(skip_all, fields(out = %job.out_path.display()))]
    fn render(&mut self, job: &EncodeJob) -> StoryreelResult<EncodeArtifact> {
        refuse_existing_output(&job.out_path, self.settings.overwrite)?;
        let work = work_dir(&self.settings)?;
        let batch = prepare_batch(job, &self.settings, work.path())?;
        job.cancel.check()?;

        let args = lower_to_ffmpeg_args(&batch.graph, &job.out_path, self.settings.overwrite)?;
        info!(
            stills = batch.stills.len(),
            audio = %batch.audio_path.display(),
            "running local transcode"
        );
        run_ffmpeg(&args, &job.out_path)?;
        finalize_artifact(&job.out_path, self.settings.min_artifact_bytes)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/local.rs"]
mod tests;
