use std::path::Path;

use tracing::{info, trace};

use crate::audio::master::write_f32le_file;
use crate::encode::backend::{
    BackendKind, EncodeArtifact, EncodeBackend, EncodeJob, EncodeSettings, work_dir,
};
use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
use crate::encode::sink::{AudioInputConfig, FrameSink, SinkConfig};
use crate::encode::validate::finalize_artifact;
use crate::foundation::core::Fps;
use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::playback::clock::{Clock, SystemClock};
use crate::playback::output::{FrameTarget, NullAudioOutput};
use crate::playback::scheduler::PlaybackScheduler;
use crate::render::compositor::Compositor;
use crate::render::frame::FrameRGBA;
use crate::timeline::position::ScenePosition;

/// Frame target that turns scheduler ticks into a constant-frame-rate stream.
///
/// Each tick fills every output index up to `floor(elapsed × fps)` with the tick's frame, so late
/// ticks repeat the latest frame instead of dropping time.
pub struct CaptureTarget<'a> {
    sink: &'a mut dyn FrameSink,
    fps: Fps,
    total_frames: u64,
    next_index: u64,
    last: Option<FrameRGBA>,
}

impl<'a> CaptureTarget<'a> {
    /// Target emitting at most `total_frames` frames into `sink`.
    pub fn new(sink: &'a mut dyn FrameSink, fps: Fps, total_frames: u64) -> Self {
        Self {
            sink,
            fps,
            total_frames,
            next_index: 0,
            last: None,
        }
    }

    /// Frames pushed so far.
    pub fn pushed(&self) -> u64 {
        self.next_index
    }

    /// Pad to `total_frames` by repeating the last frame. Returns the number of frames pushed.
    pub fn finish(mut self) -> StoryreelResult<u64> {
        let last = self
            .last
            .take()
            .ok_or_else(|| StoryreelError::mux("capture produced no frames"))?;
        while self.next_index < self.total_frames {
            self.sink.push_frame(self.next_index, &last)?;
            self.next_index += 1;
        }
        Ok(self.next_index)
    }
}

impl FrameTarget for CaptureTarget<'_> {
    fn present(
        &mut self,
        frame: &FrameRGBA,
        _position: ScenePosition,
        elapsed_secs: f64,
    ) -> StoryreelResult<()> {
        let due = self
            .fps
            .secs_to_frames_floor(elapsed_secs)
            .min(self.total_frames.saturating_sub(1));
        while self.next_index <= due {
            trace!(idx = self.next_index, elapsed_secs, "capture frame");
            self.sink.push_frame(self.next_index, frame)?;
            self.next_index += 1;
        }
        self.last = Some(frame.clone());
        Ok(())
    }
}

/// Real-time capture: plays the timeline once and records every frame plus the master audio.
///
/// The recording runs in wall-clock time with [`SystemClock`]; other clocks make it
/// deterministic.
pub struct CaptureBackend<C: Clock = SystemClock> {
    settings: EncodeSettings,
    clock: C,
}

impl CaptureBackend<SystemClock> {
    /// Capture against the wall clock.
    pub fn new(settings: EncodeSettings) -> Self {
        Self::with_clock(settings, SystemClock::new())
    }
}

impl<C: Clock + Clone> CaptureBackend<C> {
    /// Capture against `clock`.
    pub fn with_clock(settings: EncodeSettings, clock: C) -> Self {
        Self { settings, clock }
    }

    /// Play `job` once into `sink`. Returns the number of frames pushed.
    ///
    /// On failure or cancellation the sink is aborted; on success it is ended.
    pub fn capture_into(
        &mut self,
        job: &EncodeJob,
        sink: &mut dyn FrameSink,
        audio: Option<AudioInputConfig>,
    ) -> StoryreelResult<u64> {
        let s = &self.settings;
        let compositor = Compositor::with_fonts(s.compositor.clone(), &s.fonts)?;
        let total_frames = job.script.frame_count(s.fps);

        sink.begin(SinkConfig {
            width: s.canvas.width,
            height: s.canvas.height,
            fps: s.fps,
            audio,
        })?;

        let mut scheduler = PlaybackScheduler::new(
            job.script.clone(),
            job.assets.clone(),
            compositor,
            s.canvas,
            s.fps,
            self.clock.clone(),
            NullAudioOutput::default(),
        )
        .with_cancel(job.cancel.clone());

        let result = (|| -> StoryreelResult<u64> {
            scheduler.begin_loading()?;
            scheduler.finish_loading(job.master.clone())?;
            let mut target = CaptureTarget::new(&mut *sink, s.fps, total_frames);
            scheduler.run(&mut target)?;
            target.finish()
        })();

        match result {
            Ok(pushed) => {
                sink.end()?;
                info!(frames = pushed, "capture finished");
                Ok(pushed)
            }
            Err(e) => {
                sink.abort();
                Err(e)
            }
        }
    }
}

impl<C: Clock + Clone + Send> EncodeBackend for CaptureBackend<C> {
    fn kind(&self) -> BackendKind {
        BackendKind::Capture
    }

    #[tracing::instrument(skip_all, fields(out = %job.out_path.display()))]
    fn render(&mut self, job: &EncodeJob) -> StoryreelResult<EncodeArtifact> {
        let work = work_dir(&self.settings)?;
        let audio_path = work.path().join("capture.f32le");
        write_capture_audio(job, &self.settings, &audio_path)?;

        let mut sink = FfmpegSink::new(FfmpegSinkOpts {
            overwrite: self.settings.overwrite,
            ..FfmpegSinkOpts::new(&job.out_path)
        });
        let audio = AudioInputConfig {
            path: audio_path,
            sample_rate: job.master.sample_rate(),
            channels: job.master.channels(),
        };
        self.capture_into(job, &mut sink, Some(audio))?;
        finalize_artifact(&job.out_path, self.settings.min_artifact_bytes)
    }
}

/// Master samples plus the keep-alive tone as raw `f32le`.
fn write_capture_audio(job: &EncodeJob, settings: &EncodeSettings, path: &Path) -> StoryreelResult<()> {
    if job.master.samples().is_empty() {
        return Err(StoryreelError::MissingAudio("master buffer is empty".to_string()));
    }
    let samples = settings.keep_alive.mix_into_copy(&job.master);
    write_f32le_file(&samples, path)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/capture.rs"]
mod tests;
