use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::assets::resolver::ResolvedAssets;
use crate::audio::master::MasterAudioBuffer;
use crate::foundation::cancel::CancelFlag;
use crate::foundation::core::{Canvas, Fps};
use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::playback::clock::{Clock, SystemClock};
use crate::playback::output::{AudioOutput, FrameTarget, NullAudioOutput};
use crate::render::compositor::{Compositor, FrameInput};
use crate::timeline::model::Script;
use crate::timeline::position::ScenePosition;

pub use crate::playback::state::PlaybackState;

/// Result of one [`PlaybackScheduler::tick`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    /// A frame was composed and presented for this position.
    Presented(ScenePosition),
    /// The timeline is over; audio is stopped.
    Ended,
}

/// Maps a clock onto the script timeline and drives the compositor.
///
/// Single-threaded and cooperative: only [`tick`](Self::tick) advances the visible position. The
/// master buffer is the only audio source and is torn down before every (re)start.
pub struct PlaybackScheduler<C: Clock = SystemClock, A: AudioOutput = NullAudioOutput> {
    script: Arc<Script>,
    assets: Arc<ResolvedAssets>,
    compositor: Compositor,
    canvas: Canvas,
    fps: Fps,
    clock: C,
    audio: A,
    state: PlaybackState,
    master: Option<Arc<MasterAudioBuffer>>,
    reference_start: Duration,
    paused_at: Duration,
    recording: bool,
    cancel: CancelFlag,
}

impl<C: Clock, A: AudioOutput> PlaybackScheduler<C, A> {
    /// Create an idle scheduler.
    pub fn new(
        script: Arc<Script>,
        assets: Arc<ResolvedAssets>,
        compositor: Compositor,
        canvas: Canvas,
        fps: Fps,
        clock: C,
        audio: A,
    ) -> Self {
        Self {
            script,
            assets,
            compositor,
            canvas,
            fps,
            clock,
            audio,
            state: PlaybackState::Idle,
            master: None,
            reference_start: Duration::ZERO,
            paused_at: Duration::ZERO,
            recording: false,
            cancel: CancelFlag::new(),
        }
    }

    /// Draw the recording indicator on every frame.
    pub fn with_recording(mut self, recording: bool) -> Self {
        self.recording = recording;
        self
    }

    /// Stop [`run`](Self::run) when `cancel` is set.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Current state.
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Script being played.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Frame rate used by [`run`](Self::run).
    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Audio output.
    pub fn audio(&self) -> &A {
        &self.audio
    }

    fn transition(&mut self, next: PlaybackState) -> StoryreelResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(StoryreelError::validation(format!(
                "invalid playback transition {} -> {next}",
                self.state
            )));
        }
        debug!(from = %self.state, to = %next, "playback transition");
        self.state = next;
        Ok(())
    }

    /// `Idle → Loading`.
    pub fn begin_loading(&mut self) -> StoryreelResult<()> {
        self.transition(PlaybackState::Loading)
    }

    /// Install resolved assets. Only allowed while loading.
    pub fn set_assets(&mut self, assets: Arc<ResolvedAssets>) -> StoryreelResult<()> {
        if self.state != PlaybackState::Loading {
            return Err(StoryreelError::validation(format!(
                "assets can only change while loading, state is {}",
                self.state
            )));
        }
        self.assets = assets;
        Ok(())
    }

    /// `Loading → Ready`, installing the master buffer.
    pub fn finish_loading(&mut self, master: Arc<MasterAudioBuffer>) -> StoryreelResult<()> {
        self.transition(PlaybackState::Ready)?;
        self.master = Some(master);
        Ok(())
    }

    /// `Ready → Playing` from the start of the timeline.
    pub fn play(&mut self) -> StoryreelResult<()> {
        self.transition(PlaybackState::Playing)?;
        self.start_audio(0.0)?;
        self.reference_start = self.clock.now();
        self.paused_at = Duration::ZERO;
        info!(total = self.script.total_duration(), "playback started");
        Ok(())
    }

    /// `Playing → Paused`, keeping the elapsed position.
    pub fn pause(&mut self) -> StoryreelResult<()> {
        let at = self.elapsed();
        self.transition(PlaybackState::Paused)?;
        self.paused_at = at;
        self.audio.stop();
        Ok(())
    }

    /// `Paused → Playing` from the paused position.
    pub fn resume(&mut self) -> StoryreelResult<()> {
        self.transition(PlaybackState::Playing)?;
        self.reference_start = self.clock.now().saturating_sub(self.paused_at);
        self.start_audio(self.paused_at.as_secs_f64())
    }

    /// Halt from any state: audio stopped, state `Ended`.
    pub fn stop(&mut self) {
        self.audio.stop();
        if self.state != PlaybackState::Ended {
            debug!(from = %self.state, "playback stopped");
        }
        self.state = PlaybackState::Ended;
    }

    fn start_audio(&mut self, offset_secs: f64) -> StoryreelResult<()> {
        self.audio.stop();
        let master = self
            .master
            .as_ref()
            .ok_or_else(|| StoryreelError::validation("no master audio installed"))?;
        self.audio.start(master, offset_secs)
    }

    /// Timeline time since `play`, frozen while paused.
    pub fn elapsed(&self) -> Duration {
        match self.state {
            PlaybackState::Playing => self.clock.now().saturating_sub(self.reference_start),
            PlaybackState::Paused => self.paused_at,
            PlaybackState::Ended => Duration::from_secs_f64(self.script.total_duration()),
            _ => Duration::ZERO,
        }
    }

    /// Present the frame for the current clock time, or end playback.
    pub fn tick(&mut self, target: &mut dyn FrameTarget) -> StoryreelResult<TickOutcome> {
        if self.state != PlaybackState::Playing {
            return Err(StoryreelError::validation(format!(
                "tick requires playing state, got {}",
                self.state
            )));
        }
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed >= self.script.total_duration() {
            self.stop();
            info!("playback ended");
            return Ok(TickOutcome::Ended);
        }

        let (scene, pos) = self.script.scene_and_position(elapsed);
        let frame = self.compositor.compose(
            &FrameInput {
                scene,
                image: self.assets.image(&scene.id),
                progress: pos.progress,
                recording: self.recording,
            },
            self.canvas,
        )?;
        target.present(&frame, pos, elapsed)?;
        Ok(TickOutcome::Presented(pos))
    }

    /// Tick at the frame rate until the timeline ends.
    ///
    /// Starts playback when `Ready`. Between ticks the clock sleeps until the next frame
    /// boundary; late ticks skip ahead instead of queueing. Returns the number of presented
    /// frames.
    pub fn run(&mut self, target: &mut dyn FrameTarget) -> StoryreelResult<u64> {
        if self.state == PlaybackState::Ready {
            self.play()?;
        }
        let mut presented = 0u64;
        let mut next_frame = 0u64;
        loop {
            if self.cancel.is_cancelled() {
                self.stop();
                return Err(StoryreelError::Cancelled);
            }
            match self.tick(target)? {
                TickOutcome::Ended => return Ok(presented),
                TickOutcome::Presented(_) => presented += 1,
            }

            let elapsed = self.elapsed();
            let current = self.fps.secs_to_frames_floor(elapsed.as_secs_f64());
            next_frame = (next_frame + 1).max(current + 1);
            let due = frame_instant(next_frame, self.fps);
            if let Some(wait) = due.checked_sub(elapsed).filter(|w| !w.is_zero()) {
                self.clock.sleep(wait);
            }
        }
    }
}

impl<C: Clock, A: AudioOutput> Drop for PlaybackScheduler<C, A> {
    fn drop(&mut self) {
        self.audio.stop();
    }
}

/// Earliest instant at which frame `n` is due, rounded up to whole nanoseconds.
fn frame_instant(n: u64, fps: Fps) -> Duration {
    let num = u128::from(fps.num.max(1));
    let ns = (u128::from(n) * 1_000_000_000 * u128::from(fps.den)).div_ceil(num);
    Duration::from_nanos(ns.min(u128::from(u64::MAX)) as u64)
}

#[cfg(test)]
#[path = "../../tests/unit/playback/scheduler.rs"]
mod tests;
