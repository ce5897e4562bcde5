use crate::audio::master::MasterAudioBuffer;
use crate::foundation::error::StoryreelResult;
use crate::render::frame::FrameRGBA;
use crate::timeline::position::ScenePosition;

/// Narration sink with at most one active source.
pub trait AudioOutput {
    /// Start playing `buffer` from `offset_secs`.
    fn start(&mut self, buffer: &MasterAudioBuffer, offset_secs: f64) -> StoryreelResult<()>;
    /// Stop the active source, if any. Idempotent.
    fn stop(&mut self);
    /// Return `true` while a source is playing.
    fn is_active(&self) -> bool;
}

/// Audio output that plays nothing but tracks whether it would be active.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullAudioOutput {
    active: bool,
}

impl AudioOutput for NullAudioOutput {
    fn start(&mut self, _buffer: &MasterAudioBuffer, _offset_secs: f64) -> StoryreelResult<()> {
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Receives composed frames from the scheduler.
pub trait FrameTarget {
    /// Show `frame`, composed for `position` at timeline time `elapsed_secs`.
    fn present(
        &mut self,
        frame: &FrameRGBA,
        position: ScenePosition,
        elapsed_secs: f64,
    ) -> StoryreelResult<()>;
}

/// Frame target that discards frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullFrameTarget;

impl FrameTarget for NullFrameTarget {
    fn present(&mut self, _: &FrameRGBA, _: ScenePosition, _: f64) -> StoryreelResult<()> {
        Ok(())
    }
}
