use std::path::{Path, PathBuf};

use tracing::{info, trace};

use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::playback::output::FrameTarget;
use crate::render::frame::FrameRGBA;
use crate::timeline::position::ScenePosition;

/// Headless preview surface.
///
/// Logs each scene as it comes on screen and, with a frames directory, saves every presented
/// frame as `frame-NNNNN.png`.
#[derive(Debug, Default)]
pub struct PreviewTarget {
    frames_dir: Option<PathBuf>,
    current_scene: Option<usize>,
    presented: u64,
}

impl PreviewTarget {
    /// Target that only logs scene changes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also save presented frames under `dir`, creating it if needed.
    pub fn with_frames_dir(dir: impl Into<PathBuf>) -> StoryreelResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            StoryreelError::composition(format!(
                "failed to create preview directory '{}': {e}",
                dir.display()
            ))
        })?;
        Ok(Self {
            frames_dir: Some(dir),
            ..Self::default()
        })
    }

    /// Frames presented so far.
    pub fn presented(&self) -> u64 {
        self.presented
    }

    /// Directory receiving frames, if any.
    pub fn frames_dir(&self) -> Option<&Path> {
        self.frames_dir.as_deref()
    }
}

impl FrameTarget for PreviewTarget {
    fn present(
        &mut self,
        frame: &FrameRGBA,
        position: ScenePosition,
        elapsed_secs: f64,
    ) -> StoryreelResult<()> {
        if self.current_scene != Some(position.index) {
            info!(scene = position.index, at = elapsed_secs, "scene on screen");
            self.current_scene = Some(position.index);
        }
        if let Some(dir) = &self.frames_dir {
            let path = dir.join(format!("frame-{:05}.png", self.presented));
            trace!(path = %path.display(), "saving preview frame");
            frame.save_png(&path)?;
        }
        self.presented += 1;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/playback/preview.rs"]
mod tests;
