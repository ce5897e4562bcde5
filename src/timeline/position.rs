use crate::timeline::model::{Scene, Script};

/// Largest representable progress value below 1.
pub const MAX_PROGRESS: f64 = 1.0 - f64::EPSILON;

/// Where a timeline instant lands: scene index, seconds into it and normalized progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScenePosition {
    /// Index of the active scene.
    pub index: usize,
    /// Seconds elapsed since the scene start, clamped to the scene duration.
    pub local_elapsed: f64,
    /// `local_elapsed / duration`, clamped to `[0, 1)`.
    pub progress: f64,
}

/// Normalized progress through `scene` after `local_elapsed` seconds, clamped to `[0, 1)`.
pub fn local_progress(scene: &Scene, local_elapsed: f64) -> f64 {
    if !local_elapsed.is_finite() || local_elapsed <= 0.0 {
        return 0.0;
    }
    (local_elapsed / scene.duration).clamp(0.0, MAX_PROGRESS)
}

impl Script {
    /// Resolve timeline time `t` (seconds) to the scene on screen.
    ///
    /// Total and deterministic: negative or NaN times map to the start of the first scene and
    /// times at or past the end map to the last scene.
    pub fn scene_at(&self, t: f64) -> ScenePosition {
        let t = if t.is_nan() { 0.0 } else { t.max(0.0) };
        let starts = self.starts();
        // Last scene whose start is <= t.
        let index = starts.partition_point(|&s| s <= t).saturating_sub(1);
        let index = index.min(self.len() - 1);

        let scene = &self.scenes()[index];
        let local_elapsed = (t - starts[index]).clamp(0.0, scene.duration);
        ScenePosition {
            index,
            local_elapsed,
            progress: local_progress(scene, local_elapsed),
        }
    }

    /// Scene and position for timeline time `t`.
    pub fn scene_and_position(&self, t: f64) -> (&Scene, ScenePosition) {
        let pos = self.scene_at(t);
        (&self.scenes()[pos.index], pos)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/position.rs"]
mod tests;
