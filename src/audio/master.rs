use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::audio::clip::NarrationClip;
use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::timeline::model::{SceneId, Script};

/// Standard export sample rate.
pub const EXPORT_SAMPLE_RATE: u32 = 44_100;

/// Layout of the master track.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MasterAudioOpts {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count (1 or 2).
    pub channels: u16,
    /// Silence appended after the timeline so the last word is not clipped.
    pub tail_pad_secs: f64,
}

impl Default for MasterAudioOpts {
    fn default() -> Self {
        Self {
            sample_rate: EXPORT_SAMPLE_RATE,
            channels: 1,
            tail_pad_secs: 0.5,
        }
    }
}

/// One continuous narration track spanning the whole timeline.
///
/// Immutable once built; any change to the script or resolved clips means building a new one.
#[derive(Clone, Debug)]
pub struct MasterAudioBuffer {
    sample_rate: u32,
    channels: u16,
    timeline_frames: u64,
    samples: Arc<[f32]>,
}

impl MasterAudioBuffer {
    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Total sample frames including the tail pad.
    pub fn frames(&self) -> u64 {
        (self.samples.len() / usize::from(self.channels)) as u64
    }

    /// Sample frames covered by the timeline itself: `ceil(total × rate)`.
    pub fn timeline_frames(&self) -> u64 {
        self.timeline_frames
    }

    /// Buffer length in seconds including the tail pad.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Interleaved samples for frames `[start, end)`, clamped to the buffer.
    pub fn frame_range(&self, start: u64, end: u64) -> &[f32] {
        let ch = usize::from(self.channels);
        let total = self.frames();
        let s = start.min(total) as usize * ch;
        let e = end.min(total).max(start.min(total)) as usize * ch;
        &self.samples[s..e]
    }

    /// Interleaved samples from `floor(offset_secs × rate)` to the end of the buffer.
    ///
    /// Negative or NaN offsets start at 0; offsets past the end give an empty slice.
    pub fn samples_from_secs(&self, offset_secs: f64) -> &[f32] {
        let start = if offset_secs.is_nan() || offset_secs <= 0.0 {
            0
        } else {
            (offset_secs * f64::from(self.sample_rate)).floor() as u64
        };
        self.frame_range(start, self.frames())
    }

    /// Return `true` if any sample in frames `[start, end)` is non-zero.
    pub fn has_signal(&self, start: u64, end: u64) -> bool {
        self.frame_range(start, end).iter().any(|&s| s != 0.0)
    }

    /// Write the buffer as little-endian `f32` raw PCM (input format for streaming sinks).
    pub fn write_f32le_file(&self, out_path: &Path) -> StoryreelResult<()> {
        write_f32le_file(&self.samples, out_path)
    }
}

/// Stitch per-scene narration into one master buffer.
///
/// Each scene's clip starts at `floor(start × rate)`. Clips may run past their scene; overflow
/// past the buffer end is truncated. Scenes are placed in order, so a later clip overwrites any
/// overrun from an earlier one. Missing clips and [`NarrationClip::Silence`] leave zeros.
#[tracing::instrument(skip(script, clips), fields(scenes = script.len()))]
pub fn synthesize_master(
    script: &Script,
    clips: &HashMap<SceneId, NarrationClip>,
    opts: MasterAudioOpts,
) -> StoryreelResult<MasterAudioBuffer> {
    if opts.sample_rate == 0 {
        return Err(StoryreelError::synthesis("sample_rate must be > 0"));
    }
    if !(1..=2).contains(&opts.channels) {
        return Err(StoryreelError::synthesis(format!(
            "master channels must be 1 or 2, got {}",
            opts.channels
        )));
    }
    if !opts.tail_pad_secs.is_finite() || opts.tail_pad_secs < 0.0 {
        return Err(StoryreelError::synthesis("tail_pad_secs must be >= 0"));
    }

    let ch = usize::from(opts.channels);
    let timeline_frames = script.total_samples(opts.sample_rate);
    let pad_frames = (opts.tail_pad_secs * f64::from(opts.sample_rate)).ceil() as u64;
    let total_frames = timeline_frames + pad_frames;
    let mut out = vec![0.0f32; total_frames as usize * ch];

    let mut placed = 0usize;
    for (i, scene) in script.scenes().iter().enumerate() {
        let Some(NarrationClip::Pcm(clip)) = clips.get(&scene.id) else {
            debug!(scene = %scene.id, "no narration, leaving silence");
            continue;
        };
        let clip = clip
            .conform(opts.sample_rate, opts.channels)
            .map_err(|e| StoryreelError::synthesis(format!("scene '{}': {e}", scene.id)))?;

        let start = script.start_sample(i, opts.sample_rate).unwrap_or(0) as usize * ch;
        if start >= out.len() {
            continue;
        }
        let n = clip.samples.len().min(out.len() - start);
        out[start..start + n].copy_from_slice(&clip.samples[..n]);
        placed += 1;
    }

    info!(
        frames = total_frames,
        placed,
        sample_rate = opts.sample_rate,
        "master audio synthesized"
    );

    Ok(MasterAudioBuffer {
        sample_rate: opts.sample_rate,
        channels: opts.channels,
        timeline_frames,
        samples: Arc::from(out),
    })
}

/// Write interleaved `f32` samples to a raw little-endian `.f32le` file.
pub(crate) fn write_f32le_file(samples_interleaved: &[f32], out_path: &Path) -> StoryreelResult<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            StoryreelError::synthesis(format!(
                "failed to create audio output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut bytes = Vec::<u8>::with_capacity(samples_interleaved.len() * 4);
    for &sample in samples_interleaved {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        StoryreelError::synthesis(format!(
            "failed to write audio file '{}': {e}",
            out_path.display()
        ))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/audio/master.rs"]
mod tests;
