use std::sync::Arc;

use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::foundation::math::lerp_f32;

/// Decoded interleaved `f32` PCM.
#[derive(Clone, Debug, PartialEq)]
pub struct PcmClip {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count (1 or 2).
    pub channels: u16,
    /// Interleaved samples.
    pub samples: Arc<Vec<f32>>,
}

impl PcmClip {
    /// Create a validated clip.
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> StoryreelResult<Self> {
        if sample_rate == 0 {
            return Err(StoryreelError::validation("clip sample_rate must be > 0"));
        }
        if !(1..=2).contains(&channels) {
            return Err(StoryreelError::validation(format!(
                "clip channels must be 1 or 2, got {channels}"
            )));
        }
        if !samples.len().is_multiple_of(usize::from(channels)) {
            return Err(StoryreelError::validation(
                "clip sample count is not a multiple of channel count",
            ));
        }
        Ok(Self {
            sample_rate,
            channels,
            samples: Arc::new(samples),
        })
    }

    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.channels)
    }

    /// Clip length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Return `true` when the clip holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Convert to `sample_rate` and `channels`, resampling linearly when rates differ.
    ///
    /// Returns a cheap clone when the layout already matches.
    pub fn conform(&self, sample_rate: u32, channels: u16) -> StoryreelResult<PcmClip> {
        if sample_rate == 0 || !(1..=2).contains(&channels) {
            return Err(StoryreelError::validation(
                "conform target must have sample_rate > 0 and 1 or 2 channels",
            ));
        }
        if self.sample_rate == sample_rate && self.channels == channels {
            return Ok(self.clone());
        }

        let src_frames = self.frames();
        let src_ch = usize::from(self.channels);
        let frame_at = |i: usize| -> (f32, f32) {
            let base = i * src_ch;
            if src_ch == 1 {
                let v = self.samples[base];
                (v, v)
            } else {
                (self.samples[base], self.samples[base + 1])
            }
        };

        let out_frames = if self.sample_rate == sample_rate {
            src_frames
        } else {
            ((src_frames as u128 * u128::from(sample_rate)) / u128::from(self.sample_rate)) as usize
        };
        let step = f64::from(self.sample_rate) / f64::from(sample_rate);

        let mut out = Vec::with_capacity(out_frames * usize::from(channels));
        for i in 0..out_frames {
            let (l, r) = if self.sample_rate == sample_rate {
                frame_at(i)
            } else {
                let pos = i as f64 * step;
                let i0 = (pos.floor() as usize).min(src_frames.saturating_sub(1));
                let i1 = (i0 + 1).min(src_frames.saturating_sub(1));
                let frac = (pos - i0 as f64) as f32;
                let (l0, r0) = frame_at(i0);
                let (l1, r1) = frame_at(i1);
                (lerp_f32(l0, l1, frac), lerp_f32(r0, r1, frac))
            };
            if channels == 1 {
                out.push(if src_ch == 1 { l } else { 0.5 * (l + r) });
            } else {
                out.push(l);
                out.push(r);
            }
        }

        PcmClip::new(sample_rate, channels, out)
    }
}

/// Per-scene narration: decoded audio or the explicit "no narration" sentinel.
#[derive(Clone, Debug, PartialEq)]
pub enum NarrationClip {
    /// Decoded narration audio.
    Pcm(PcmClip),
    /// No narration for this scene. Distinct from an empty clip or an error.
    Silence,
}

impl NarrationClip {
    /// Return `true` for the silence sentinel.
    pub fn is_silence(&self) -> bool {
        matches!(self, NarrationClip::Silence)
    }

    /// Borrow the decoded clip, if any.
    pub fn as_pcm(&self) -> Option<&PcmClip> {
        match self {
            NarrationClip::Pcm(c) => Some(c),
            NarrationClip::Silence => None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/clip.rs"]
mod tests;
