use std::f64::consts::TAU;

use crate::audio::master::MasterAudioBuffer;

/// Near-silent sine mixed under captured audio so the encoder never sees an idle track.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct KeepAliveTone {
    /// Tone frequency in Hz.
    pub frequency_hz: f64,
    /// Peak amplitude in `[0, 1]`. `0.0015` is about -56 dBFS.
    pub amplitude: f32,
}

impl Default for KeepAliveTone {
    fn default() -> Self {
        Self {
            frequency_hz: 40.0,
            amplitude: 0.0015,
        }
    }
}

impl KeepAliveTone {
    /// A tone that adds nothing.
    pub const OFF: KeepAliveTone = KeepAliveTone {
        frequency_hz: 40.0,
        amplitude: 0.0,
    };

    /// Tone sample at `frame` for the given sample rate.
    pub fn sample_at(&self, frame: u64, sample_rate: u32) -> f32 {
        let t = frame as f64 / f64::from(sample_rate.max(1));
        self.amplitude * ((TAU * self.frequency_hz * t).sin() as f32)
    }

    /// Copy of the master samples with the tone added to every channel.
    ///
    /// The master buffer itself is left untouched.
    pub fn mix_into_copy(&self, master: &MasterAudioBuffer) -> Vec<f32> {
        let ch = usize::from(master.channels());
        let rate = master.sample_rate();
        let mut out = master.samples().to_vec();
        if self.amplitude == 0.0 {
            return out;
        }
        for (frame, chunk) in out.chunks_exact_mut(ch).enumerate() {
            let s = self.sample_at(frame as u64, rate);
            for v in chunk {
                *v = (*v + s).clamp(-1.0, 1.0);
            }
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/audio/tone.rs"]
mod tests;
