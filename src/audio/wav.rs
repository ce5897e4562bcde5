use std::io::Write;
use std::path::Path;

use crate::audio::clip::PcmClip;
use crate::audio::master::MasterAudioBuffer;
use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::foundation::math::f32_to_i16;

/// `WAVE_FORMAT_PCM`.
pub const FORMAT_PCM: u16 = 1;
/// `WAVE_FORMAT_IEEE_FLOAT`.
pub const FORMAT_IEEE_FLOAT: u16 = 3;

const RIFF_HEADER_LEN: usize = 44;

/// Parsed `fmt ` fields plus the `data` chunk location.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WavHeader {
    /// Format tag (1 = PCM, 3 = IEEE float).
    pub format_tag: u16,
    /// Channel count.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per sample.
    pub bits_per_sample: u16,
    /// Byte offset of the `data` payload.
    pub data_offset: usize,
    /// Length of the `data` payload in bytes.
    pub data_len: u32,
}

impl WavHeader {
    /// Return `true` if `bytes` starts like a RIFF/WAVE file.
    pub fn sniff(bytes: &[u8]) -> bool {
        bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
    }

    /// Parse the RIFF chunk list, locating `fmt ` and `data`.
    pub fn parse(bytes: &[u8]) -> StoryreelResult<Self> {
        if !Self::sniff(bytes) {
            return Err(StoryreelError::validation("not a RIFF/WAVE file"));
        }

        let mut fmt: Option<(u16, u16, u32, u16)> = None;
        let mut pos = 12usize;
        while pos + 8 <= bytes.len() {
            let id = &bytes[pos..pos + 4];
            let len = read_u32(bytes, pos + 4)? as usize;
            let body = pos + 8;
            match id {
                b"fmt " => {
                    if len < 16 || body + 16 > bytes.len() {
                        return Err(StoryreelError::validation("truncated fmt chunk"));
                    }
                    fmt = Some((
                        read_u16(bytes, body)?,
                        read_u16(bytes, body + 2)?,
                        read_u32(bytes, body + 4)?,
                        read_u16(bytes, body + 14)?,
                    ));
                }
                b"data" => {
                    let (format_tag, channels, sample_rate, bits_per_sample) = fmt
                        .ok_or_else(|| StoryreelError::validation("data chunk before fmt chunk"))?;
                    // Streaming writers may leave the length unset; clamp to what is present.
                    let available = bytes.len().saturating_sub(body);
                    return Ok(Self {
                        format_tag,
                        channels,
                        sample_rate,
                        bits_per_sample,
                        data_offset: body,
                        data_len: len.min(available) as u32,
                    });
                }
                _ => {}
            }
            // Chunks are word aligned.
            pos = body.saturating_add(len).saturating_add(len & 1);
        }
        Err(StoryreelError::validation("wav has no data chunk"))
    }
}

/// Decode a PCM16 or float32 WAV blob into a clip.
pub fn decode_wav(bytes: &[u8]) -> StoryreelResult<PcmClip> {
    let h = WavHeader::parse(bytes)?;
    let data = &bytes[h.data_offset..h.data_offset + h.data_len as usize];
    let samples: Vec<f32> = match (h.format_tag, h.bits_per_sample) {
        (FORMAT_PCM, 16) => data
            .chunks_exact(2)
            .map(|c| f32::from(i16::from_le_bytes([c[0], c[1]])) / 32768.0)
            .collect(),
        (FORMAT_IEEE_FLOAT, 32) => data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        (tag, bits) => {
            return Err(StoryreelError::validation(format!(
                "unsupported wav encoding: format tag {tag}, {bits} bits"
            )));
        }
    };
    let whole = samples.len() - samples.len() % usize::from(h.channels.max(1));
    let mut samples = samples;
    samples.truncate(whole);
    PcmClip::new(h.sample_rate, h.channels, samples)
}

/// Serialize interleaved samples as a 16-bit PCM WAV stream.
pub fn write_wav_pcm16<W: Write>(
    w: &mut W,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> StoryreelResult<()> {
    let data_len = samples
        .len()
        .checked_mul(2)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| *n <= u32::MAX - (RIFF_HEADER_LEN as u32 - 8))
        .ok_or_else(|| StoryreelError::synthesis("audio too long for a RIFF container"))?;
    let block_align = channels * 2;
    let byte_rate = sample_rate * u32::from(block_align);

    let mut out = Vec::with_capacity(RIFF_HEADER_LEN + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for &s in samples {
        out.extend_from_slice(&f32_to_i16(s).to_le_bytes());
    }

    w.write_all(&out)
        .map_err(|e| StoryreelError::synthesis(format!("failed to write wav: {e}")))
}

impl MasterAudioBuffer {
    /// Encode the buffer as a 16-bit PCM WAV in memory.
    pub fn to_wav_bytes(&self) -> StoryreelResult<Vec<u8>> {
        let mut out = Vec::new();
        write_wav_pcm16(&mut out, self.samples(), self.sample_rate(), self.channels())?;
        Ok(out)
    }

    /// Write the buffer as a 16-bit PCM WAV file.
    pub fn write_wav_file(&self, path: &Path) -> StoryreelResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoryreelError::synthesis(format!(
                    "failed to create wav output directory '{}': {e}",
                    parent.display()
                ))
            })?;
        }
        let bytes = self.to_wav_bytes()?;
        std::fs::write(path, bytes).map_err(|e| {
            StoryreelError::synthesis(format!("failed to write wav '{}': {e}", path.display()))
        })
    }
}

fn read_u16(b: &[u8], at: usize) -> StoryreelResult<u16> {
    b.get(at..at + 2)
        .map(|s| u16::from_le_bytes([s[0], s[1]]))
        .ok_or_else(|| StoryreelError::validation("truncated wav header"))
}

fn read_u32(b: &[u8], at: usize) -> StoryreelResult<u32> {
    b.get(at..at + 4)
        .map(|s| u32::from_le_bytes([s[0], s[1], s[2], s[3]]))
        .ok_or_else(|| StoryreelError::validation("truncated wav header"))
}

#[cfg(test)]
#[path = "../../tests/unit/audio/wav.rs"]
mod tests;
