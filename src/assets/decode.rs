use std::io::Cursor;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use anyhow::Context;
use tracing::debug;

use crate::audio::clip::PcmClip;
use crate::audio::wav::{WavHeader, decode_wav};
use crate::foundation::error::{StoryreelError, StoryreelResult};

/// Largest accepted image side in pixels.
pub const MAX_IMAGE_DIM: u32 = 16_384;

/// Fully decoded raster image in premultiplied RGBA8 form.
#[derive(Clone, Debug, PartialEq)]
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Wrap already premultiplied pixels, checking the buffer length.
    pub fn from_premul(width: u32, height: u32, rgba8_premul: Vec<u8>) -> StoryreelResult<Self> {
        check_dims(width, height)?;
        if rgba8_premul.len() != width as usize * height as usize * 4 {
            return Err(StoryreelError::validation("image byte length mismatch"));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
        })
    }

    /// Premultiplied pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let p = &self.rgba8_premul[i..i + 4];
        Some([p[0], p[1], p[2], p[3]])
    }
}

fn check_dims(width: u32, height: u32) -> StoryreelResult<()> {
    if width == 0 || height == 0 {
        return Err(StoryreelError::asset("image has zero size"));
    }
    if width > MAX_IMAGE_DIM || height > MAX_IMAGE_DIM {
        return Err(StoryreelError::asset(format!(
            "image too large: {width}x{height} (max {MAX_IMAGE_DIM}x{MAX_IMAGE_DIM})"
        )));
    }
    Ok(())
}

/// Decode encoded image bytes (PNG, JPEG, WebP, ...) into premultiplied RGBA8.
///
/// Dimensions are checked before the pixel data is decoded.
pub fn decode_image(bytes: &[u8]) -> StoryreelResult<PreparedImage> {
    let (w, h) = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("guess image format")?
        .into_dimensions()
        .context("read image dimensions")?;
    check_dims(w, h)?;

    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((u16::from(px[0]) * a + 127) / 255) as u8;
        px[1] = ((u16::from(px[1]) * a + 127) / 255) as u8;
        px[2] = ((u16::from(px[2]) * a + 127) / 255) as u8;
    }
}

/// Turns encoded narration bytes into PCM.
pub trait AudioDecoder: Send + Sync {
    /// Decode one encoded payload.
    fn decode(&self, bytes: &[u8]) -> StoryreelResult<PcmClip>;
}

/// Decodes RIFF/WAVE natively and everything else through the system `ffmpeg`.
#[derive(Clone, Copy, Debug)]
pub struct FfmpegAudioDecoder {
    /// Output sample rate requested from `ffmpeg`.
    pub sample_rate: u32,
    /// Output channel count requested from `ffmpeg`.
    pub channels: u16,
}

impl FfmpegAudioDecoder {
    /// Create a decoder producing the given layout for non-WAV input.
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

impl AudioDecoder for FfmpegAudioDecoder {
    fn decode(&self, bytes: &[u8]) -> StoryreelResult<PcmClip> {
        if WavHeader::sniff(bytes) {
            return decode_wav(bytes);
        }
        let tmp = tempfile::Builder::new()
            .prefix("storyreel_narration_")
            .tempfile()
            .context("create narration temp file")?;
        std::fs::write(tmp.path(), bytes).context("write narration temp file")?;
        decode_audio_file_f32(tmp.path(), self.sample_rate, self.channels)
    }
}

/// Native WAV-only decoder.
#[derive(Clone, Copy, Debug, Default)]
pub struct WavAudioDecoder;

impl AudioDecoder for WavAudioDecoder {
    fn decode(&self, bytes: &[u8]) -> StoryreelResult<PcmClip> {
        decode_wav(bytes)
    }
}

/// Decode any audio file `ffmpeg` understands into interleaved `f32` PCM.
pub fn decode_audio_file_f32(
    path: &Path,
    sample_rate: u32,
    channels: u16,
) -> StoryreelResult<PcmClip> {
    let out = Command::new("ffmpeg")
        .args(["-v", "error", "-i"])
        .arg(path)
        .args([
            "-vn",
            "-f",
            "f32le",
            "-acodec",
            "pcm_f32le",
            "-ac",
            &channels.to_string(),
            "-ar",
            &sample_rate.to_string(),
            "pipe:1",
        ])
        .output()
        .map_err(|e| StoryreelError::asset(format!("failed to run ffmpeg for audio decode: {e}")))?;

    if !out.status.success() {
        return Err(StoryreelError::asset(format!(
            "ffmpeg audio decode failed for '{}': {}",
            path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }
    if !out.stdout.len().is_multiple_of(4) {
        return Err(StoryreelError::asset(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }

    let mut pcm = Vec::<f32>::with_capacity(out.stdout.len() / 4);
    for chunk in out.stdout.chunks_exact(4) {
        pcm.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    let whole = pcm.len() - pcm.len() % usize::from(channels.max(1));
    pcm.truncate(whole);
    debug!(samples = pcm.len(), "decoded audio via ffmpeg");
    PcmClip::new(sample_rate, channels, pcm)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/decode.rs"]
mod tests;
