use crate::foundation::error::{StoryreelError, StoryreelResult};

pub use kurbo::{Affine, Rect, Vec2};

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Fixed export target: vertical 1080x1920.
    pub const EXPORT: Canvas = Canvas {
        width: 1080,
        height: 1920,
    };

    /// Low-density preview canvas with the export aspect ratio.
    pub const PREVIEW: Canvas = Canvas {
        width: 360,
        height: 640,
    };

    /// Create a validated canvas.
    ///
    /// Dimensions must be non-zero, even (yuv420p output) and fit the raster backend (`u16`).
    pub fn new(width: u32, height: u32) -> StoryreelResult<Self> {
        let c = Self { width, height };
        c.validate()?;
        Ok(c)
    }

    /// Validate dimensions against encoder and rasterizer limits.
    pub fn validate(self) -> StoryreelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(StoryreelError::validation("canvas width/height must be > 0"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            return Err(StoryreelError::validation(
                "canvas width/height must be even (required for yuv420p output)",
            ));
        }
        if self.width > u32::from(u16::MAX) || self.height > u32::from(u16::MAX) {
            return Err(StoryreelError::validation(
                "canvas width/height must fit in 16 bits",
            ));
        }
        Ok(())
    }

    /// Width as `f64`.
    pub fn w(self) -> f64 {
        f64::from(self.width)
    }

    /// Height as `f64`.
    pub fn h(self) -> f64 {
        f64::from(self.height)
    }

    /// Number of bytes in one tightly packed RGBA8 frame.
    pub fn rgba_len(self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }
}

/// Frames-per-second represented as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// The fixed export frame rate.
    pub const EXPORT: Fps = Fps { num: 30, den: 1 };

    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> StoryreelResult<Self> {
        if den == 0 {
            return Err(StoryreelError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(StoryreelError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// Duration of one frame in seconds.
    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    /// Convert frame count to seconds.
    pub fn frames_to_secs(self, frames: u64) -> f64 {
        (frames as f64) * self.frame_duration_secs()
    }

    /// Convert seconds to frame count using floor semantics.
    pub fn secs_to_frames_floor(self, secs: f64) -> u64 {
        (secs * self.as_f64()).floor().max(0.0) as u64
    }

    /// Convert seconds to frame count using ceil semantics.
    pub fn secs_to_frames_ceil(self, secs: f64) -> u64 {
        (secs * self.as_f64()).ceil().max(0.0) as u64
    }

    /// `num/den` form understood by `ffmpeg` rate options.
    pub fn to_ffmpeg_rate(self) -> String {
        format!("{}/{}", self.num, self.den)
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Opaque black.
    pub const BLACK: Rgba8Premul = Rgba8Premul {
        r: 0,
        g: 0,
        b: 0,
        a: 255,
    };

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        Self {
            r: premul(r, a),
            g: premul(g, a),
            b: premul(b, a),
            a,
        }
    }

    /// Parse `#rrggbb` or `#rrggbbaa` into a premultiplied color.
    pub fn from_hex(hex: &str) -> StoryreelResult<Self> {
        let s = hex.trim().trim_start_matches('#');
        let byte = |i: usize| -> StoryreelResult<u8> {
            s.get(i..i + 2)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| StoryreelError::validation(format!("invalid hex color '{hex}'")))
        };
        match s.len() {
            6 => Ok(Self::from_straight_rgba(byte(0)?, byte(2)?, byte(4)?, 255)),
            8 => Ok(Self::from_straight_rgba(
                byte(0)?,
                byte(2)?,
                byte(4)?,
                byte(6)?,
            )),
            _ => Err(StoryreelError::validation(format!(
                "invalid hex color '{hex}'"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
