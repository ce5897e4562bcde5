/// `round(x * y / 255)` for 8-bit channel math.
pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

/// Linear interpolation between `a` and `b`.
pub(crate) fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Convert a float sample in `[-1, 1]` to signed 16-bit PCM.
pub(crate) fn f32_to_i16(sample: f32) -> i16 {
    let s = if sample.is_finite() { sample } else { 0.0 };
    (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
