use crate::foundation::core::Canvas;

/// Width every relative size is expressed against.
pub const REFERENCE_WIDTH: f64 = 1080.0;

/// Pixel sizes and offsets for one canvas.
///
/// Everything derives from the canvas size, so the preview and export canvases lay out
/// identically up to scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutMetrics {
    /// Canvas width in pixels.
    pub width: f64,
    /// Canvas height in pixels.
    pub height: f64,
    /// `width / 1080`.
    pub scale: f64,

    /// Title font size (9% of width).
    pub title_font_px: f32,
    /// Distance between title baselines.
    pub title_line_height: f64,
    /// Vertical center of the title block: the middle of the frame.
    pub title_center_y: f64,
    /// Drop shadow offset, about 5% of the title size.
    pub shadow_offset: f64,
    /// Maximum title line width (90% of width).
    pub title_wrap_width: f32,

    /// Caption font size (4.6% of width).
    pub caption_font_px: f32,
    /// Height of one caption row including its box.
    pub caption_line_height: f64,
    /// Gap between caption boxes.
    pub caption_line_gap: f64,
    /// Horizontal padding inside a caption box.
    pub caption_pad_x: f64,
    /// Caption box corner radius.
    pub caption_radius: f64,
    /// Bottom edge of the caption block (height minus the 12% safe area).
    pub caption_bottom: f64,
    /// Maximum caption text width.
    pub caption_wrap_width: f32,

    /// Recording indicator center.
    pub rec_center: (f64, f64),
    /// Recording indicator radius.
    pub rec_radius: f64,
}

impl LayoutMetrics {
    /// Metrics for `canvas`.
    pub fn for_canvas(canvas: Canvas) -> Self {
        let w = canvas.w();
        let h = canvas.h();
        let s = w / REFERENCE_WIDTH;

        let title = w * 0.09;
        let caption = w * 0.046;
        let pad_x = caption * 0.4;

        Self {
            width: w,
            height: h,
            scale: s,

            title_font_px: title as f32,
            title_line_height: title * 1.15,
            title_center_y: h * 0.5,
            shadow_offset: title * 0.05,
            title_wrap_width: (w * 0.90) as f32,

            caption_font_px: caption as f32,
            caption_line_height: caption * 1.5,
            caption_line_gap: caption * 0.15,
            caption_pad_x: pad_x,
            caption_radius: caption * 0.3,
            caption_bottom: h * (1.0 - 0.12),
            caption_wrap_width: (w * 0.90 - 2.0 * pad_x) as f32,

            rec_center: (w - 60.0 * s, 60.0 * s),
            rec_radius: 18.0 * s,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/layout.rs"]
mod tests;
