use std::path::PathBuf;
use std::sync::Arc;

use tracing::{trace, warn};
use vello_cpu::kurbo::Shape as _;

use crate::assets::decode::PreparedImage;
use crate::foundation::core::{Affine, Canvas, Vec2};
use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::render::frame::FrameRGBA;
use crate::render::layout::LayoutMetrics;
use crate::render::text::{
    FontSet, FontTextEngine, TextBrushRgba8, TextRole, caption_text, normalize_title, wrap_text,
};
use crate::timeline::model::Scene;
use crate::timeline::position::MAX_PROGRESS;

const WHITE: TextBrushRgba8 = TextBrushRgba8 {
    r: 255,
    g: 255,
    b: 255,
    a: 255,
};
const SHADOW: TextBrushRgba8 = TextBrushRgba8 {
    r: 0,
    g: 0,
    b: 0,
    a: 153,
};
const AMBER: TextBrushRgba8 = TextBrushRgba8 {
    r: 0xFF,
    g: 0xBF,
    b: 0x00,
    a: 255,
};
const CAPTION_BOX: [u8; 4] = [0, 0, 0, 255];
const REC_RED: [u8; 4] = [230, 32, 32, 255];

/// Compositor tuning.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompositorOpts {
    /// Extra zoom reached at the end of a scene (`0.10` = 110%).
    pub zoom_rate: f64,
    /// Opacity of the black layer over the image.
    pub dim_alpha: f32,
    /// Caption length limit in characters, ellipsis included.
    pub caption_max_chars: usize,
    /// Title font file; system fonts are probed when unset.
    pub title_font: Option<PathBuf>,
    /// Caption font file; system fonts are probed when unset.
    pub caption_font: Option<PathBuf>,
}

impl Default for CompositorOpts {
    fn default() -> Self {
        Self {
            zoom_rate: 0.10,
            dim_alpha: 0.3,
            caption_max_chars: 120,
            title_font: None,
            caption_font: None,
        }
    }
}

/// Everything that determines one frame besides the canvas.
#[derive(Clone, Copy, Debug)]
pub struct FrameInput<'a> {
    /// Scene on screen.
    pub scene: &'a Scene,
    /// Resolved image, if any.
    pub image: Option<&'a PreparedImage>,
    /// Local progress through the scene in `[0, 1)`.
    pub progress: f64,
    /// Draw the recording indicator.
    pub recording: bool,
}

struct ImagePaint {
    source: Arc<Vec<u8>>,
    paint: vello_cpu::Image,
}

/// Renders the screen for a scene at a given progress.
///
/// Output depends only on the [`FrameInput`], the canvas and the options. The compositor keeps a
/// render context, shaped fonts and the last uploaded image between calls; none of that changes
/// the pixels.
pub struct Compositor {
    opts: CompositorOpts,
    text: FontTextEngine,
    ctx: Option<vello_cpu::RenderContext>,
    image: Option<ImagePaint>,
    warned_no_font: bool,
}

impl Compositor {
    /// Create a compositor, loading configured fonts or probing system ones.
    pub fn new(opts: CompositorOpts) -> StoryreelResult<Self> {
        let fonts = FontSet::load(opts.title_font.as_deref(), opts.caption_font.as_deref())?;
        Self::with_fonts(opts, &fonts)
    }

    /// Create a compositor over an explicit font set.
    pub fn with_fonts(opts: CompositorOpts, fonts: &FontSet) -> StoryreelResult<Self> {
        validate_opts(&opts)?;
        Ok(Self {
            text: FontTextEngine::new(fonts)?,
            opts,
            ctx: None,
            image: None,
            warned_no_font: false,
        })
    }

    /// Compositor options.
    pub fn opts(&self) -> &CompositorOpts {
        &self.opts
    }

    /// Render one frame.
    pub fn compose(&mut self, input: &FrameInput<'_>, canvas: Canvas) -> StoryreelResult<FrameRGBA> {
        canvas.validate()?;
        let width = canvas.width as u16;
        let height = canvas.height as u16;
        let m = LayoutMetrics::for_canvas(canvas);
        let progress = if input.progress.is_finite() {
            input.progress.clamp(0.0, MAX_PROGRESS)
        } else {
            0.0
        };
        trace!(scene = %input.scene.id, progress, width, height, "compose");

        let mut ctx = match self.ctx.take() {
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            _ => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let full = vello_cpu::kurbo::Rect::new(0.0, 0.0, m.width, m.height);

        let drawn = self.draw(&mut ctx, input, progress, &m, full);
        let out = drawn.map(|()| {
            ctx.flush();
            let mut pixmap = vello_cpu::Pixmap::new(width, height);
            ctx.render_to_pixmap(&mut pixmap);
            FrameRGBA {
                width: canvas.width,
                height: canvas.height,
                data: pixmap.data_as_u8_slice().to_vec(),
                premultiplied: true,
            }
        });
        self.ctx = Some(ctx);
        out
    }

    fn draw(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        input: &FrameInput<'_>,
        progress: f64,
        m: &LayoutMetrics,
        full: vello_cpu::kurbo::Rect,
    ) -> StoryreelResult<()> {
        ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

        // 1. background
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(0, 0, 0, 255));
        ctx.fill_rect(&full);

        // 2. Ken Burns
        if let Some(img) = input.image {
            let paint = self.image_paint(img)?;
            let xf = ken_burns_transform(img.width, img.height, m, progress, self.opts.zoom_rate);
            ctx.set_transform(affine_to_cpu(xf));
            ctx.set_paint(paint);
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                0.0,
                0.0,
                f64::from(img.width),
                f64::from(img.height),
            ));
        }

        // 3. dim
        let dim = (self.opts.dim_alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
        if dim > 0 {
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(0, 0, 0, dim));
            ctx.fill_rect(&full);
        }

        // 4. title, 5. caption
        let title = normalize_title(&input.scene.overlay_text);
        let caption = caption_text(&input.scene.narration_text, self.opts.caption_max_chars);
        if !title.is_empty() || !caption.is_empty() {
            if self.text.has_face(TextRole::Title) || self.text.has_face(TextRole::Caption) {
                if !title.is_empty() {
                    self.draw_title(ctx, &title, m)?;
                }
                if !caption.is_empty() {
                    self.draw_caption(ctx, &caption, m)?;
                }
            } else if !self.warned_no_font {
                warn!("no font available, skipping title and caption layers");
                self.warned_no_font = true;
            }
        }

        // 6. recording indicator
        if input.recording {
            let [r, g, b, a] = REC_RED;
            let dot = vello_cpu::kurbo::Circle::new(m.rec_center, m.rec_radius);
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
            ctx.fill_path(&dot.to_path(0.1));
        }
        Ok(())
    }

    fn image_paint(&mut self, img: &PreparedImage) -> StoryreelResult<vello_cpu::Image> {
        if let Some(cached) = &self.image
            && Arc::ptr_eq(&cached.source, &img.rgba8_premul)
        {
            return Ok(cached.paint.clone());
        }
        let pixmap = pixmap_from_premul_bytes(&img.rgba8_premul, img.width, img.height)?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        self.image = Some(ImagePaint {
            source: img.rgba8_premul.clone(),
            paint: paint.clone(),
        });
        Ok(paint)
    }

    fn draw_title(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        title: &str,
        m: &LayoutMetrics,
    ) -> StoryreelResult<()> {
        let size = m.title_font_px;
        let lines = wrap_text(
            title,
            m.title_wrap_width,
            &mut self.text.measurer(TextRole::Title, size),
        );
        let block = lines.len() as f64 * m.title_line_height;
        let top = m.title_center_y - block / 2.0;

        for (i, line) in lines.iter().enumerate() {
            let layout = self.text.layout_line(TextRole::Title, line, size, WHITE)?;
            let x = (m.width - f64::from(layout.width())) / 2.0;
            let y = top + i as f64 * m.title_line_height
                + (m.title_line_height - f64::from(layout.height())) / 2.0;
            let so = m.shadow_offset;
            self.fill_layout(ctx, TextRole::Title, &layout, Vec2::new(x + so, y + so), Some(SHADOW));
            self.fill_layout(ctx, TextRole::Title, &layout, Vec2::new(x, y), None);
        }
        Ok(())
    }

    fn draw_caption(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        caption: &str,
        m: &LayoutMetrics,
    ) -> StoryreelResult<()> {
        let size = m.caption_font_px;
        let lines = wrap_text(
            caption,
            m.caption_wrap_width,
            &mut self.text.measurer(TextRole::Caption, size),
        );
        let n = lines.len() as f64;
        let row = m.caption_line_height + m.caption_line_gap;

        for (i, line) in lines.iter().enumerate() {
            let layout = self.text.layout_line(TextRole::Caption, line, size, AMBER)?;
            let w = f64::from(layout.width());
            let top = m.caption_bottom - (n - i as f64) * row + m.caption_line_gap;
            let x = (m.width - w) / 2.0;

            let bx = vello_cpu::kurbo::RoundedRect::new(
                x - m.caption_pad_x,
                top,
                x + w + m.caption_pad_x,
                top + m.caption_line_height,
                m.caption_radius,
            );
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            let [r, g, b, a] = CAPTION_BOX;
            ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
            ctx.fill_path(&bx.to_path(0.1));

            let y = top + (m.caption_line_height - f64::from(layout.height())) / 2.0;
            self.fill_layout(ctx, TextRole::Caption, &layout, Vec2::new(x, y), None);
        }
        Ok(())
    }

    fn fill_layout(
        &self,
        ctx: &mut vello_cpu::RenderContext,
        role: TextRole,
        layout: &parley::Layout<TextBrushRgba8>,
        origin: Vec2,
        override_brush: Option<TextBrushRgba8>,
    ) {
        let Some(font) = self.text.font_data(role) else {
            return;
        };
        ctx.set_transform(affine_to_cpu(Affine::translate(origin)));
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = override_brush.unwrap_or(run.style().brush);
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
    }
}

fn validate_opts(opts: &CompositorOpts) -> StoryreelResult<()> {
    if !opts.zoom_rate.is_finite() || opts.zoom_rate < 0.0 {
        return Err(StoryreelError::validation("zoom_rate must be finite and >= 0"));
    }
    if !opts.dim_alpha.is_finite() || !(0.0..=1.0).contains(&opts.dim_alpha) {
        return Err(StoryreelError::validation("dim_alpha must be in [0, 1]"));
    }
    Ok(())
}

/// Image-space to canvas transform: cover fit, zoomed by `1 + progress × zoom_rate`, centered.
pub fn ken_burns_transform(
    image_w: u32,
    image_h: u32,
    m: &LayoutMetrics,
    progress: f64,
    zoom_rate: f64,
) -> Affine {
    let iw = f64::from(image_w.max(1));
    let ih = f64::from(image_h.max(1));
    let cover = (m.width / iw).max(m.height / ih);
    let scale = cover * (1.0 + progress * zoom_rate);
    let dx = (m.width - iw * scale) / 2.0;
    let dy = (m.height - ih * scale) / 2.0;
    Affine::translate((dx, dy)) * Affine::scale(scale)
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> StoryreelResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| StoryreelError::composition("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| StoryreelError::composition("image height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(StoryreelError::composition("image byte len mismatch"));
    }
    let pixels = bytes
        .chunks_exact(4)
        .map(|px| vello_cpu::peniko::color::PremulRgba8::from_u8_array([px[0], px[1], px[2], px[3]]))
        .collect::<Vec<_>>();
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, true))
}

#[cfg(test)]
#[path = "../../tests/unit/render/compositor.rs"]
mod tests;
