use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::foundation::error::{StoryreelError, StoryreelResult};

/// Uppercase title with `_ - | /` turned into spaces and whitespace collapsed.
pub fn normalize_title(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| match c {
            '_' | '-' | '|' | '/' => ' ',
            c => c,
        })
        .collect();
    replaced
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Narration shortened at a word boundary to at most `max_chars` characters, ellipsis included.
pub fn caption_text(narration: &str, max_chars: usize) -> String {
    let collapsed = narration.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    if max_chars == 0 {
        return String::new();
    }

    let head: String = collapsed.chars().take(max_chars - 1).collect();
    // Cut at the last space if that keeps at least one word; otherwise hard cut.
    let cut = match head.rfind(' ') {
        Some(i) if i > 0 => &head[..i],
        _ => head.as_str(),
    };
    let mut out = cut.trim_end_matches([',', ';', ':', '.', ' ']).to_string();
    if out.is_empty() {
        out = head.clone();
    }
    out.push('\u{2026}');
    out
}

/// Measures rendered text width in pixels.
pub trait TextMeasure {
    /// Advance width of `text` laid out on one line.
    fn measure(&mut self, text: &str) -> f32;
}

/// Every character advances by the same amount. Deterministic, font-free.
#[derive(Clone, Copy, Debug)]
pub struct FixedAdvanceMeasure {
    /// Advance per character in pixels.
    pub advance: f32,
}

impl TextMeasure for FixedAdvanceMeasure {
    fn measure(&mut self, text: &str) -> f32 {
        text.chars().count() as f32 * self.advance
    }
}

/// Greedy word wrap to `max_width`.
///
/// Words wider than a whole line are split by characters. A single character wider than
/// `max_width` sits on its own line, so the loop always makes progress.
pub fn wrap_text<M: TextMeasure + ?Sized>(text: &str, max_width: f32, m: &mut M) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if !line.is_empty() {
            let candidate = format!("{line} {word}");
            if m.measure(&candidate) <= max_width {
                line = candidate;
                continue;
            }
            lines.push(std::mem::take(&mut line));
        }

        if m.measure(word) <= max_width {
            line.push_str(word);
            continue;
        }

        let mut chunk = String::new();
        for c in word.chars() {
            let mut next = chunk.clone();
            next.push(c);
            if !chunk.is_empty() && m.measure(&next) > max_width {
                lines.push(std::mem::replace(&mut chunk, c.to_string()));
            } else {
                chunk = next;
            }
        }
        line = chunk;
    }

    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

const TITLE_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Supplemental/Arial Bold.ttf",
    "C:\\Windows\\Fonts\\arialbd.ttf",
];

const CAPTION_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Raw font bytes for the two text roles.
#[derive(Clone, Debug, Default)]
pub struct FontSet {
    /// Bold title face.
    pub title: Option<Arc<Vec<u8>>>,
    /// Caption face; falls back to the title face when absent.
    pub caption: Option<Arc<Vec<u8>>>,
}

impl FontSet {
    /// No fonts: text layers are skipped.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load configured font files, probing system locations for roles left unset.
    pub fn load(title: Option<&Path>, caption: Option<&Path>) -> StoryreelResult<Self> {
        let title = match title {
            Some(p) => Some(read_font(p)?),
            None => probe(TITLE_FONT_CANDIDATES),
        };
        let caption = match caption {
            Some(p) => Some(read_font(p)?),
            None => probe(CAPTION_FONT_CANDIDATES),
        };
        Ok(Self { title, caption })
    }

    /// Return `true` when neither role has a face.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.caption.is_none()
    }

    /// Face used for `role`.
    pub fn face(&self, role: TextRole) -> Option<&Arc<Vec<u8>>> {
        match role {
            TextRole::Title => self.title.as_ref().or(self.caption.as_ref()),
            TextRole::Caption => self.caption.as_ref().or(self.title.as_ref()),
        }
    }
}

fn read_font(path: &Path) -> StoryreelResult<Arc<Vec<u8>>> {
    std::fs::read(path).map(Arc::new).map_err(|e| {
        StoryreelError::validation(format!("failed to read font '{}': {e}", path.display()))
    })
}

fn probe(candidates: &[&str]) -> Option<Arc<Vec<u8>>> {
    candidates.iter().map(PathBuf::from).find_map(|p| {
        let bytes = std::fs::read(&p).ok()?;
        debug!(font = %p.display(), "using system font");
        Some(Arc::new(bytes))
    })
}

/// Which face a piece of text uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextRole {
    /// Overlay title.
    Title,
    /// Narration caption.
    Caption,
}

/// RGBA8 brush color used by Parley text layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrushRgba8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

struct RegisteredFace {
    family: String,
    font: vello_cpu::peniko::FontData,
}

/// Parley shaping over a [`FontSet`], with each face registered once.
pub struct FontTextEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    title: Option<RegisteredFace>,
    caption: Option<RegisteredFace>,
}

impl FontTextEngine {
    /// Register the faces of `fonts`.
    pub fn new(fonts: &FontSet) -> StoryreelResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let title = fonts
            .face(TextRole::Title)
            .map(|b| register(&mut font_ctx, b))
            .transpose()?;
        let caption = fonts
            .face(TextRole::Caption)
            .map(|b| register(&mut font_ctx, b))
            .transpose()?;
        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            title,
            caption,
        })
    }

    /// Return `true` if `role` can be drawn.
    pub fn has_face(&self, role: TextRole) -> bool {
        self.face(role).is_some()
    }

    fn face(&self, role: TextRole) -> Option<&RegisteredFace> {
        match role {
            TextRole::Title => self.title.as_ref(),
            TextRole::Caption => self.caption.as_ref(),
        }
    }

    /// Font handle for glyph drawing.
    pub(crate) fn font_data(&self, role: TextRole) -> Option<&vello_cpu::peniko::FontData> {
        self.face(role).map(|f| &f.font)
    }

    /// Shape `text` as a single unbroken line.
    pub fn layout_line(
        &mut self,
        role: TextRole,
        text: &str,
        size_px: f32,
        brush: TextBrushRgba8,
    ) -> StoryreelResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(StoryreelError::validation(
                "text size_px must be finite and > 0",
            ));
        }
        let family = self
            .face(role)
            .map(|f| f.family.clone())
            .ok_or_else(|| StoryreelError::composition("no font registered for text role"))?;

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(family)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }

    /// Measure with `role` at `size_px`.
    pub fn measurer(&mut self, role: TextRole, size_px: f32) -> FontMeasure<'_> {
        FontMeasure {
            engine: self,
            role,
            size_px,
            warned: false,
        }
    }
}

fn register(
    font_ctx: &mut parley::FontContext,
    bytes: &Arc<Vec<u8>>,
) -> StoryreelResult<RegisteredFace> {
    let families = font_ctx
        .collection
        .register_fonts(parley::fontique::Blob::from(bytes.as_ref().clone()), None);
    let family_id = families
        .first()
        .map(|(id, _)| *id)
        .ok_or_else(|| StoryreelError::validation("no font families registered from font bytes"))?;
    let family = font_ctx
        .collection
        .family_name(family_id)
        .ok_or_else(|| StoryreelError::validation("registered font family has no name"))?
        .to_string();
    let font = vello_cpu::peniko::FontData::new(
        vello_cpu::peniko::Blob::from(bytes.as_ref().clone()),
        0,
    );
    Ok(RegisteredFace { family, font })
}

/// Average advance, relative to the font size, assumed when shaping fails.
const FALLBACK_ADVANCE_EM: f32 = 0.6;

/// [`TextMeasure`] backed by real shaping.
///
/// If shaping fails the width is estimated from the character count, so wrapping still breaks
/// long text into lines.
pub struct FontMeasure<'a> {
    engine: &'a mut FontTextEngine,
    role: TextRole,
    size_px: f32,
    warned: bool,
}

impl TextMeasure for FontMeasure<'_> {
    fn measure(&mut self, text: &str) -> f32 {
        match self
            .engine
            .layout_line(self.role, text, self.size_px, TextBrushRgba8::default())
        {
            Ok(layout) => layout.width(),
            Err(e) => {
                if !self.warned {
                    warn!(role = ?self.role, error = %e, "text shaping failed, estimating widths");
                    self.warned = true;
                }
                text.chars().count() as f32 * self.size_px * FALLBACK_ADVANCE_EM
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/text.rs"]
mod tests;
