use std::fmt::Write;

use anyhow::Context;

use crate::assets::decode::PreparedImage;
use crate::foundation::error::{StoryreelError, StoryreelResult};
use crate::timeline::model::SceneId;

/// Default placeholder raster size; the compositor cover-scales it to any canvas.
pub const PLACEHOLDER_SIZE: (u32, u32) = (540, 960);

/// Gradient endpoint colors derived from the scene id.
///
/// Stable across runs and platforms: the hue comes from an xxh3 hash of the id.
pub fn placeholder_colors(scene_id: &SceneId) -> ([u8; 3], [u8; 3]) {
    let h = xxhash_rust::xxh3::xxh3_64(scene_id.as_str().as_bytes());
    let hue = (h % 360) as f32;
    let shift = 30.0 + ((h >> 16) % 60) as f32;
    (
        hsl_to_rgb(hue, 0.55, 0.45),
        hsl_to_rgb((hue + shift) % 360.0, 0.60, 0.22),
    )
}

/// SVG document for the placeholder of `scene_id`.
pub fn placeholder_svg(scene_id: &SceneId, width: u32, height: u32) -> String {
    let (top, bottom) = placeholder_colors(scene_id);
    let mut svg = String::new();
    let _ = write!(
        svg,
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            r#"<defs><linearGradient id="g" x1="0" y1="0" x2="0.35" y2="1">"#,
            r##"<stop offset="0" stop-color="#{t}"/><stop offset="1" stop-color="#{b}"/>"##,
            r#"</linearGradient></defs>"#,
            r#"<rect width="{w}" height="{h}" fill="url(#g)"/>"#,
            r#"</svg>"#
        ),
        w = width,
        h = height,
        t = hex(top),
        b = hex(bottom),
    );
    svg
}

/// Rasterize the placeholder for `scene_id`.
pub fn render_placeholder(
    scene_id: &SceneId,
    width: u32,
    height: u32,
) -> StoryreelResult<PreparedImage> {
    let svg = placeholder_svg(scene_id, width, height);
    let tree = usvg::Tree::from_data(svg.as_bytes(), &usvg::Options::default())
        .context("parse placeholder svg")?;
    let data = rasterize_svg_to_premul_rgba8(&tree, width, height)?;
    PreparedImage::from_premul(width, height, data)
}

/// Render a parsed SVG into premultiplied RGBA8 at `width` x `height`.
pub(crate) fn rasterize_svg_to_premul_rgba8(
    tree: &usvg::Tree,
    width: u32,
    height: u32,
) -> StoryreelResult<Vec<u8>> {
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| StoryreelError::asset("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / tree.size().width();
    let sy = (height as f32) / tree.size().height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    Ok(pixmap.data().to_vec())
}

fn hex(c: [u8; 3]) -> String {
    format!("{:02x}{:02x}{:02x}", c[0], c[1], c[2])
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [u8; 3] {
    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = l - c / 2.0;
    let to_u8 = |v: f32| ((v + m).clamp(0.0, 1.0) * 255.0).round() as u8;
    [to_u8(r), to_u8(g), to_u8(b)]
}

#[cfg(test)]
#[path = "../../tests/unit/assets/placeholder.rs"]
mod tests;
