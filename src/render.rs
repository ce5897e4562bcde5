/// Frame compositor: background, Ken Burns image, dim, title, caption, recording dot.
pub mod compositor;
/// Raster frame container.
pub mod frame;
/// Canvas-relative layout metrics.
pub mod layout;
/// Text normalization, wrapping and font-backed shaping.
pub mod text;
