/// Content-addressed byte caches shared by the resolver.
pub mod cache;
/// Image and audio decoding into export-safe in-memory forms.
pub mod decode;
/// HTTP adapters for image search and speech synthesis.
pub mod http;
/// Deterministic placeholder rasters for scenes without an image.
pub mod placeholder;
/// Upstream provider traits, fetch errors and offline adapters.
pub mod providers;
/// Per-scene image and narration resolution with fallbacks.
pub mod resolver;
/// Shared retry policy with exponential backoff.
pub mod retry;
