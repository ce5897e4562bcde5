//! storyreel turns a scene-based script into a synchronized vertical video.
//!
//! The crate is organised around one time axis:
//!
//! - A [`Script`] is validated once and answers "which scene is on screen at `t`".
//! - The [`AssetResolver`] fetches one image and one narration clip per scene, degrading to
//!   placeholders and silence instead of failing.
//! - [`synthesize_master`] stitches narration clips into one sample-accurate [`MasterAudioBuffer`].
//! - The [`Compositor`] renders the screen for any `(scene, progress)` at any resolution.
//! - The [`PlaybackScheduler`] maps a clock onto the timeline for preview and live capture.
//! - An [`EncodeBackend`] turns the timeline plus master audio into a video file.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Asset resolution: providers, retry policy, caching and decoding.
pub mod assets;
/// Master audio synthesis and PCM containers.
pub mod audio;
/// Engine configuration.
pub mod config;
/// Encode pipeline: filter graph, stills and backends.
pub mod encode;
/// Real-time playback scheduling.
pub mod playback;
/// Frame compositing.
pub mod render;
/// Session orchestration across all stages.
pub mod session;
/// Script and scene timing model.
pub mod timeline;

pub use crate::foundation::cancel::CancelFlag;
pub use crate::foundation::core::{Affine, Canvas, Fps, Rect, Rgba8Premul, Vec2};
pub use crate::foundation::error::{Stage, StoryreelError, StoryreelResult};

pub use crate::assets::resolver::{AssetResolver, ResolvedAssets, ResolverOpts};
pub use crate::assets::retry::RetryPolicy;
pub use crate::audio::clip::{NarrationClip, PcmClip};
pub use crate::audio::master::{MasterAudioBuffer, MasterAudioOpts, synthesize_master};
pub use crate::config::EngineConfig;
pub use crate::encode::backend::{
    BackendKind, EncodeArtifact, EncodeBackend, EncodeJob, EncodeSettings, create_backend,
};
pub use crate::playback::scheduler::{PlaybackScheduler, PlaybackState, TickOutcome};
pub use crate::render::compositor::{Compositor, CompositorOpts, FrameInput};
pub use crate::render::frame::FrameRGBA;
pub use crate::session::render_session::RenderSession;
pub use crate::timeline::model::{Scene, SceneId, Script};
pub use crate::timeline::position::ScenePosition;
