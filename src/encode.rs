//! Encoding: the shared filter graph, still materialization and the three interchangeable backends.
//!
//! All backends consume the same inputs (script, resolved assets, master audio) through
//! [`backend::EncodeJob`] and produce an [`backend::EncodeArtifact`] that has already been checked
//! for a minimum size.

/// Backend trait, job description and backend selection.
pub mod backend;
/// Real-time capture backend driven by the playback scheduler.
pub mod capture;
/// `ffmpeg` process helpers and the streaming frame sink.
pub mod ffmpeg;
/// Typed filter/concatenation graph and its `ffmpeg` lowering.
pub mod graph;
/// Local batch transcode through the system `ffmpeg`.
pub mod local;
/// Remote batch transcode over HTTP.
pub mod remote;
/// Frame sink trait and the in-memory sink.
pub mod sink;
/// Parallel HD still materialization.
pub mod stills;
/// Artifact checks and duration probing.
pub mod validate;
