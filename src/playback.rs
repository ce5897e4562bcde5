/// Time sources for the scheduler.
pub mod clock;
/// Audio output and frame presentation seams.
pub mod output;
/// Headless preview frame target.
pub mod preview;
/// The tick-driven playback scheduler.
pub mod scheduler;
/// Default-device narration output.
#[cfg(feature = "speaker")]
pub mod speaker;
/// Playback states and legal transitions.
pub mod state;
