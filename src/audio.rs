/// Decoded PCM clips and the silence sentinel.
pub mod clip;
/// Master track stitching.
pub mod master;
/// Near-silent keep-alive tone for live capture.
pub mod tone;
/// RIFF/WAVE container reading and writing.
pub mod wav;
