use super::*;
use crate::audio::clip::NarrationClip;
use crate::audio::master::{MasterAudioOpts, synthesize_master};
use crate::timeline::model::{Scene, SceneId, Script};
use std::collections::HashMap;

fn silent_master(rate: u32, channels: u16) -> MasterAudioBuffer {
    let script = Script::new(
        "t",
        vec![Scene {
            id: SceneId::from("a"),
            duration: 1.0,
            narration_text: String::new(),
            overlay_text: String::new(),
            image_keyword: String::new(),
        }],
    )
    .unwrap();
    synthesize_master(
        &script,
        &HashMap::<SceneId, NarrationClip>::new(),
        MasterAudioOpts {
            sample_rate: rate,
            channels,
            tail_pad_secs: 0.0,
        },
    )
    .unwrap()
}

#[test]
fn default_tone_is_quiet_but_present() {
    let master = silent_master(8_000, 1);
    let mixed = KeepAliveTone::default().mix_into_copy(&master);
    assert_eq!(mixed.len(), master.samples().len());
    let peak = mixed.iter().fold(0.0f32, |m, v| m.max(v.abs()));
    assert!(peak > 0.001 && peak <= 0.0015 + 1e-6, "peak {peak}");
    // The master is not modified.
    assert!(!master.has_signal(0, master.frames()));
}

#[test]
fn stereo_channels_get_the_same_tone() {
    let master = silent_master(1_000, 2);
    let mixed = KeepAliveTone::default().mix_into_copy(&master);
    for pair in mixed.chunks_exact(2) {
        assert_eq!(pair[0], pair[1]);
    }
}

#[test]
fn off_tone_returns_exact_copy() {
    let master = silent_master(1_000, 1);
    let mixed = KeepAliveTone::OFF.mix_into_copy(&master);
    assert_eq!(mixed.as_slice(), master.samples());
}
