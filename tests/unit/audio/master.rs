use super::*;
use crate::audio::clip::PcmClip;
use crate::timeline::model::Scene;

fn script(durations: &[f64]) -> Script {
    let scenes = durations
        .iter()
        .enumerate()
        .map(|(i, &d)| Scene {
            id: SceneId(format!("s{i}")),
            duration: d,
            narration_text: String::new(),
            overlay_text: String::new(),
            image_keyword: String::new(),
        })
        .collect();
    Script::new("t", scenes).unwrap()
}

fn tone(rate: u32, secs: f64, value: f32) -> NarrationClip {
    let n = (secs * f64::from(rate)) as usize;
    NarrationClip::Pcm(PcmClip::new(rate, 1, vec![value; n]).unwrap())
}

fn opts(rate: u32, pad: f64) -> MasterAudioOpts {
    MasterAudioOpts {
        sample_rate: rate,
        channels: 1,
        tail_pad_secs: pad,
    }
}

#[test]
fn length_is_ceil_total_plus_pad() {
    let s = script(&[1.0 / 3.0, 0.5]);
    let buf = synthesize_master(&s, &HashMap::new(), opts(1000, 0.0)).unwrap();
    assert_eq!(buf.frames(), s.total_samples(1000));
    assert_eq!(buf.timeline_frames(), 834);

    let padded = synthesize_master(&s, &HashMap::new(), opts(1000, 0.5)).unwrap();
    assert_eq!(padded.frames(), 834 + 500);
    assert!(padded.samples().iter().all(|&v| v == 0.0));
}

#[test]
fn clips_land_at_scene_offsets_and_nothing_else_is_touched() {
    let s = script(&[2.0, 3.0, 1.0]);
    let mut clips = HashMap::new();
    clips.insert(SceneId::from("s0"), tone(100, 1.5, 0.5));
    clips.insert(SceneId::from("s1"), tone(100, 2.0, -0.25));
    clips.insert(SceneId::from("s2"), tone(100, 0.5, 0.75));
    let buf = synthesize_master(&s, &clips, opts(100, 0.5)).unwrap();

    assert_eq!(buf.frames(), 650);
    assert!(buf.frame_range(0, 150).iter().all(|&v| v == 0.5));
    assert!(!buf.has_signal(150, 200));
    assert!(buf.frame_range(200, 400).iter().all(|&v| v == -0.25));
    assert!(!buf.has_signal(400, 500));
    assert!(buf.frame_range(500, 550).iter().all(|&v| v == 0.75));
    assert!(!buf.has_signal(550, 650));
}

#[test]
fn silence_scene_stays_zero() {
    // [ {2s, "Hello"}, {3s, silent} ]
    let s = script(&[2.0, 3.0]);
    let mut clips = HashMap::new();
    clips.insert(SceneId::from("s0"), tone(8_000, 1.2, 0.3));
    clips.insert(SceneId::from("s1"), NarrationClip::Silence);
    let buf = synthesize_master(&s, &clips, opts(8_000, 0.5)).unwrap();

    assert!(buf.has_signal(0, 16_000));
    assert!(!buf.has_signal(16_000, buf.frames()));
}

#[test]
fn long_clip_runs_into_next_scene_and_is_truncated_at_buffer_end() {
    let s = script(&[1.0, 1.0]);
    let mut clips = HashMap::new();
    clips.insert(SceneId::from("s1"), tone(10, 5.0, 1.0));
    let buf = synthesize_master(&s, &clips, opts(10, 0.0)).unwrap();
    assert_eq!(buf.frames(), 20);
    assert!(!buf.has_signal(0, 10));
    assert!(buf.frame_range(10, 20).iter().all(|&v| v == 1.0));

    let mut clips = HashMap::new();
    clips.insert(SceneId::from("s0"), tone(10, 1.5, 1.0));
    let buf = synthesize_master(&s, &clips, opts(10, 0.0)).unwrap();
    assert!(buf.frame_range(10, 15).iter().all(|&v| v == 1.0));
    assert!(!buf.has_signal(15, 20));
}

#[test]
fn clips_are_conformed_to_master_layout() {
    let s = script(&[1.0]);
    let mut clips = HashMap::new();
    clips.insert(
        SceneId::from("s0"),
        NarrationClip::Pcm(PcmClip::new(20, 2, vec![0.5; 20]).unwrap()),
    );
    let buf = synthesize_master(
        &s,
        &clips,
        MasterAudioOpts {
            sample_rate: 10,
            channels: 2,
            tail_pad_secs: 0.0,
        },
    )
    .unwrap();
    assert_eq!(buf.channels(), 2);
    assert_eq!(buf.frames(), 10);
    assert!(buf.frame_range(0, 5).iter().all(|&v| (v - 0.5).abs() < 1e-6));
    assert!(!buf.has_signal(5, 10));
}

#[test]
fn rejects_bad_layout() {
    let s = script(&[1.0]);
    assert!(synthesize_master(&s, &HashMap::new(), opts(0, 0.0)).is_err());
    assert!(
        synthesize_master(
            &s,
            &HashMap::new(),
            MasterAudioOpts {
                channels: 6,
                ..MasterAudioOpts::default()
            }
        )
        .is_err()
    );
    assert!(synthesize_master(&s, &HashMap::new(), opts(100, -1.0)).is_err());
}

#[test]
fn f32le_file_has_four_bytes_per_sample() {
    let s = script(&[0.5]);
    let buf = synthesize_master(&s, &HashMap::new(), opts(100, 0.0)).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("mix.f32le");
    buf.write_f32le_file(&path).unwrap();
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 50 * 4);
}

#[test]
fn playback_offsets_slice_from_the_floor_frame() {
    let s = script(&[2.0, 3.0]);
    let mut clips = HashMap::new();
    clips.insert(SceneId::from("s1"), tone(100, 1.0, 0.5));
    let buf = synthesize_master(&s, &clips, opts(100, 0.0)).unwrap();

    assert_eq!(buf.samples_from_secs(0.0).len(), 500);
    assert_eq!(buf.samples_from_secs(-1.0).len(), 500);
    assert_eq!(buf.samples_from_secs(f64::NAN).len(), 500);
    let tail = buf.samples_from_secs(2.009);
    assert_eq!(tail.len(), 300);
    assert_eq!(tail[0], 0.5);
    assert!(buf.samples_from_secs(9.0).is_empty());
}
