use super::*;

#[test]
fn new_validates_layout() {
    assert!(PcmClip::new(0, 1, vec![]).is_err());
    assert!(PcmClip::new(8_000, 3, vec![]).is_err());
    assert!(PcmClip::new(8_000, 2, vec![0.0; 3]).is_err());
    let c = PcmClip::new(8_000, 2, vec![0.0; 8]).unwrap();
    assert_eq!(c.frames(), 4);
    assert!((c.duration_secs() - 0.0005).abs() < 1e-12);
}

#[test]
fn conform_same_layout_is_identity() {
    let c = PcmClip::new(4, 1, vec![0.1, 0.2, 0.3, 0.4]).unwrap();
    let out = c.conform(4, 1).unwrap();
    assert_eq!(out, c);
}

#[test]
fn conform_downmixes_and_upmixes() {
    let stereo = PcmClip::new(4, 2, vec![1.0, 0.0, 0.5, 0.5]).unwrap();
    let mono = stereo.conform(4, 1).unwrap();
    assert_eq!(mono.samples.as_slice(), &[0.5, 0.5]);

    let mono = PcmClip::new(4, 1, vec![0.25, -0.25]).unwrap();
    let stereo = mono.conform(4, 2).unwrap();
    assert_eq!(stereo.samples.as_slice(), &[0.25, 0.25, -0.25, -0.25]);
}

#[test]
fn conform_resamples_linearly_and_preserves_duration() {
    let c = PcmClip::new(4, 1, vec![0.0, 1.0, 0.0, 1.0]).unwrap();
    let up = c.conform(8, 1).unwrap();
    assert_eq!(up.frames(), 8);
    assert!((up.samples[1] - 0.5).abs() < 1e-6);
    assert!((up.duration_secs() - c.duration_secs()).abs() < 1e-9);

    let down = c.conform(2, 1).unwrap();
    assert_eq!(down.frames(), 2);
}

#[test]
fn silence_sentinel_is_distinct_from_empty_clip() {
    let empty = NarrationClip::Pcm(PcmClip::new(8_000, 1, vec![]).unwrap());
    assert!(!empty.is_silence());
    assert!(NarrationClip::Silence.is_silence());
    assert!(NarrationClip::Silence.as_pcm().is_none());
}
