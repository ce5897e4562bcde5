use super::*;

#[test]
fn flatten_premul_alpha_0_returns_bg() {
    let src = vec![0u8, 0, 0, 0];
    let mut dst = vec![0u8; 4];
    flatten_premul_over_bg_to_opaque_rgba8(&mut dst, &src, [10, 20, 30, 255]).unwrap();
    assert_eq!(dst, vec![10, 20, 30, 255]);
}

#[test]
fn flatten_premul_opaque_is_identity() {
    let src = vec![1u8, 2, 3, 255];
    let mut dst = vec![0u8; 4];
    flatten_premul_over_bg_to_opaque_rgba8(&mut dst, &src, [10, 20, 30, 255]).unwrap();
    assert_eq!(dst, src);
}

#[test]
fn flatten_rejects_mismatched_buffers() {
    let mut dst = vec![0u8; 8];
    assert!(flatten_premul_over_bg_to_opaque_rgba8(&mut dst, &[0u8; 4], [0, 0, 0, 255]).is_err());
}

#[test]
fn sink_rejects_odd_dimensions_before_spawning() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(dir.path().join("out.mp4")));
    let err = sink
        .begin(SinkConfig {
            width: 35,
            height: 64,
            fps: Fps::EXPORT,
            audio: None,
        })
        .unwrap_err();
    assert!(matches!(err, StoryreelError::Validation(_)));
}

#[test]
fn push_before_begin_is_an_error() {
    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new("unused.mp4"));
    let frame = FrameRGBA::solid(2, 2, [0, 0, 0, 255]);
    assert!(sink.push_frame(0, &frame).is_err());
}

#[test]
fn remove_partial_ignores_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("missing.mp4");
    remove_partial(&p);
    std::fs::write(&p, b"x").unwrap();
    remove_partial(&p);
    assert!(!p.exists());
}
