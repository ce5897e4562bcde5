use super::*;

#[test]
fn canvas_rejects_odd_and_zero_dimensions() {
    assert!(Canvas::new(1080, 1920).is_ok());
    assert!(Canvas::new(0, 1920).is_err());
    assert!(Canvas::new(1081, 1920).is_err());
    assert!(Canvas::new(70_000, 2).is_err());
    Canvas::EXPORT.validate().unwrap();
    Canvas::PREVIEW.validate().unwrap();
}

#[test]
fn preview_and_export_share_aspect_ratio() {
    let e = Canvas::EXPORT.w() / Canvas::EXPORT.h();
    let p = Canvas::PREVIEW.w() / Canvas::PREVIEW.h();
    assert!((e - p).abs() < 1e-9);
}

#[test]
fn fps_frames_secs_roundtrip_floor() {
    let fps = Fps::new(30000, 1001).unwrap();
    let secs = fps.frames_to_secs(123);
    assert_eq!(fps.secs_to_frames_floor(secs), 123);
    assert_eq!(Fps::EXPORT.secs_to_frames_ceil(5.0), 150);
    assert_eq!(Fps::EXPORT.secs_to_frames_ceil(5.01), 151);
    assert_eq!(Fps::EXPORT.to_ffmpeg_rate(), "30/1");
}

#[test]
fn fps_rejects_zero() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(30, 0).is_err());
}

#[test]
fn hex_colors_parse_and_premultiply() {
    assert_eq!(
        Rgba8Premul::from_hex("#ffbf00").unwrap(),
        Rgba8Premul {
            r: 255,
            g: 191,
            b: 0,
            a: 255
        }
    );
    let half = Rgba8Premul::from_hex("ffffff80").unwrap();
    assert_eq!(half.a, 128);
    assert_eq!(half.r, 128);
    assert!(Rgba8Premul::from_hex("#abc").is_err());
    assert!(Rgba8Premul::from_hex("#zzzzzz").is_err());
}
