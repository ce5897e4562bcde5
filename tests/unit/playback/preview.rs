use std::collections::HashMap;
use std::sync::Arc;

use super::*;
use crate::assets::resolver::ResolvedAssets;
use crate::audio::master::{MasterAudioOpts, synthesize_master};
use crate::foundation::core::{Canvas, Fps};
use crate::playback::clock::ManualClock;
use crate::playback::output::NullAudioOutput;
use crate::playback::scheduler::PlaybackScheduler;
use crate::render::compositor::{Compositor, CompositorOpts};
use crate::render::text::FontSet;
use crate::timeline::model::{Scene, SceneId, Script};

fn at(index: usize) -> ScenePosition {
    ScenePosition {
        index,
        local_elapsed: 0.0,
        progress: 0.0,
    }
}

#[test]
fn counts_frames_without_a_directory() {
    let mut t = PreviewTarget::new();
    let f = FrameRGBA::solid(2, 2, [0, 0, 0, 255]);
    t.present(&f, at(0), 0.0).unwrap();
    t.present(&f, at(0), 0.1).unwrap();
    t.present(&f, at(1), 0.2).unwrap();
    assert_eq!(t.presented(), 3);
    assert!(t.frames_dir().is_none());
}

#[test]
fn saves_numbered_pngs() {
    let dir = tempfile::tempdir().unwrap();
    let frames = dir.path().join("preview");
    let mut t = PreviewTarget::with_frames_dir(&frames).unwrap();
    t.present(&FrameRGBA::solid(4, 2, [255, 0, 0, 255]), at(0), 0.0)
        .unwrap();
    t.present(&FrameRGBA::solid(4, 2, [0, 0, 255, 255]), at(1), 0.5)
        .unwrap();

    let second = image::open(frames.join("frame-00001.png")).unwrap().to_rgba8();
    assert_eq!(second.dimensions(), (4, 2));
    assert_eq!(second.get_pixel(0, 0).0, [0, 0, 255, 255]);
    assert!(frames.join("frame-00000.png").is_file());
}

#[test]
fn scheduler_run_fills_the_preview() {
    let scene = |id: &str, duration: f64| Scene {
        id: SceneId::from(id),
        duration,
        narration_text: String::new(),
        overlay_text: String::new(),
        image_keyword: String::new(),
    };
    let script = Arc::new(Script::new("t", vec![scene("a", 1.0), scene("b", 0.5)]).unwrap());
    let master = synthesize_master(
        &script,
        &HashMap::new(),
        MasterAudioOpts {
            sample_rate: 8_000,
            ..MasterAudioOpts::default()
        },
    )
    .unwrap();
    let compositor =
        Compositor::with_fonts(CompositorOpts::default(), &FontSet::empty()).unwrap();
    let mut s = PlaybackScheduler::new(
        script,
        Arc::new(ResolvedAssets::default()),
        compositor,
        Canvas::new(18, 32).unwrap(),
        Fps::new(10, 1).unwrap(),
        ManualClock::new(),
        NullAudioOutput::default(),
    );
    s.begin_loading().unwrap();
    s.finish_loading(Arc::new(master)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut t = PreviewTarget::with_frames_dir(dir.path()).unwrap();
    assert_eq!(s.run(&mut t).unwrap(), 15);
    assert_eq!(t.presented(), 15);
    assert!(dir.path().join("frame-00014.png").is_file());
}
