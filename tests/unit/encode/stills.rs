use super::*;
use crate::timeline::model::Scene;

fn script() -> Script {
    let scene = |id: &str, duration: f64| Scene {
        id: SceneId::from(id),
        duration,
        narration_text: "spoken words".to_string(),
        overlay_text: "Title".to_string(),
        image_keyword: String::new(),
    };
    Script::new("t", vec![scene("a", 2.0), scene("b", 3.0), scene("c", 1.0)]).unwrap()
}

fn request<'a>(
    script: &'a Script,
    assets: &'a ResolvedAssets,
    opts: &'a CompositorOpts,
    fonts: &'a FontSet,
    dir: &'a Path,
) -> StillsRequest<'a> {
    StillsRequest {
        script,
        assets,
        compositor: opts,
        fonts,
        canvas: Canvas::new(36, 64).unwrap(),
        out_dir: dir,
        threads: Some(2),
    }
}

#[test]
fn one_still_per_scene_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let (script, assets, opts, fonts) = (
        script(),
        ResolvedAssets::default(),
        CompositorOpts::default(),
        FontSet::empty(),
    );
    let req = request(&script, &assets, &opts, &fonts, dir.path());
    let stills = materialize_stills(&req, &CancelFlag::new()).unwrap();

    let ids: Vec<_> = stills.iter().map(|s| s.scene_id.as_str()).collect();
    assert_eq!(ids, ["a", "b", "c"]);
    assert_eq!(stills[1].duration_secs, 3.0);
    assert_eq!(stills[2].path, dir.path().join("scene-002.png"));
    for s in &stills {
        let img = image::open(&s.path).unwrap();
        assert_eq!((img.width(), img.height()), (36, 64));
    }
    check_preconditions(&script, &stills, &stills[0].path).unwrap();
}

#[test]
fn cancelled_before_start_renders_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (script, assets, opts, fonts) = (
        script(),
        ResolvedAssets::default(),
        CompositorOpts::default(),
        FontSet::empty(),
    );
    let cancel = CancelFlag::new();
    cancel.cancel();
    let err = materialize_stills(&request(&script, &assets, &opts, &fonts, dir.path()), &cancel)
        .unwrap_err();
    assert!(matches!(err, StoryreelError::Cancelled));
}

#[test]
fn zero_threads_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (script, assets, opts, fonts) = (
        script(),
        ResolvedAssets::default(),
        CompositorOpts::default(),
        FontSet::empty(),
    );
    let mut req = request(&script, &assets, &opts, &fonts, dir.path());
    req.threads = Some(0);
    assert!(materialize_stills(&req, &CancelFlag::new()).is_err());
}

#[test]
fn preconditions_name_the_missing_piece() {
    let dir = tempfile::tempdir().unwrap();
    let script = script();
    let audio = dir.path().join("master.wav");
    std::fs::write(&audio, b"RIFF").unwrap();

    let mut stills: Vec<StillFrame> = script
        .scenes()
        .iter()
        .enumerate()
        .map(|(i, s)| {
            let path = dir.path().join(still_file_name(i));
            std::fs::write(&path, b"png").unwrap();
            StillFrame {
                scene_id: s.id.clone(),
                path,
                duration_secs: s.duration,
            }
        })
        .collect();
    check_preconditions(&script, &stills, &audio).unwrap();

    std::fs::remove_file(&stills[1].path).unwrap();
    match check_preconditions(&script, &stills, &audio).unwrap_err() {
        StoryreelError::MissingStill { scene } => assert_eq!(scene, "b"),
        other => panic!("unexpected {other}"),
    }

    stills.truncate(1);
    assert!(matches!(
        check_preconditions(&script, &stills, &audio),
        Err(StoryreelError::MissingStill { .. })
    ));

    let full: Vec<_> = (0..3)
        .map(|i| {
            let path = dir.path().join(format!("ok-{i}.png"));
            std::fs::write(&path, b"png").unwrap();
            StillFrame {
                scene_id: script.scenes()[i].id.clone(),
                path,
                duration_secs: 1.0,
            }
        })
        .collect();
    std::fs::write(&audio, b"").unwrap();
    assert!(matches!(
        check_preconditions(&script, &full, &audio),
        Err(StoryreelError::MissingAudio(_))
    ));
    assert!(matches!(
        check_preconditions(&script, &full, &dir.path().join("nope.wav")),
        Err(StoryreelError::MissingAudio(_))
    ));
}
