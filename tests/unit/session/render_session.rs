use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use super::*;
use crate::assets::cache::MemoryCache;
use crate::assets::decode::WavAudioDecoder;
use crate::assets::providers::{FetchError, ImageProvider, SpeechPayload, SpeechProvider};
use crate::assets::resolver::ResolverOpts;
use crate::assets::retry::RetryPolicy;
use crate::audio::master::MasterAudioOpts;
use crate::audio::wav::write_wav_pcm16;
use crate::playback::clock::ManualClock;
use crate::playback::output::NullAudioOutput;
use crate::playback::state::PlaybackState;
use crate::timeline::model::{Scene, SceneId};

const RATE: u32 = 8_000;

#[derive(Default)]
struct Images {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl ImageProvider for Images {
    async fn fetch_image(&self, _keyword: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([0, 0, 255, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        Ok(buf)
    }
}

struct Speech;

#[async_trait]
impl SpeechProvider for Speech {
    async fn synthesize(&self, text: &str) -> Result<SpeechPayload, FetchError> {
        if text == "Hello" {
            let mut out = Vec::new();
            write_wav_pcm16(&mut out, &vec![0.5f32; RATE as usize], RATE, 1).unwrap();
            Ok(SpeechPayload::Encoded(out))
        } else {
            Ok(SpeechPayload::Silence)
        }
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        canvas: Canvas::new(36, 64).unwrap(),
        preview_canvas: Canvas::new(18, 32).unwrap(),
        audio: MasterAudioOpts {
            sample_rate: RATE,
            ..MasterAudioOpts::default()
        },
        ..EngineConfig::default()
    }
}

fn session(calls: Arc<AtomicU32>) -> RenderSession {
    let scene = |id: &str, duration: f64, narration: &str| Scene {
        id: SceneId::from(id),
        duration,
        narration_text: narration.to_string(),
        overlay_text: id.to_string(),
        image_keyword: "sky".to_string(),
    };
    let script = Script::new(
        "demo",
        vec![scene("hello", 2.0, "Hello"), scene("quiet", 3.0, "")],
    )
    .unwrap();
    let resolver = AssetResolver::new(Arc::new(Images { calls }), Arc::new(Speech))
        .with_cache(Arc::new(MemoryCache::new()))
        .with_decoder(Arc::new(WavAudioDecoder))
        .with_retry(RetryPolicy::no_retry())
        .with_opts(ResolverOpts {
            sample_rate: RATE,
            image_concurrency: 1,
            ..ResolverOpts::default()
        });
    RenderSession::new(config(), script)
        .unwrap()
        .with_fonts(FontSet::empty())
        .with_resolver(resolver)
}

#[tokio::test]
async fn narration_lands_only_inside_its_scene() {
    let mut s = session(Arc::default());
    let master = s.master().await.unwrap();

    let two_secs = 2 * u64::from(RATE);
    assert_eq!(master.timeline_frames(), 5 * u64::from(RATE));
    assert!(master.has_signal(0, two_secs));
    assert!(!master.has_signal(two_secs, master.frames()));
}

#[tokio::test]
async fn assets_are_resolved_once_per_session() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut s = session(calls.clone());
    let a = s.resolve().await.unwrap();
    let b = s.resolve().await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    let m1 = s.master().await.unwrap();
    let m2 = s.master().await.unwrap();
    assert!(Arc::ptr_eq(&m1, &m2));
    // Both scenes share a keyword; the cache absorbs the second lookup.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.images.len(), 2);
}

#[tokio::test]
async fn render_frame_checks_the_time_range() {
    let mut s = session(Arc::default());
    let f = s.render_frame(2.5, Canvas::new(18, 32).unwrap()).await.unwrap();
    assert_eq!((f.width, f.height), (18, 32));

    for t in [-0.1, 5.0, f64::NAN] {
        assert!(matches!(
            s.render_frame(t, Canvas::PREVIEW).await,
            Err(StoryreelError::Validation(_))
        ));
    }
}

#[tokio::test]
async fn stills_and_wav_are_written() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = session(Arc::default());

    let stills = s.stills(&dir.path().join("stills")).await.unwrap();
    assert_eq!(stills.len(), 2);
    assert!(stills.iter().all(|st| st.path.is_file()));

    let wav = dir.path().join("master.wav");
    let master = s.write_master_wav(&wav).await.unwrap();
    let bytes = std::fs::read(&wav).unwrap();
    assert_eq!(bytes.len() as u64, 44 + master.frames() * 2);
}

#[tokio::test]
async fn playback_starts_ready_with_resolved_assets() {
    let mut s = session(Arc::default());
    let mut scheduler = s
        .playback(ManualClock::new(), NullAudioOutput::default())
        .await
        .unwrap();
    assert_eq!(scheduler.state(), PlaybackState::Ready);
    scheduler.play().unwrap();
    assert!(scheduler.audio().is_active());
}

#[tokio::test]
async fn cancelled_session_stops_at_resolution() {
    let mut s = session(Arc::default());
    s.cancel_flag().cancel();
    assert!(matches!(s.resolve().await, Err(StoryreelError::Cancelled)));
}
