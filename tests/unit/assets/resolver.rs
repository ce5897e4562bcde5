use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use super::*;
use crate::assets::cache::MemoryCache;
use crate::assets::decode::WavAudioDecoder;
use crate::audio::wav::write_wav_pcm16;
use crate::foundation::error::StoryreelError;

#[derive(Default)]
struct FakeImages {
    calls: AtomicU32,
}

#[async_trait]
impl ImageProvider for FakeImages {
    async fn fetch_image(&self, keyword: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match keyword {
            "red" => {
                let img = image::RgbaImage::from_pixel(4, 2, image::Rgba([255, 0, 0, 255]));
                let mut buf = Vec::new();
                image::DynamicImage::ImageRgba8(img)
                    .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
                    .unwrap();
                Ok(buf)
            }
            "garbage" => Ok(b"not an image".to_vec()),
            _ => Err(FetchError::Unavailable { status: 503 }),
        }
    }
}

#[derive(Default)]
struct FakeSpeech {
    calls: AtomicU32,
}

fn wav_tone(rate: u32, secs: f64) -> Vec<u8> {
    let n = (secs * f64::from(rate)) as usize;
    let samples = vec![0.25f32; n];
    let mut out = Vec::new();
    write_wav_pcm16(&mut out, &samples, rate, 1).unwrap();
    out
}

#[async_trait]
impl SpeechProvider for FakeSpeech {
    async fn synthesize(&self, text: &str) -> Result<SpeechPayload, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.contains("fail") {
            Err(FetchError::Unavailable { status: 502 })
        } else if text.contains("mute") {
            Ok(SpeechPayload::Silence)
        } else {
            Ok(SpeechPayload::Encoded(wav_tone(8_000, 0.5)))
        }
    }
}

fn scene(id: &str, narration: &str, keyword: &str) -> Scene {
    Scene {
        id: SceneId::from(id),
        duration: 2.0,
        narration_text: narration.to_string(),
        overlay_text: String::new(),
        image_keyword: keyword.to_string(),
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff_ms: 10,
        multiplier: 2.0,
        max_backoff_ms: 40,
    }
}

fn opts(fallback: ImageFallback) -> ResolverOpts {
    ResolverOpts {
        image_fallback: fallback,
        sample_rate: 8_000,
        channels: 1,
        ..ResolverOpts::default()
    }
}

fn resolver(
    images: Arc<FakeImages>,
    speech: Arc<FakeSpeech>,
    fallback: ImageFallback,
) -> AssetResolver {
    AssetResolver::new(images, speech)
        .with_decoder(Arc::new(WavAudioDecoder))
        .with_retry(fast_retry())
        .with_opts(opts(fallback))
}

#[tokio::test(start_paused = true)]
async fn blank_narration_is_silence_without_upstream_call() {
    let speech = Arc::new(FakeSpeech::default());
    let r = resolver(Arc::default(), speech.clone(), ImageFallback::None);
    assert_eq!(r.resolve_narration("   \n").await, NarrationClip::Silence);
    assert_eq!(speech.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn narration_is_decoded_and_conformed() {
    let speech = Arc::new(FakeSpeech::default());
    let r = resolver(Arc::default(), speech, ImageFallback::None).with_opts(ResolverOpts {
        sample_rate: 4_000,
        ..opts(ImageFallback::None)
    });
    let clip = r.resolve_narration("Hello").await;
    let pcm = clip.as_pcm().expect("pcm");
    assert_eq!(pcm.sample_rate, 4_000);
    assert_eq!(pcm.frames(), 2_000);
}

#[tokio::test(start_paused = true)]
async fn repeated_narration_hits_cache() {
    let speech = Arc::new(FakeSpeech::default());
    let cache = Arc::new(MemoryCache::new());
    let r = resolver(Arc::default(), speech.clone(), ImageFallback::None).with_cache(cache.clone());

    let a = r.resolve_narration("Hello there").await;
    let b = r.resolve_narration("Hello there").await;
    assert_eq!(a, b);
    assert!(!a.is_silence());
    assert_eq!(speech.calls.load(Ordering::SeqCst), 1);

    // Upstream silence is cached too.
    assert!(r.resolve_narration("mute me").await.is_silence());
    assert!(r.resolve_narration("mute me").await.is_silence());
    assert_eq!(speech.calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn exhausted_narration_falls_back_to_silence_for_that_scene_only() {
    let speech = Arc::new(FakeSpeech::default());
    let r = resolver(Arc::default(), speech.clone(), ImageFallback::None);
    let script = Script::new(
        "t",
        vec![
            scene("a", "Hello", ""),
            scene("b", "this will fail", ""),
            scene("c", "Goodbye", ""),
        ],
    )
    .unwrap();

    let assets = r.resolve_script(&script).await.unwrap();
    assert!(!assets.narration(&SceneId::from("a")).is_silence());
    assert!(assets.narration(&SceneId::from("b")).is_silence());
    assert!(!assets.narration(&SceneId::from("c")).is_silence());
    assert_eq!(assets.voiced_scenes(), 2);
    // 1 + 3 attempts + 1
    assert_eq!(speech.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn failed_images_follow_fallback_policy() {
    let images = Arc::new(FakeImages::default());
    let s = scene("x", "", "missing");

    let none = resolver(images.clone(), Arc::default(), ImageFallback::None);
    assert!(none.resolve_image(&s).await.is_none());
    assert_eq!(images.calls.load(Ordering::SeqCst), 3);

    let placeholder = resolver(images.clone(), Arc::default(), ImageFallback::Placeholder);
    let img = placeholder.resolve_image(&s).await.unwrap();
    assert_eq!((img.width, img.height), PLACEHOLDER_SIZE);

    // Undecodable bytes are permanent: one call, then fallback.
    let before = images.calls.load(Ordering::SeqCst);
    assert!(none.resolve_image(&scene("y", "", "garbage")).await.is_none());
    assert_eq!(images.calls.load(Ordering::SeqCst), before + 1);
}

#[tokio::test(start_paused = true)]
async fn decoded_image_is_returned_and_cached() {
    let images = Arc::new(FakeImages::default());
    let cache = Arc::new(MemoryCache::new());
    let r = resolver(images.clone(), Arc::default(), ImageFallback::None).with_cache(cache);
    let s = scene("x", "", "red");
    let a = r.resolve_image(&s).await.unwrap();
    let b = r.resolve_image(&s).await.unwrap();
    assert_eq!((a.width, a.height), (4, 2));
    assert_eq!(a.pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(a, b);
    assert_eq!(images.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn all_images_failing_with_no_fallback_leaves_map_empty() {
    let r = resolver(Arc::default(), Arc::default(), ImageFallback::None);
    let script = Script::new(
        "t",
        vec![scene("a", "", "one"), scene("b", "", "two"), scene("c", "", "")],
    )
    .unwrap();
    let assets = r.resolve_script(&script).await.unwrap();
    assert!(assets.images.is_empty());
    assert_eq!(assets.narration.len(), 3);
}

#[tokio::test]
async fn cancelled_resolution_returns_cancelled() {
    let cancel = CancelFlag::new();
    cancel.cancel();
    let r = resolver(Arc::default(), Arc::default(), ImageFallback::None).with_cancel(cancel);
    let script = Script::new("t", vec![scene("a", "hi", "red")]).unwrap();
    assert!(matches!(
        r.resolve_script(&script).await,
        Err(StoryreelError::Cancelled)
    ));
}
