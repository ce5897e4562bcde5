use super::*;

#[test]
fn status_classification() {
    assert_eq!(
        FetchError::from_status(429, Some(Duration::from_secs(3)), ""),
        FetchError::RateLimited {
            retry_after: Some(Duration::from_secs(3))
        }
    );
    assert_eq!(
        FetchError::from_status(503, None, ""),
        FetchError::Unavailable { status: 503 }
    );
    assert_eq!(
        FetchError::from_status(408, None, ""),
        FetchError::Unavailable { status: 408 }
    );
    assert!(matches!(
        FetchError::from_status(401, None, " bad key "),
        FetchError::Rejected { status: 401, ref message } if message == "bad key"
    ));
}

#[test]
fn retryability() {
    assert!(FetchError::RateLimited { retry_after: None }.is_retryable());
    assert!(FetchError::Unavailable { status: 502 }.is_retryable());
    assert!(FetchError::Network("reset".into()).is_retryable());
    assert!(!FetchError::Offline.is_retryable());
    assert!(!FetchError::Undecodable("x".into()).is_retryable());
    assert!(
        !FetchError::Rejected {
            status: 400,
            message: String::new()
        }
        .is_retryable()
    );
}

#[test]
fn slugs() {
    assert_eq!(keyword_slug("Misty Forest"), "misty-forest");
    assert_eq!(keyword_slug("  city // night!! "), "city-night");
    assert_eq!(keyword_slug("Ünïcode ok"), "n-code-ok");
    assert_eq!(keyword_slug("---"), "");
}

#[tokio::test]
async fn directory_provider_finds_first_extension() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("misty-forest.jpg"), b"jpg bytes").unwrap();
    let p = DirectoryImageProvider::new(dir.path());
    assert_eq!(p.fetch_image("Misty Forest").await.unwrap(), b"jpg bytes");
    let err = p.fetch_image("desert").await.unwrap_err();
    assert!(matches!(err, FetchError::Rejected { status: 404, .. }));
}

#[tokio::test]
async fn offline_adapters() {
    assert_eq!(
        OfflineImageProvider.fetch_image("x").await,
        Err(FetchError::Offline)
    );
    assert_eq!(
        SilentSpeechProvider.synthesize("hello").await,
        Ok(SpeechPayload::Silence)
    );
}
