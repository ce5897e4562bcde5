use super::*;

#[test]
fn keys_are_stable_and_namespaced() {
    let a = ContentKey::new("speech", "hello");
    assert_eq!(a, ContentKey::new("speech", "hello"));
    assert_ne!(a, ContentKey::new("image", "hello"));
    assert_ne!(a, ContentKey::new("speech", "hello "));
    // The separator keeps namespace/text boundaries distinct.
    assert_ne!(ContentKey::new("ab", "c"), ContentKey::new("a", "bc"));
    assert_eq!(a.to_hex().len(), 16);
}

#[test]
fn memory_cache_round_trip() {
    let cache = MemoryCache::new();
    let k = ContentKey::new("image", "forest");
    assert!(cache.get(k).is_none());
    cache.put(k, Arc::new(vec![1, 2, 3]));
    assert_eq!(cache.get(k).unwrap().as_slice(), &[1, 2, 3]);
    assert_eq!(cache.len(), 1);
}

#[test]
fn disk_cache_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let k = ContentKey::new("speech", "line one");
    {
        let cache = DiskCache::open(dir.path().join("c")).unwrap();
        cache.put(k, Arc::new(b"payload".to_vec()));
    }
    let cache = DiskCache::open(dir.path().join("c")).unwrap();
    assert_eq!(cache.get(k).unwrap().as_slice(), b"payload");
    assert!(cache.get(ContentKey::new("speech", "other")).is_none());
}

#[test]
fn no_cache_stores_nothing() {
    let k = ContentKey::new("x", "y");
    NoCache.put(k, Arc::new(vec![1]));
    assert!(NoCache.get(k).is_none());
}
