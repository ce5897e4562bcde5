use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::warn;
use xxhash_rust::xxh3::Xxh3;

use crate::foundation::error::{StoryreelError, StoryreelResult};

/// Stable content key: xxh3-64 over a namespace tag and the input text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentKey(pub u64);

impl ContentKey {
    /// Key for `text` within `namespace` (for example `"speech"` or `"image"`).
    pub fn new(namespace: &str, text: &str) -> Self {
        let mut h = Xxh3::new();
        h.update(namespace.as_bytes());
        h.update(&[0]);
        h.update(text.as_bytes());
        Self(h.digest())
    }

    /// Fixed-width lowercase hex form, used as a file name.
    pub fn to_hex(self) -> String {
        format!("{:016x}", self.0)
    }
}

/// Byte cache keyed by [`ContentKey`].
///
/// Implementations must be safe to share between concurrent resolutions. A failed write is not an
/// error for the caller; it only costs a later refetch.
pub trait ContentCache: Send + Sync {
    /// Cached bytes for `key`, if present.
    fn get(&self, key: ContentKey) -> Option<Arc<Vec<u8>>>;
    /// Store `bytes` under `key`.
    fn put(&self, key: ContentKey, bytes: Arc<Vec<u8>>);
}

/// Cache that never stores anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCache;

impl ContentCache for NoCache {
    fn get(&self, _key: ContentKey) -> Option<Arc<Vec<u8>>> {
        None
    }

    fn put(&self, _key: ContentKey, _bytes: Arc<Vec<u8>>) {}
}

/// In-process cache for one session (and tests).
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<ContentKey, Arc<Vec<u8>>>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Return `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContentCache for MemoryCache {
    fn get(&self, key: ContentKey) -> Option<Arc<Vec<u8>>> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
            .cloned()
    }

    fn put(&self, key: ContentKey, bytes: Arc<Vec<u8>>) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, bytes);
    }
}

/// One file per key under a directory, shared across runs.
#[derive(Clone, Debug)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Open (creating if needed) a cache rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> StoryreelResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            StoryreelError::validation(format!(
                "failed to create cache directory '{}': {e}",
                dir.display()
            ))
        })?;
        Ok(Self { dir })
    }

    /// Cache root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: ContentKey) -> PathBuf {
        self.dir.join(format!("{}.bin", key.to_hex()))
    }

    fn write_atomic(&self, key: ContentKey, bytes: &[u8]) -> std::io::Result<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.persist(self.path_for(key)).map_err(|e| e.error)?;
        Ok(())
    }
}

impl ContentCache for DiskCache {
    fn get(&self, key: ContentKey) -> Option<Arc<Vec<u8>>> {
        std::fs::read(self.path_for(key)).ok().map(Arc::new)
    }

    fn put(&self, key: ContentKey, bytes: Arc<Vec<u8>>) {
        if let Err(e) = self.write_atomic(key, &bytes) {
            warn!(key = %key.to_hex(), error = %e, "cache write failed");
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
