use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::foundation::error::{StoryreelError, StoryreelResult};

/// Shared cancellation flag for background work.
///
/// Clones observe the same flag. Once cancelled it stays cancelled.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Create a fresh, non-cancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Return `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> StoryreelResult<()> {
        if self.is_cancelled() {
            Err(StoryreelError::Cancelled)
        } else {
            Ok(())
        }
    }
}
