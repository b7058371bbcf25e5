//! Blocked-request tally
//!
//! Every cancelled request bumps an in-memory counter. Persistence happens in
//! batches through a [`CountStore`]; the request path never touches storage.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, thiserror::Error)]
pub enum CountStoreError {
    #[error("count store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("count store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable home of the blocked-request total.
pub trait CountStore: Send + Sync {
    /// The persisted total (0 when nothing was stored yet).
    fn load(&self) -> Result<u64, CountStoreError>;

    /// Add `delta` to the persisted total and return the new total.
    fn add(&self, delta: u64) -> Result<u64, CountStoreError>;
}

#[derive(Debug, Default)]
pub struct BlockedRequestCounter {
    pending: AtomicU64,
    persisted: AtomicU64,
}

impl BlockedRequestCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a total that was persisted earlier.
    pub fn with_persisted(total: u64) -> Self {
        Self {
            pending: AtomicU64::new(0),
            persisted: AtomicU64::new(total),
        }
    }

    #[inline]
    pub fn record(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    /// Blocks recorded since the last successful flush.
    pub fn pending(&self) -> u64 {
        self.pending.load(Ordering::Relaxed)
    }

    /// Persisted total plus everything still pending.
    pub fn total(&self) -> u64 {
        self.persisted.load(Ordering::Acquire) + self.pending()
    }

    /// Move the pending tally into `store`.
    ///
    /// On failure the pending amount is put back, so nothing is lost and the
    /// next flush retries it.
    pub fn flush(&self, store: &dyn CountStore) -> Result<u64, CountStoreError> {
        let delta = self.pending.swap(0, Ordering::AcqRel);
        if delta == 0 {
            return Ok(self.persisted.load(Ordering::Acquire));
        }

        match store.add(delta) {
            Ok(total) => {
                self.persisted.store(total, Ordering::Release);
                log::debug!("flushed {delta} blocked requests (total {total})");
                Ok(total)
            }
            Err(err) => {
                self.pending.fetch_add(delta, Ordering::AcqRel);
                Err(err)
            }
        }
    }
}
