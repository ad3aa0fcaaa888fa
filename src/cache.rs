//! Time-boxed memoization of the aggregated devbox status.

use crate::types::StatusSnapshot;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub const DEFAULT_TTL: Duration = Duration::from_secs(10);

/// Produces a fresh status view. Implementations degrade instead of failing.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn collect(&self) -> StatusSnapshot;
}

struct Cached {
    snapshot: Arc<StatusSnapshot>,
    captured: Instant,
}

/// Serves one memoized [`StatusSnapshot`] while it is younger than the TTL.
///
/// The lock is held across recomputation: concurrent misses collect once,
/// and an `invalidate` issued mid-collection lands after it.
pub struct StatusCache {
    source: Arc<dyn StatusSource>,
    ttl: Duration,
    slot: Mutex<Option<Cached>>,
}

impl StatusCache {
    pub fn new(source: Arc<dyn StatusSource>) -> Self {
        Self::with_ttl(source, DEFAULT_TTL)
    }

    pub fn with_ttl(source: Arc<dyn StatusSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            slot: Mutex::new(None),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn get(&self) -> Arc<StatusSnapshot> {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.captured.elapsed() < self.ttl {
                return Arc::clone(&cached.snapshot);
            }
        }

        let snapshot = Arc::new(self.source.collect().await);
        *slot = Some(Cached {
            snapshot: Arc::clone(&snapshot),
            captured: Instant::now(),
        });
        snapshot
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }
}
