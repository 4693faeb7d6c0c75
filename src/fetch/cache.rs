// src/fetch/cache.rs
use std::{
    collections::HashMap,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::LoadResult;

#[derive(Debug)]
struct Entry {
    fetched_at: Instant,
    body: Arc<String>,
}

type Slot = Arc<Mutex<Option<Entry>>>;

/// Process-wide, time-boxed cache of raw CSV bodies keyed by export URL.
///
/// Each key has its own lock, so concurrent callers for the same URL wait for a
/// single population and then share its result. Failed fetches leave the slot
/// empty.
#[derive(Debug)]
pub struct SheetCache {
    ttl: Duration,
    /// Map: export URL → slot guarding the last good body
    slots: RwLock<HashMap<String, Slot>>,
}

impl SheetCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached body for `key` if it is younger than the TTL,
    /// otherwise run `fetch` and store its result.
    pub async fn get_or_fetch<F, Fut>(&self, key: &str, fetch: F) -> LoadResult<Arc<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = LoadResult<String>>,
    {
        // 1) Acquire or insert the per-key slot
        let slot = {
            let map_r = self.slots.read().await;
            match map_r.get(key) {
                Some(slot) => Arc::clone(slot),
                None => {
                    drop(map_r);
                    let mut map_w = self.slots.write().await;
                    Arc::clone(map_w.entry(key.to_string()).or_default())
                }
            }
        };

        // 2) Hold the slot while checking and, if needed, populating it
        let mut guard = slot.lock().await;
        if let Some(entry) = guard.as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                debug!(key, "cache hit");
                return Ok(Arc::clone(&entry.body));
            }
        }

        debug!(key, "cache miss");
        let body = Arc::new(fetch().await?);
        *guard = Some(Entry {
            fetched_at: Instant::now(),
            body: Arc::clone(&body),
        });
        Ok(body)
    }

    /// Drop every cached body.
    pub async fn clear(&self) {
        self.slots.write().await.clear();
    }
}
