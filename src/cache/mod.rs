//! Short-lived cache for report listings.
//!
//! Entries are keyed by the caller's role and author filter and expire after a
//! fixed TTL. Writes do not evict anything, so a listing may lag behind an
//! edit until its entry expires.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::models::{RepairReport, Role};

const MAX_CAPACITY: u64 = 256;

/// Cache key: who is asking and which author they asked for (`None` = everyone).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReportCacheKey {
    pub role: Role,
    pub author: Option<String>,
}

/// Report listing cache; disabled when built without a TTL.
#[derive(Clone)]
pub struct ReportCache {
    inner: Option<Cache<ReportCacheKey, Arc<Vec<RepairReport>>>>,
}

impl ReportCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        let Some(ttl) = ttl else {
            return Self::disabled();
        };

        tracing::info!(ttl_seconds = ttl.as_secs(), "Report cache enabled");
        let cache = Cache::builder()
            .max_capacity(MAX_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { inner: Some(cache) }
    }

    pub fn disabled() -> Self {
        Self { inner: None }
    }

    pub async fn get(&self, key: &ReportCacheKey) -> Option<Arc<Vec<RepairReport>>> {
        let cache = self.inner.as_ref()?;
        let hit = cache.get(key).await;
        if hit.is_some() {
            tracing::debug!(?key, "Report cache hit");
        }
        hit
    }

    pub async fn insert(&self, key: ReportCacheKey, reports: Arc<Vec<RepairReport>>) {
        if let Some(cache) = &self.inner {
            cache.insert(key, reports).await;
        }
    }
}
