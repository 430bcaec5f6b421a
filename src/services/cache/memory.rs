//! In-process cache for single-node deployments, local development and tests.
//!
//! Not shared between processes: tokens issued by one node are unknown to another.
use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use std::time::{Duration, Instant};

use crate::services::cache::client::{CacheClient, CacheResult};

const DEFAULT_MAX_CAPACITY: u64 = 100_000;

#[derive(Clone, Debug)]
struct Slot {
    value: String,
    ttl: Duration,
}

/// Each entry expires after the TTL it was stored with.
struct PerEntryTtl;

impl Expiry<String, Slot> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, slot: &Slot, _created_at: Instant) -> Option<Duration> {
        Some(slot.ttl)
    }
}

#[derive(Clone)]
pub struct MemoryCache {
    inner: Cache<String, Slot>,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY)
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .build();

        Self { inner }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheClient for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.inner.get(key).await.map(|slot| slot.value))
    }

    async fn take_string(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.inner.remove(key).await.map(|slot| slot.value))
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> CacheResult<bool> {
        let entry = self
            .inner
            .entry(key.to_string())
            .or_insert(Slot {
                value: value.to_string(),
                ttl,
            })
            .await;

        Ok(entry.is_fresh())
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        Ok(self.inner.remove(key).await.map_or(0, |_| 1))
    }
}
