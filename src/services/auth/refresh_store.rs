//! Refresh store adapter: `key -> identity` with a store-enforced TTL.
use async_trait::async_trait;
use std::{future::Future, sync::Arc, time::Duration};
use thiserror::Error;
use tracing::warn;

use crate::services::auth::types::Identity;
use crate::services::cache::{CacheClient, CacheError, MemoryCache, ValkeyClient};

/// Store outcome.
///
/// `NotFound` ("no such refresh token") and `Unavailable` ("the store is down") must stay
/// distinguishable: the first is a client error, the second is retryable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshStoreError {
    #[error("refresh entry not found")]
    NotFound,
    #[error("refresh entry already exists")]
    Conflict,
    #[error("refresh store unavailable: {0}")]
    Unavailable(String),
}

impl From<CacheError> for RefreshStoreError {
    fn from(e: CacheError) -> Self {
        RefreshStoreError::Unavailable(e.to_string())
    }
}

#[async_trait]
pub trait RefreshStore: Send + Sync {
    /// Bind `key` to `identity` for `ttl`. Never overwrites: an existing key is `Conflict`.
    async fn set(&self, key: &str, identity: &Identity, ttl: Duration) -> Result<(), RefreshStoreError>;

    async fn get(&self, key: &str) -> Result<Identity, RefreshStoreError>;

    /// Read and remove in one step.
    async fn take(&self, key: &str) -> Result<Identity, RefreshStoreError>;

    /// Returns `true` when an entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, RefreshStoreError>;
}

/// `RefreshStore` over any [`CacheClient`].
///
/// Every call is bounded by `timeout`; an elapsed call is `Unavailable`, never a
/// silent miss.
#[derive(Clone)]
pub struct CacheRefreshStore<C: CacheClient> {
    cache: Arc<C>,
    // Key namespace, e.g. `refresh` -> `refresh:<hash>`
    prefix: String,
    timeout: Duration,
}

impl CacheRefreshStore<ValkeyClient> {
    pub async fn connect(
        redis_url: &str,
        prefix: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, RefreshStoreError> {
        let client = ValkeyClient::new(redis_url).await?;
        client.ping().await?;
        Ok(Self::new(Arc::new(client), prefix, timeout))
    }
}

impl CacheRefreshStore<MemoryCache> {
    pub fn in_memory(prefix: impl Into<String>, timeout: Duration) -> Self {
        Self::new(Arc::new(MemoryCache::new()), prefix, timeout)
    }
}

impl<C: CacheClient> CacheRefreshStore<C> {
    pub fn new(cache: Arc<C>, prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
            timeout,
        }
    }

    pub fn key(&self, raw: &str) -> String {
        format!("{}:{}", self.prefix, raw)
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, RefreshStoreError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(|e| {
                warn!(backend = self.cache.backend_name(), op, error = %e, "refresh store call failed");
                RefreshStoreError::from(e)
            }),
            Err(_) => {
                warn!(backend = self.cache.backend_name(), op, timeout = ?self.timeout, "refresh store call timed out");
                Err(RefreshStoreError::Unavailable(format!("{op} timed out")))
            }
        }
    }
}

#[async_trait]
impl<C: CacheClient> RefreshStore for CacheRefreshStore<C> {
    async fn set(&self, key: &str, identity: &Identity, ttl: Duration) -> Result<(), RefreshStoreError> {
        let full_key = self.key(key);
        let stored = self
            .bounded(
                "set",
                self.cache
                    .set_if_absent_with_ttl(&full_key, identity.as_str(), ttl),
            )
            .await?;

        if stored {
            Ok(())
        } else {
            Err(RefreshStoreError::Conflict)
        }
    }

    async fn get(&self, key: &str) -> Result<Identity, RefreshStoreError> {
        let full_key = self.key(key);
        self.bounded("get", self.cache.get_string(&full_key))
            .await?
            .map(Identity::new)
            .ok_or(RefreshStoreError::NotFound)
    }

    async fn take(&self, key: &str) -> Result<Identity, RefreshStoreError> {
        let full_key = self.key(key);
        self.bounded("take", self.cache.take_string(&full_key))
            .await?
            .map(Identity::new)
            .ok_or(RefreshStoreError::NotFound)
    }

    async fn delete(&self, key: &str) -> Result<bool, RefreshStoreError> {
        let full_key = self.key(key);
        let removed = self.bounded("delete", self.cache.del(&full_key)).await?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FailingCache, StalledCache};

    fn store() -> CacheRefreshStore<MemoryCache> {
        CacheRefreshStore::in_memory("refresh", Duration::from_secs(1))
    }

    #[tokio::test]
    async fn set_then_get_returns_identity() {
        let store = store();
        let identity = Identity::from("u1");

        store.set("abc", &identity, Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.get("abc").await.unwrap(), identity);
    }

    #[tokio::test]
    async fn existing_key_is_never_rebound() {
        let store = store();
        let ttl = Duration::from_secs(60);

        store.set("abc", &Identity::from("u1"), ttl).await.unwrap();
        let second = store.set("abc", &Identity::from("u2"), ttl).await;

        assert_eq!(second, Err(RefreshStoreError::Conflict));
        assert_eq!(store.get("abc").await.unwrap(), Identity::from("u1"));
    }

    #[tokio::test]
    async fn deleted_key_is_not_found() {
        let store = store();
        store
            .set("abc", &Identity::from("u1"), Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.delete("abc").await.unwrap());
        assert!(!store.delete("abc").await.unwrap());
        assert_eq!(store.get("abc").await, Err(RefreshStoreError::NotFound));
    }

    #[tokio::test]
    async fn take_consumes_entry() {
        let store = store();
        store
            .set("abc", &Identity::from("u1"), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.take("abc").await.unwrap(), Identity::from("u1"));
        assert_eq!(store.take("abc").await, Err(RefreshStoreError::NotFound));
    }

    #[tokio::test]
    async fn backend_failure_is_unavailable_not_missing() {
        let store = CacheRefreshStore::new(Arc::new(FailingCache), "refresh", Duration::from_secs(1));

        assert!(matches!(store.get("abc").await, Err(RefreshStoreError::Unavailable(_))));
        assert!(matches!(
            store.set("abc", &Identity::from("u1"), Duration::from_secs(60)).await,
            Err(RefreshStoreError::Unavailable(_))
        ));
        assert!(matches!(store.delete("abc").await, Err(RefreshStoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn timeout_is_unavailable() {
        let store = CacheRefreshStore::new(Arc::new(StalledCache), "refresh", Duration::from_millis(20));

        assert!(matches!(store.get("abc").await, Err(RefreshStoreError::Unavailable(_))));
    }
}
