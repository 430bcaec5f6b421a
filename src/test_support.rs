//! Shared fixtures for unit and router tests. No external services: the cache is in-process
//! and the ownership oracle is a recording mock.
use std::future::pending;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::app::build_registry;
use crate::config::{AppEnv, Config};
use crate::services::auth::codec::{CodecSettings, CredentialCodec};
use crate::services::auth::refresh_store::{CacheRefreshStore, RefreshStore};
use crate::services::auth::refresh_token_service::RefreshTokenService;
use crate::services::auth::{Identity, ResourceIds, TokenService};
use crate::services::authz::AuthzEngine;
use crate::services::authz::oracle::{OracleError, OwnershipOracle};
use crate::services::cache::client::{CacheClient, CacheResult};
use crate::services::cache::CacheError;
use crate::state::{ApiSettings, AppState};

pub const TEST_SECRET: &[u8] = b"webskeleton-test-secret-0123456789abcdef";

pub fn test_codec_settings() -> CodecSettings {
    CodecSettings {
        issuer: "https://auth.test".to_string(),
        audience: "webskeleton-test".to_string(),
        ttl_seconds: 600,
        leeway_seconds: 0,
    }
}

pub fn test_codec() -> CredentialCodec {
    CredentialCodec::new(TEST_SECRET, test_codec_settings())
}

pub fn ids(items: &[&str]) -> ResourceIds {
    items.iter().map(|s| s.to_string()).collect()
}

pub fn memory_store() -> Arc<dyn RefreshStore> {
    Arc::new(CacheRefreshStore::in_memory("refresh", Duration::from_secs(1)))
}

pub fn failing_store() -> Arc<dyn RefreshStore> {
    Arc::new(CacheRefreshStore::new(
        Arc::new(FailingCache),
        "refresh",
        Duration::from_secs(1),
    ))
}

pub fn test_token_service_with(store: Arc<dyn RefreshStore>, rotate: bool) -> TokenService {
    let refresh = RefreshTokenService::new(store, 3600);
    TokenService::new(Arc::new(test_codec()), refresh, rotate)
}

pub fn test_token_service(rotate: bool) -> TokenService {
    test_token_service_with(memory_store(), rotate)
}

/// `AppState` with the production policy set, an in-memory refresh store and
/// direct issuance enabled.
pub fn test_state(oracle: CountingOracle) -> (AppState, Arc<CountingOracle>) {
    test_state_with(
        oracle,
        memory_store(),
        ApiSettings {
            allow_direct_issue: true,
            refresh_token_cookie: None,
        },
    )
}

pub fn test_state_with(
    oracle: CountingOracle,
    store: Arc<dyn RefreshStore>,
    api: ApiSettings,
) -> (AppState, Arc<CountingOracle>) {
    let oracle = Arc::new(oracle);
    let registry = build_registry(oracle.clone()).unwrap();
    let tokens = Arc::new(test_token_service_with(store, true));

    let state = AppState::new(tokens, Arc::new(AuthzEngine::new(registry)), api);
    (state, oracle)
}

/// Access token for `sub`, signed by the state's codec.
pub fn bearer(state: &AppState, sub: &str) -> String {
    state
        .tokens
        .codec()
        .issue_access_token(&Identity::from(sub))
        .unwrap()
}

pub fn test_config() -> Config {
    Config {
        addr: "127.0.0.1:0".parse().unwrap(),
        app_env: AppEnv::Development,
        cors_allowed_origins: Vec::new(),
        request_timeout: Duration::from_secs(5),
        max_body_bytes: 1024,
        database_url: "postgres://localhost/unused".to_string(),
        ownership_function: "user_owns_all".to_string(),
        cache_url: "memory://".to_string(),
        cache_timeout: Duration::from_secs(1),
        refresh_token_prefix: "refresh".to_string(),
        access_jwt_secret: TEST_SECRET.to_vec(),
        auth_issuer: "https://auth.test".to_string(),
        auth_audience: "webskeleton-test".to_string(),
        access_token_ttl_seconds: 600,
        access_token_leeway_seconds: 0,
        refresh_token_ttl_seconds: 3600,
        refresh_token_rotation: true,
        refresh_token_cookie: None,
        allow_direct_issue: true,
    }
}

/// Ownership oracle that records every call and answers a fixed verdict.
#[derive(Debug)]
pub struct CountingOracle {
    answer: Option<bool>,
    calls: Mutex<Vec<(Identity, ResourceIds)>>,
}

impl CountingOracle {
    pub fn allowing(answer: bool) -> Self {
        Self {
            answer: Some(answer),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails as if the database were down.
    pub fn failing() -> Self {
        Self {
            answer: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Identity, ResourceIds)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl OwnershipOracle for CountingOracle {
    async fn has_access_to_all(
        &self,
        identity: &Identity,
        resource_ids: &ResourceIds,
    ) -> Result<bool, OracleError> {
        self.calls
            .lock()
            .unwrap()
            .push((identity.clone(), resource_ids.clone()));

        self.answer
            .ok_or(OracleError::Query(sqlx::Error::PoolTimedOut))
    }
}

/// Cache whose every command fails.
#[derive(Debug, Clone)]
pub struct FailingCache;

fn down<T>() -> CacheResult<T> {
    Err(CacheError::BackendConnection("connection refused".to_string()))
}

#[async_trait]
impl CacheClient for FailingCache {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn ping(&self) -> CacheResult<()> {
        down()
    }

    async fn get_string(&self, _key: &str) -> CacheResult<Option<String>> {
        down()
    }

    async fn take_string(&self, _key: &str) -> CacheResult<Option<String>> {
        down()
    }

    async fn set_if_absent_with_ttl(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Duration,
    ) -> CacheResult<bool> {
        down()
    }

    async fn del(&self, _key: &str) -> CacheResult<u64> {
        down()
    }
}

/// Cache whose every command hangs forever.
#[derive(Debug, Clone)]
pub struct StalledCache;

#[async_trait]
impl CacheClient for StalledCache {
    fn backend_name(&self) -> &'static str {
        "stalled"
    }

    async fn ping(&self) -> CacheResult<()> {
        pending().await
    }

    async fn get_string(&self, _key: &str) -> CacheResult<Option<String>> {
        pending().await
    }

    async fn take_string(&self, _key: &str) -> CacheResult<Option<String>> {
        pending().await
    }

    async fn set_if_absent_with_ttl(
        &self,
        _key: &str,
        _value: &str,
        _ttl: Duration,
    ) -> CacheResult<bool> {
        pending().await
    }

    async fn del(&self, _key: &str) -> CacheResult<u64> {
        pending().await
    }
}
