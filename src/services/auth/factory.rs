/// Factory: build the credential services from application `Config`.
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::services::auth::codec::{CodecSettings, CredentialCodec};
use crate::services::auth::refresh_store::{CacheRefreshStore, RefreshStore, RefreshStoreError};
use crate::services::auth::refresh_token_service::RefreshTokenService;
use crate::services::auth::token_service::TokenService;

pub fn build_codec(config: &Config) -> Arc<CredentialCodec> {
    let settings = CodecSettings {
        issuer: config.auth_issuer.clone(),
        audience: config.auth_audience.clone(),
        ttl_seconds: config.access_token_ttl_seconds,
        leeway_seconds: config.access_token_leeway_seconds,
    };

    Arc::new(CredentialCodec::new(&config.access_jwt_secret, settings))
}

/// Connect the refresh store selected by `CACHE_URL`.
pub async fn build_refresh_store(config: &Config) -> Result<Arc<dyn RefreshStore>, RefreshStoreError> {
    if config.uses_memory_cache() {
        info!("refresh store: in-memory (single node only)");
        return Ok(Arc::new(CacheRefreshStore::in_memory(
            config.refresh_token_prefix.clone(),
            config.cache_timeout,
        )));
    }

    let store = CacheRefreshStore::connect(
        &config.cache_url,
        config.refresh_token_prefix.clone(),
        config.cache_timeout,
    )
    .await?;
    info!("refresh store: valkey");

    Ok(Arc::new(store))
}

pub fn build_token_service(
    config: &Config,
    codec: Arc<CredentialCodec>,
    store: Arc<dyn RefreshStore>,
) -> Arc<TokenService> {
    let refresh = RefreshTokenService::new(store, config.refresh_token_ttl_seconds);
    Arc::new(TokenService::new(codec, refresh, config.refresh_token_rotation))
}
