use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error};

use crate::services::auth::error::AuthError;
use crate::services::auth::refresh_store::{RefreshStore, RefreshStoreError};
use crate::services::auth::types::Identity;

// 32 bytes of entropy per refresh token.
const REFRESH_TOKEN_BYTES: usize = 32;

/// Issues, resolves and invalidates opaque refresh tokens.
///
/// Lifecycle: `Issued -> Active -> {Consumed | Expired | Invalidated}`.
/// - Issued/Active: entry written to the store (the write completes before the token is returned)
/// - Consumed: entry taken during rotation
/// - Expired: store TTL elapsed
/// - Invalidated: entry deleted by revoke
///
/// Only `sha256(token)` is used as the store key; the raw token never leaves this service
/// except to the caller.
#[derive(Clone)]
pub struct RefreshTokenService {
    store: Arc<dyn RefreshStore>,
    ttl_seconds: u64,
}

impl std::fmt::Debug for RefreshTokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenService")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl RefreshTokenService {
    pub fn new(store: Arc<dyn RefreshStore>, ttl_seconds: u64) -> Self {
        Self { store, ttl_seconds }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Issue a new refresh token bound to `identity` and persist it.
    ///
    /// Returns the opaque token only after the store acknowledged the write.
    pub async fn issue_refresh_token(&self, identity: &Identity) -> Result<String, AuthError> {
        let refresh_token = generate_refresh_token()?;
        let key = hash_refresh_token(&refresh_token);

        debug!(
            identity = %identity,
            ttl_seconds = self.ttl_seconds,
            "Issuing refresh token"
        );

        self.store
            .set(&key, identity, Duration::from_secs(self.ttl_seconds))
            .await
            .map_err(|e| {
                error!(identity = %identity, error = %e, "Failed to store refresh token");
                match e {
                    // 256-bit collision: not a store outage, but the token must not be handed out.
                    RefreshStoreError::Conflict => AuthError::Internal("refresh token collision".to_string()),
                    other => store_unavailable(other),
                }
            })?;

        Ok(refresh_token)
    }

    /// Resolve an active refresh token to its identity without consuming it.
    pub async fn lookup(&self, refresh_token: &str) -> Result<Option<Identity>, AuthError> {
        let key = hash_refresh_token(refresh_token);

        match self.store.get(&key).await {
            Ok(identity) => Ok(Some(identity)),
            Err(RefreshStoreError::NotFound) => {
                debug!("Refresh token not found or expired");
                Ok(None)
            }
            Err(e) => Err(store_unavailable(e)),
        }
    }

    /// Resolve and consume a refresh token (single use).
    ///
    /// Of several concurrent callers presenting the same token, at most one gets `Some`.
    pub async fn consume(&self, refresh_token: &str) -> Result<Option<Identity>, AuthError> {
        let key = hash_refresh_token(refresh_token);

        match self.store.take(&key).await {
            Ok(identity) => Ok(Some(identity)),
            Err(RefreshStoreError::NotFound) => {
                debug!("Refresh token not found, expired or already consumed");
                Ok(None)
            }
            Err(e) => Err(store_unavailable(e)),
        }
    }

    /// Invalidate a refresh token. Returns `false` if it was not active.
    pub async fn revoke(&self, refresh_token: &str) -> Result<bool, AuthError> {
        let key = hash_refresh_token(refresh_token);

        let removed = self.store.delete(&key).await.map_err(store_unavailable)?;
        debug!(removed, "Revoking refresh token");

        Ok(removed)
    }
}

fn store_unavailable(e: RefreshStoreError) -> AuthError {
    AuthError::StoreUnavailable(e.to_string())
}

fn generate_refresh_token() -> Result<String, AuthError> {
    // 32 bytes of entropy -> URL-safe base64 without padding.
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    getrandom::fill(&mut bytes).map_err(|e| {
        error!(error = %e, "OS random source failed");
        AuthError::Internal("random source unavailable".to_string())
    })?;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
