use std::sync::Arc;
use tracing::{error, info};

use crate::services::auth::codec::CredentialCodec;
use crate::services::auth::error::AuthError;
use crate::services::auth::refresh_token_service::RefreshTokenService;
use crate::services::auth::types::Identity;

/// Service that orchestrates access-token issuance and refresh-token issuance/rotation.
///
/// - CredentialCodec is responsible for access tokens (stateless JWT).
/// - RefreshTokenService is responsible for opaque refresh tokens and their store entries.
#[derive(Clone, Debug)]
pub struct TokenService {
    codec: Arc<CredentialCodec>,
    refresh: RefreshTokenService,
    // Rotate the refresh token on every exchange (old one becomes Consumed).
    rotate_refresh_tokens: bool,
}

impl TokenService {
    pub fn new(
        codec: Arc<CredentialCodec>,
        refresh: RefreshTokenService,
        rotate_refresh_tokens: bool,
    ) -> Self {
        Self {
            codec,
            refresh,
            rotate_refresh_tokens,
        }
    }

    pub fn codec(&self) -> &CredentialCodec {
        &self.codec
    }

    pub fn refresh_token_ttl_seconds(&self) -> u64 {
        self.refresh.ttl_seconds()
    }

    /// Issue a new token pair for an already authenticated identity.
    pub async fn issue_token_pair(&self, identity: &Identity) -> Result<IssuedTokenPair, AuthError> {
        if identity.is_empty() {
            return Err(AuthError::Unauthenticated);
        }

        let access_token = self.codec.issue_access_token(identity)?;
        let refresh_token = self.refresh.issue_refresh_token(identity).await?;

        info!(identity = %identity, "issued token pair");

        Ok(IssuedTokenPair {
            identity: identity.clone(),
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.codec.ttl_seconds(),
        })
    }

    /// Exchange a refresh token for a fresh access token bound to the same identity.
    ///
    /// - rotation on: the presented token is consumed and a new one returned
    /// - rotation off: the presented token stays active and is returned as-is
    pub async fn refresh(&self, refresh_token: &str) -> Result<IssuedTokenPair, AuthError> {
        let resolved = if self.rotate_refresh_tokens {
            self.refresh.consume(refresh_token).await?
        } else {
            self.refresh.lookup(refresh_token).await?
        };
        let identity = resolved.ok_or(AuthError::InvalidRefreshCredential)?;

        let access_token = self.codec.issue_access_token(&identity)?;

        let refresh_token = if self.rotate_refresh_tokens {
            self.refresh
                .issue_refresh_token(&identity)
                .await
                .inspect_err(|e| {
                    // The old token is already consumed; the client has to log in again.
                    error!(identity = %identity, error = %e, "refresh rotation failed after consume");
                })?
        } else {
            refresh_token.to_string()
        };

        Ok(IssuedTokenPair {
            identity,
            access_token,
            refresh_token,
            token_type: "Bearer",
            expires_in: self.codec.ttl_seconds(),
        })
    }

    /// Invalidate a refresh token. Returns `false` if it was not active.
    pub async fn revoke(&self, refresh_token: &str) -> Result<bool, AuthError> {
        self.refresh.revoke(refresh_token).await
    }
}

/// Service-level return type to keep handlers thin.
///
/// Handlers map this into the HTTP DTO (TokenResponse).
#[derive(Clone, Debug)]
pub struct IssuedTokenPair {
    pub identity: Identity,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_token_service;

    #[tokio::test]
    async fn token_pair_access_token_verifies() {
        let tokens = test_token_service(true);
        let identity = Identity::from("u1");

        let pair = tokens.issue_token_pair(&identity).await.unwrap();
        let claims = tokens.codec().verify(&pair.access_token).unwrap();

        assert_eq!(claims.sub, identity);
        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, tokens.codec().ttl_seconds());
    }

    #[tokio::test]
    async fn refresh_with_rotation_consumes_old_token() {
        let tokens = test_token_service(true);
        let identity = Identity::from("u1");
        let pair = tokens.issue_token_pair(&identity).await.unwrap();

        let refreshed = tokens.refresh(&pair.refresh_token).await.unwrap();
        assert_eq!(refreshed.identity, identity);
        assert_ne!(refreshed.refresh_token, pair.refresh_token);
        assert_eq!(tokens.codec().verify(&refreshed.access_token).unwrap().sub, identity);

        // Consumed is terminal.
        let replay = tokens.refresh(&pair.refresh_token).await;
        assert_eq!(replay.unwrap_err(), AuthError::InvalidRefreshCredential);

        // The rotated token works.
        assert!(tokens.refresh(&refreshed.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_without_rotation_keeps_token() {
        let tokens = test_token_service(false);
        let pair = tokens.issue_token_pair(&Identity::from("u1")).await.unwrap();

        let first = tokens.refresh(&pair.refresh_token).await.unwrap();
        let second = tokens.refresh(&pair.refresh_token).await.unwrap();

        assert_eq!(first.refresh_token, pair.refresh_token);
        assert_eq!(second.refresh_token, pair.refresh_token);
    }

    #[tokio::test]
    async fn revoked_token_cannot_refresh() {
        let tokens = test_token_service(false);
        let pair = tokens.issue_token_pair(&Identity::from("u1")).await.unwrap();

        assert!(tokens.revoke(&pair.refresh_token).await.unwrap());
        assert_eq!(
            tokens.refresh(&pair.refresh_token).await.unwrap_err(),
            AuthError::InvalidRefreshCredential
        );
    }

    #[tokio::test]
    async fn empty_identity_gets_no_tokens() {
        let tokens = test_token_service(true);

        assert_eq!(
            tokens.issue_token_pair(&Identity::from("  ")).await.unwrap_err(),
            AuthError::Unauthenticated
        );
    }

    #[tokio::test]
    async fn unknown_token_is_invalid_refresh_credential() {
        let tokens = test_token_service(true);

        assert_eq!(
            tokens.refresh("nope").await.unwrap_err(),
            AuthError::InvalidRefreshCredential
        );
    }
}
