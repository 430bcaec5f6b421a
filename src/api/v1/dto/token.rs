use serde::{Deserialize, Serialize};

use crate::services::auth::token_service::IssuedTokenPair;

pub const REFRESH_TOKEN_GRANT: &str = "refresh_token";

/// Request body for `POST /token`.
///
/// - Issue: omit `grant_type` and provide `sub` (only when direct issuance is enabled).
/// - Refresh: `grant_type = "refresh_token"` and `refresh_token` (or the refresh cookie).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub sub: Option<String>,
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevokeRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Seconds until the access token expires.
    pub expires_in: u64,
    pub refresh_token: String,
}

impl From<IssuedTokenPair> for TokenResponse {
    fn from(pair: IssuedTokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            token_type: pair.token_type.to_string(),
            expires_in: pair.expires_in,
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RevokeResponse {
    pub revoked: bool,
}
