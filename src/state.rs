/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 * - Clone-cheap: everything heavy sits behind Arc
 */
use std::sync::Arc;

use crate::services::auth::TokenService;
use crate::services::authz::AuthzEngine;

/// Endpoint-level switches taken from `Config`.
#[derive(Clone, Debug, Default)]
pub struct ApiSettings {
    // `POST /token` with a bare `sub` (no upstream login); off in production by default
    pub allow_direct_issue: bool,
    // Also hand the refresh token out as an HttpOnly cookie with this name
    pub refresh_token_cookie: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AppState {
    pub tokens: Arc<TokenService>,
    pub authz: Arc<AuthzEngine>,
    pub api: ApiSettings,
}

impl AppState {
    pub fn new(tokens: Arc<TokenService>, authz: Arc<AuthzEngine>, api: ApiSettings) -> Self {
        Self { tokens, authz, api }
    }
}
