//! Bearer credential verification -> `Identity` in request extensions.
//!
//! - Valid `Authorization: Bearer <token>`: the token's `sub` becomes the request identity.
//! - Absent, malformed, invalid or expired: no identity. Endpoints that declare an `AuthConf`
//!   then fail with 401 in the pipeline; open endpoints (token exchange, health) run as usual,
//!   so a client still attaching its expired access token can refresh it.
//!
//! Verification is local (signature + claims); no store round-trip per request.

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
};

use crate::services::auth::Identity;
use crate::state::AppState;

pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, bearer_middleware))
}

async fn bearer_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Never trust an identity that did not come from this layer.
    req.extensions_mut().remove::<Identity>();

    if let Some(value) = req.headers().get(header::AUTHORIZATION) {
        match value.to_str() {
            Ok(value) => match state.tokens.codec().parse_bearer(value) {
                Ok(claims) => {
                    req.extensions_mut().insert(claims.sub);
                }
                Err(err) => {
                    tracing::debug!(error = %err, "access token verification failed");
                }
            },
            Err(_) => tracing::debug!("authorization header is not valid ascii"),
        }
    }

    next.run(req).await
}
