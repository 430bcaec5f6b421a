/*
 * Responsibility
 * - POST /token: direct issue (dev / trusted upstream) or refresh exchange
 * - POST /token/revoke: invalidate a refresh token
 * - Token responses are never cacheable; the refresh token optionally rides in an
 *   HttpOnly cookie as well
 */
use axum::http::{HeaderMap, HeaderValue, header};

use crate::api::v1::dto::token::{
    REFRESH_TOKEN_GRANT, RevokeRequest, RevokeResponse, TokenRequest, TokenResponse,
};
use crate::error::AppError;
use crate::pipeline::{BoxFuture, HandlerResult, ReplyCookie, RequestContext, reply};
use crate::services::auth::Identity;
use crate::state::AppState;

pub fn token<'a>(ctx: &'a mut RequestContext, state: &'a AppState) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let req: TokenRequest = ctx.json()?;

        let pair = match req.grant_type.as_deref() {
            Some(REFRESH_TOKEN_GRANT) => {
                let refresh_token = req
                    .refresh_token
                    .or_else(|| refresh_cookie(ctx.headers(), state))
                    .ok_or_else(|| AppError::InvalidRequest("refresh_token is required".into()))?;

                state.tokens.refresh(&refresh_token).await?
            }
            Some(other) => {
                return Err(AppError::InvalidRequest(format!(
                    "unsupported grant_type: {other}"
                )));
            }
            None => {
                if !state.api.allow_direct_issue {
                    tracing::warn!("direct token issuance is disabled");
                    return Err(AppError::Forbidden);
                }

                let sub = req
                    .sub
                    .map(Identity::new)
                    .filter(|sub| !sub.is_empty())
                    .ok_or_else(|| AppError::InvalidRequest("sub is required".into()))?;

                state.tokens.issue_token_pair(&sub).await?
            }
        };

        no_store(ctx);
        if let Some(name) = &state.api.refresh_token_cookie {
            ctx.set_cookie(
                ReplyCookie::new(name.as_str(), pair.refresh_token.as_str())
                    .max_age(state.tokens.refresh_token_ttl_seconds()),
            )?;
        }

        reply(&TokenResponse::from(pair))
    })
}

pub fn revoke<'a>(ctx: &'a mut RequestContext, state: &'a AppState) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let req: RevokeRequest = ctx.json()?;
        let refresh_token = req
            .refresh_token
            .or_else(|| refresh_cookie(ctx.headers(), state))
            .ok_or_else(|| AppError::InvalidRequest("refresh_token is required".into()))?;

        let revoked = state.tokens.revoke(&refresh_token).await?;

        no_store(ctx);
        if let Some(name) = &state.api.refresh_token_cookie {
            ctx.remove_cookie(name)?;
        }

        reply(&RevokeResponse { revoked })
    })
}

fn no_store(ctx: &mut RequestContext) {
    ctx.reply_header(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    ctx.reply_header(header::PRAGMA, HeaderValue::from_static("no-cache"));
}

fn refresh_cookie(headers: &HeaderMap, state: &AppState) -> Option<String> {
    let name = state.api.refresh_token_cookie.as_deref()?;

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}
