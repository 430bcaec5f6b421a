/*
 * Responsibility
 * - One inbound request, start to finish:
 *   build context -> authorize -> handler -> serialize (200) -> effects -> headers
 * - Any error short-circuits: queued effects are dropped with the context and only the
 *   mapped error response is sent
 */
use std::collections::HashMap;
use std::error::Error as StdError;

use axum::{
    body::to_bytes,
    extract::Request,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use tracing::debug;

use crate::error::AppError;
use crate::pipeline::context::RequestContext;
use crate::pipeline::endpoint::Endpoint;
use crate::services::auth::Identity;
use crate::state::AppState;

pub async fn dispatch(
    endpoint: &Endpoint,
    state: &AppState,
    path_params: HashMap<String, String>,
    req: Request,
) -> Response {
    match run(endpoint, state, path_params, req).await {
        Ok(res) => res,
        Err(err) => {
            debug!(
                method = %endpoint.method(),
                path = endpoint.path(),
                error = %err,
                "request failed"
            );
            err.into_response()
        }
    }
}

async fn run(
    endpoint: &Endpoint,
    state: &AppState,
    path_params: HashMap<String, String>,
    req: Request,
) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();

    // The body limit layer bounds this read.
    let body = to_bytes(body, usize::MAX).await.map_err(body_error)?;

    let mut ctx = RequestContext::new(parts.method, parts.uri, parts.headers, path_params, body);
    if let Some(identity) = parts.extensions.get::<Identity>() {
        ctx.set_identity(identity.clone());
    }

    if let Some(conf) = endpoint.auth() {
        state.authz.check_authorized(&ctx, conf).await?;
    }

    let value = endpoint.handler().call(&mut ctx, state).await?;

    Ok(ctx.into_response(value))
}

/// 413 when the body limit tripped mid-stream (no `Content-Length`), 400 otherwise.
fn body_error(err: axum::Error) -> AppError {
    let inner = err.into_inner();

    let mut source: Option<&(dyn StdError + 'static)> = Some(&*inner);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return AppError::PayloadTooLarge;
        }
        source = e.source();
    }

    AppError::InvalidRequest(format!("unreadable request body: {inner}"))
}
