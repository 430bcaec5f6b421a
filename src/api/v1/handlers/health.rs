/*
 * Responsibility
 * - GET /health (liveness; no auth, no store round-trip)
 */
use serde_json::json;

use crate::pipeline::{BoxFuture, HandlerResult, RequestContext};
use crate::state::AppState;

pub fn health<'a>(_ctx: &'a mut RequestContext, _state: &'a AppState) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async { Ok(json!({"status": "ok"})) })
}
