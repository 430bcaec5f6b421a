/*
 * Responsibility
 * - GET /me: who does the presented access token belong to
 */
use crate::api::v1::dto::resources::MeResponse;
use crate::pipeline::{BoxFuture, HandlerResult, RequestContext, reply};
use crate::state::AppState;

pub fn me<'a>(ctx: &'a mut RequestContext, _state: &'a AppState) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let sub = ctx.require_identity()?.clone();
        reply(&MeResponse { sub })
    })
}
