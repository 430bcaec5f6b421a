/*
 * Responsibility
 * - Resource endpoints guarded by `owns-all`
 * - The handlers only run after the policy allowed every targeted id
 */
use crate::api::v1::dto::resources::{ResourceAccessRequest, ResourceAccessResponse};
use crate::error::AppError;
use crate::pipeline::{BoxFuture, HandlerResult, RequestContext, reply};
use crate::services::auth::ResourceIds;
use crate::state::AppState;

/// `AuthConf` extractor for `POST /resources/access`.
///
/// An unreadable body yields no ids, which `owns-all` denies.
pub fn body_resource_ids(ctx: &RequestContext) -> ResourceIds {
    ctx.json::<ResourceAccessRequest>()
        .map(|req| req.resource_ids.into_iter().collect())
        .unwrap_or_default()
}

pub fn get_resource<'a>(
    ctx: &'a mut RequestContext,
    _state: &'a AppState,
) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let identity = ctx.require_identity()?.clone();
        let resource_id = ctx.path_param("resource_id").ok_or(AppError::NotFound)?;

        reply(&ResourceAccessResponse {
            identity,
            resource_ids: ResourceIds::from([resource_id.to_string()]),
            access: true,
        })
    })
}

pub fn check_access<'a>(
    ctx: &'a mut RequestContext,
    _state: &'a AppState,
) -> BoxFuture<'a, HandlerResult> {
    Box::pin(async move {
        let identity = ctx.require_identity()?.clone();
        let req: ResourceAccessRequest = ctx.json()?;
        req.validate()
            .map_err(|msg| AppError::InvalidRequest(msg.to_string()))?;

        reply(&ResourceAccessResponse {
            identity,
            resource_ids: req.resource_ids.into_iter().collect(),
            access: true,
        })
    })
}
