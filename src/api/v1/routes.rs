/*
 * Responsibility
 * - v1 URL structure and the authorization requirement of every endpoint
 * - Bearer verification is applied to the whole v1 tree; AuthConf decides who may call what
 *   (open endpoints never reject a stale bearer)
 */
use axum::Router;

use crate::api::v1::handlers::{
    health::health,
    resources::{body_resource_ids, check_access, get_resource},
    session::me,
    token::{revoke, token},
};
use crate::middleware;
use crate::pipeline::{Endpoint, EndpointTable, PipelineError};
use crate::services::authz::AuthConf;
use crate::services::authz::engine::{no_resources, path_param};
use crate::services::authz::policies::{AUTHENTICATED, OWNS_ALL};
use crate::state::AppState;

fn endpoints() -> EndpointTable {
    EndpointTable::new()
        .add(Endpoint::get("/health", health))
        .add(Endpoint::post("/token", token))
        .add(Endpoint::post("/token/revoke", revoke))
        .add(Endpoint::get("/me", me).with_auth(AuthConf::new(AUTHENTICATED, no_resources)))
        .add(
            Endpoint::get("/resources/{resource_id}", get_resource)
                .with_auth(AuthConf::new(OWNS_ALL, path_param("resource_id"))),
        )
        .add(
            Endpoint::post("/resources/access", check_access)
                .with_auth(AuthConf::new(OWNS_ALL, body_resource_ids)),
        )
}

pub fn routes(state: AppState) -> Result<Router<AppState>, PipelineError> {
    let router = endpoints().into_router(state.authz.registry())?;
    Ok(middleware::auth::apply(router, state))
}
