/*
 * Responsibility
 * - Request pipeline: endpoint table -> router, per-request dispatch
 * - Handler abstraction: async fn(&mut RequestContext, &AppState) -> JSON value
 */
use std::future::Future;
use std::pin::Pin;

use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

pub mod context;
pub mod dispatch;
pub mod endpoint;

pub use context::{ReplyCookie, RequestContext};
pub use endpoint::{Endpoint, EndpointTable, PipelineError};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler produces: the JSON body of a 200 response, or an error.
pub type HandlerResult = Result<serde_json::Value, AppError>;

/// Endpoint handler.
///
/// Implemented for plain functions of the shape
/// `fn name<'a>(ctx: &'a mut RequestContext, state: &'a AppState) -> BoxFuture<'a, HandlerResult>`.
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        state: &'a AppState,
    ) -> BoxFuture<'a, HandlerResult>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut RequestContext, &'a AppState) -> BoxFuture<'a, HandlerResult>
        + Send
        + Sync
        + 'static,
{
    fn call<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        state: &'a AppState,
    ) -> BoxFuture<'a, HandlerResult> {
        (self)(ctx, state)
    }
}

/// Serialize a handler's reply DTO.
pub fn reply<T: Serialize>(value: &T) -> HandlerResult {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "failed to serialize reply");
        AppError::Internal
    })
}
