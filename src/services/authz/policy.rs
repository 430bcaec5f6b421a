use async_trait::async_trait;
use std::future::Future;

use crate::services::auth::types::{Identity, ResourceIds};

/// A named authorization predicate.
///
/// Implementations decide explicitly what an empty `resource_ids` set means;
/// there is no shared default.
#[async_trait]
pub trait Policy: Send + Sync {
    async fn evaluate(&self, identity: &Identity, resource_ids: &ResourceIds) -> bool;
}

/// Adapter that turns an async closure into a [`Policy`].
///
/// ```ignore
/// builder.register("is-admin", policy_fn(|identity, _ids| async move {
///     identity.as_str() == "admin"
/// }))?;
/// ```
pub struct PolicyFn<F>(F);

pub fn policy_fn<F, Fut>(f: F) -> PolicyFn<F>
where
    F: Fn(Identity, ResourceIds) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    PolicyFn(f)
}

#[async_trait]
impl<F, Fut> Policy for PolicyFn<F>
where
    F: Fn(Identity, ResourceIds) -> Fut + Send + Sync,
    Fut: Future<Output = bool> + Send,
{
    async fn evaluate(&self, identity: &Identity, resource_ids: &ResourceIds) -> bool {
        (self.0)(identity.clone(), resource_ids.clone()).await
    }
}
