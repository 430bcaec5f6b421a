/*
 * Responsibility
 * - Per-endpoint authorization requirement (AuthConf: policy name + resource id extractor)
 * - check_authorized: identity present? -> ids from the request -> policy verdict
 */
use std::fmt;
use std::sync::Arc;

use tracing::{error, warn};

use crate::pipeline::context::RequestContext;
use crate::services::auth::error::AuthError;
use crate::services::auth::types::ResourceIds;
use crate::services::authz::registry::PolicyRegistry;

type ResourceIdsOf = dyn Fn(&RequestContext) -> ResourceIds + Send + Sync;

/// Authorization requirement declared once per endpoint.
#[derive(Clone)]
pub struct AuthConf {
    policy: String,
    resource_ids_of: Arc<ResourceIdsOf>,
}

impl AuthConf {
    pub fn new<F>(policy: impl Into<String>, resource_ids_of: F) -> Self
    where
        F: Fn(&RequestContext) -> ResourceIds + Send + Sync + 'static,
    {
        Self {
            policy: policy.into(),
            resource_ids_of: Arc::new(resource_ids_of),
        }
    }

    pub fn policy(&self) -> &str {
        &self.policy
    }

    pub fn resource_ids(&self, ctx: &RequestContext) -> ResourceIds {
        (self.resource_ids_of)(ctx)
    }
}

impl fmt::Debug for AuthConf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConf")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Extractor for endpoints that target no particular resource.
pub fn no_resources(_ctx: &RequestContext) -> ResourceIds {
    ResourceIds::new()
}

/// Extractor reading a single id from a path parameter. A missing parameter yields the empty set.
pub fn path_param(name: &'static str) -> impl Fn(&RequestContext) -> ResourceIds + Send + Sync {
    move |ctx: &RequestContext| ctx.path_param(name).map(str::to_string).into_iter().collect()
}

#[derive(Debug, Clone)]
pub struct AuthzEngine {
    registry: PolicyRegistry,
}

impl AuthzEngine {
    pub fn new(registry: PolicyRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    pub async fn check_authorized(
        &self,
        ctx: &RequestContext,
        conf: &AuthConf,
    ) -> Result<(), AuthError> {
        let identity = ctx.require_identity()?;
        let resource_ids = conf.resource_ids(ctx);

        match self
            .registry
            .evaluate(conf.policy(), identity, &resource_ids)
            .await
        {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(
                    identity = %identity,
                    policy = conf.policy(),
                    resource_count = resource_ids.len(),
                    "authorization denied"
                );
                Err(AuthError::Forbidden)
            }
            Err(err) => {
                error!(policy = conf.policy(), error = %err, "authorization check failed");
                Err(err)
            }
        }
    }
}
