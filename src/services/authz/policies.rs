//! Built-in policies.
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::services::auth::types::{Identity, ResourceIds};
use crate::services::authz::oracle::OwnershipOracle;
use crate::services::authz::policy::Policy;

pub const OWNS_ALL: &str = "owns-all";
pub const AUTHENTICATED: &str = "authenticated";

/// What a policy answers when the endpoint targets no resources at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptySet {
    Allow,
    Deny,
}

/// Allow iff the oracle confirms access to every id in the set.
///
/// Oracle failures deny.
pub struct OwnsAll {
    oracle: Arc<dyn OwnershipOracle>,
    on_empty: EmptySet,
}

impl OwnsAll {
    pub fn new(oracle: Arc<dyn OwnershipOracle>, on_empty: EmptySet) -> Self {
        Self { oracle, on_empty }
    }
}

#[async_trait]
impl Policy for OwnsAll {
    async fn evaluate(&self, identity: &Identity, resource_ids: &ResourceIds) -> bool {
        if resource_ids.is_empty() {
            return self.on_empty == EmptySet::Allow;
        }

        match self.oracle.has_access_to_all(identity, resource_ids).await {
            Ok(allowed) => allowed,
            Err(err) => {
                warn!(
                    identity = %identity,
                    resource_count = resource_ids.len(),
                    error = %err,
                    "ownership oracle failed, denying"
                );
                false
            }
        }
    }
}

/// Any authenticated caller. Resource ids (including none) are not consulted.
pub struct AnyAuthenticated;

#[async_trait]
impl Policy for AnyAuthenticated {
    async fn evaluate(&self, _identity: &Identity, _resource_ids: &ResourceIds) -> bool {
        true
    }
}
