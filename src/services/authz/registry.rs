//! Policy registry with a two-phase lifecycle.
//!
//! `PolicyRegistryBuilder` is the registration phase (startup only). `freeze()` turns it
//! into a `PolicyRegistry`, which has no mutation API at all: lookups during request
//! handling need no lock and cannot race with a registration.
use std::collections::HashMap;
use std::sync::Arc;

use crate::services::auth::error::AuthError;
use crate::services::auth::types::{Identity, ResourceIds};
use crate::services::authz::policy::Policy;

#[derive(Default)]
pub struct PolicyRegistryBuilder {
    policies: HashMap<String, Arc<dyn Policy>>,
}

impl PolicyRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        name: impl Into<String>,
        policy: impl Policy + 'static,
    ) -> Result<Self, AuthError> {
        let name = name.into();
        if self.policies.contains_key(&name) {
            return Err(AuthError::DuplicatePolicy(name));
        }

        self.policies.insert(name, Arc::new(policy));
        Ok(self)
    }

    pub fn freeze(self) -> PolicyRegistry {
        PolicyRegistry {
            policies: Arc::new(self.policies),
        }
    }
}

/// Immutable name -> policy map. Cheap to clone.
#[derive(Clone)]
pub struct PolicyRegistry {
    policies: Arc<HashMap<String, Arc<dyn Policy>>>,
}

impl std::fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("PolicyRegistry").field("policies", &names).finish()
    }
}

impl PolicyRegistry {
    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    /// Run the policy registered as `name`.
    pub async fn evaluate(
        &self,
        name: &str,
        identity: &Identity,
        resource_ids: &ResourceIds,
    ) -> Result<bool, AuthError> {
        let policy = self
            .policies
            .get(name)
            .ok_or_else(|| AuthError::UnknownPolicy(name.to_string()))?;

        Ok(policy.evaluate(identity, resource_ids).await)
    }
}
