use serde::{Deserialize, Serialize};

use crate::services::auth::{Identity, ResourceIds};

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceAccessRequest {
    pub resource_ids: Vec<String>,
}

impl ResourceAccessRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.resource_ids.is_empty() {
            return Err("resource_ids must not be empty");
        }
        if self.resource_ids.iter().any(|id| id.trim().is_empty()) {
            return Err("resource_ids must not contain blank ids");
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResourceAccessResponse {
    pub identity: Identity,
    pub resource_ids: ResourceIds,
    pub access: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub sub: Identity,
}
