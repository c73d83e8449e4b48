#![forbid(unsafe_code)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::serializer::AssignmentRequest;
use crate::tree::NodeData;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSummary {
    pub role_code: String,
    pub display_name: String,
}

impl RoleSummary {
    pub fn new(role_code: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            role_code: role_code.into(),
            display_name: display_name.into(),
        }
    }
}

/// Lists the roles an operator may assign menus to, in display order.
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    async fn list_roles(&self) -> Result<Vec<RoleSummary>>;
}

/// Returns the full menu forest for a role with its current grants marked
/// through `selected`.
#[async_trait]
pub trait TreeLoader: Send + Sync {
    async fn load_tree(&self, role_code: &str) -> Result<Vec<NodeData>>;
}

/// Stores a role's assignment. `Ok(false)` means the service refused it.
#[async_trait]
pub trait PersistenceService: Send + Sync {
    async fn save_assignment(&self, request: &AssignmentRequest) -> Result<bool>;
}
