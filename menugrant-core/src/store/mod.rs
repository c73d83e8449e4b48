#![forbid(unsafe_code)]

mod memory;
mod redb_store;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::serializer::AssignmentRequest;
use crate::tree::NodeId;
use crate::Result;

pub use memory::{InMemoryAssignmentStore, InMemoryRoleDirectory, InMemoryTreeLoader};
pub use redb_store::{RedbAssignmentStore, RedbStorage};

/// A persisted role assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub role_code: String,
    pub menu_ids: Vec<i64>,
    pub saved_at: DateTime<Utc>,
}

impl AssignmentRecord {
    pub fn from_request(request: &AssignmentRequest) -> Self {
        let mut menu_ids = request.menu_ids.clone();
        menu_ids.sort_unstable();
        menu_ids.dedup();
        Self {
            role_code: request.role_code.clone(),
            menu_ids,
            saved_at: Utc::now(),
        }
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.menu_ids.binary_search(&id.0).is_ok()
    }
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn put(&self, request: &AssignmentRequest) -> Result<AssignmentRecord>;
    async fn get(&self, role_code: &str) -> Result<Option<AssignmentRecord>>;
    async fn delete(&self, role_code: &str) -> Result<()>;
    async fn list_role_codes(&self) -> Result<Vec<String>>;
}
