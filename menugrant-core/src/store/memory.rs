#![forbid(unsafe_code)]

use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::{AssignmentRecord, AssignmentStore};
use crate::serializer::AssignmentRequest;
use crate::source::{PersistenceService, RoleDirectory, RoleSummary, TreeLoader};
use crate::tree::NodeData;
use crate::{Error, Result};

pub struct InMemoryRoleDirectory {
    roles: RwLock<Vec<RoleSummary>>,
}

impl InMemoryRoleDirectory {
    pub fn new(roles: Vec<RoleSummary>) -> Self {
        Self {
            roles: RwLock::new(roles),
        }
    }

    pub fn push(&self, role: RoleSummary) {
        self.roles.write().push(role);
    }
}

impl Default for InMemoryRoleDirectory {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl RoleDirectory for InMemoryRoleDirectory {
    async fn list_roles(&self) -> Result<Vec<RoleSummary>> {
        Ok(self.roles.read().clone())
    }
}

pub struct InMemoryTreeLoader {
    trees: RwLock<IndexMap<String, Vec<NodeData>>>,
}

impl InMemoryTreeLoader {
    pub fn new() -> Self {
        Self {
            trees: RwLock::new(IndexMap::new()),
        }
    }

    pub fn insert(&self, role_code: impl Into<String>, forest: Vec<NodeData>) {
        self.trees.write().insert(role_code.into(), forest);
    }

    pub fn with_tree(self, role_code: impl Into<String>, forest: Vec<NodeData>) -> Self {
        self.insert(role_code, forest);
        self
    }
}

impl Default for InMemoryTreeLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TreeLoader for InMemoryTreeLoader {
    async fn load_tree(&self, role_code: &str) -> Result<Vec<NodeData>> {
        self.trees
            .read()
            .get(role_code)
            .cloned()
            .ok_or_else(|| Error::UnknownRole(role_code.to_string()))
    }
}

/// Keeps assignments in memory and counts every save it receives.
pub struct InMemoryAssignmentStore {
    records: RwLock<HashMap<String, AssignmentRecord>>,
    reject: AtomicBool,
    save_calls: AtomicUsize,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            reject: AtomicBool::new(false),
            save_calls: AtomicUsize::new(0),
        }
    }

    /// When set, saves answer with a non-success indicator.
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryAssignmentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn put(&self, request: &AssignmentRequest) -> Result<AssignmentRecord> {
        let record = AssignmentRecord::from_request(request);
        self.records
            .write()
            .insert(record.role_code.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, role_code: &str) -> Result<Option<AssignmentRecord>> {
        Ok(self.records.read().get(role_code).cloned())
    }

    async fn delete(&self, role_code: &str) -> Result<()> {
        self.records.write().remove(role_code);
        Ok(())
    }

    async fn list_role_codes(&self) -> Result<Vec<String>> {
        let mut codes: Vec<String> = self.records.read().keys().cloned().collect();
        codes.sort();
        Ok(codes)
    }
}

#[async_trait]
impl PersistenceService for InMemoryAssignmentStore {
    async fn save_assignment(&self, request: &AssignmentRequest) -> Result<bool> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.put(request).await?;
        Ok(true)
    }
}
