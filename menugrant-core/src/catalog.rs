#![forbid(unsafe_code)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::selection::SelectionState;
use crate::source::{RoleDirectory, RoleSummary, TreeLoader};
use crate::store::AssignmentStore;
use crate::tree::{MenuRow, MenuTree, NodeData, TreeLimits};
use crate::{Error, Result};

/// Roles and the flat menu table they are assigned from.
///
/// ```yaml
/// roles:
///   - roleCode: admin
///     displayName: Administrator
/// menus:
///   - id: 1
///     title: System
///     url: "#"
///   - id: 2
///     parentId: 1
///     title: Users
///     url: /system/users
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub roles: Vec<RoleSummary>,
    #[serde(default)]
    pub menus: Vec<MenuRow>,
}

impl Catalog {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let catalog: Catalog = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Parses by extension: `.json` as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content),
            _ => Self::from_yaml(&content),
        }
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for role in &self.roles {
            if role.role_code.trim().is_empty() {
                return Err(Error::Config("role code cannot be empty".into()));
            }
            if !seen.insert(role.role_code.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate role code: {}",
                    role.role_code
                )));
            }
        }
        Ok(())
    }

    pub fn has_role(&self, role_code: &str) -> bool {
        self.roles.iter().any(|r| r.role_code == role_code)
    }

    pub fn tree(&self, limits: TreeLimits) -> Result<MenuTree> {
        Ok(MenuTree::from_rows_with_limits(self.menus.clone(), limits)?)
    }
}

#[async_trait]
impl RoleDirectory for Catalog {
    async fn list_roles(&self) -> Result<Vec<RoleSummary>> {
        Ok(self.roles.clone())
    }
}

/// Serves each role the catalog menu forest with `selected` taken from the
/// role's stored assignment.
pub struct CatalogTreeLoader {
    catalog: Arc<Catalog>,
    store: Arc<dyn AssignmentStore>,
    limits: TreeLimits,
}

impl CatalogTreeLoader {
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn AssignmentStore>) -> Self {
        Self {
            catalog,
            store,
            limits: TreeLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: TreeLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[async_trait]
impl TreeLoader for CatalogTreeLoader {
    async fn load_tree(&self, role_code: &str) -> Result<Vec<NodeData>> {
        if !self.catalog.has_role(role_code) {
            return Err(Error::UnknownRole(role_code.to_string()));
        }

        let tree = self.catalog.tree(self.limits)?;
        let selection: SelectionState = match self.store.get(role_code).await? {
            Some(record) => tree.iter().map(|id| (id, record.contains(id))).collect(),
            None => SelectionState::new(),
        };

        Ok(tree.to_data(Some(&selection)))
    }
}
