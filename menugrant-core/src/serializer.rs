#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::propagation::PropagationEngine;
use crate::selection::SelectionState;
use crate::tree::{MenuTree, NodeData, NodeId};

/// What to do when loader flags break the parent/child invariant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HydrationPolicy {
    /// Keep the server flags verbatim.
    #[default]
    Trust,
    /// Recompute every internal node from its leaves.
    Heal,
}

/// Which granted ids are submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadMode {
    /// Every granted id, internal folders included.
    #[default]
    Full,
    LeavesOnly,
}

/// Body accepted by the persistence service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRequest {
    pub role_code: String,
    pub menu_ids: Vec<i64>,
}

impl AssignmentRequest {
    pub fn new(role_code: impl Into<String>, ids: impl IntoIterator<Item = NodeId>) -> Self {
        Self {
            role_code: role_code.into(),
            menu_ids: ids.into_iter().map(|id| id.0).collect(),
        }
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.menu_ids.iter().map(|&id| NodeId(id))
    }

    pub fn is_empty(&self) -> bool {
        self.menu_ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentSerializer {
    hydration: HydrationPolicy,
    payload_mode: PayloadMode,
}

impl AssignmentSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hydration(mut self, policy: HydrationPolicy) -> Self {
        self.hydration = policy;
        self
    }

    pub fn with_payload_mode(mut self, mode: PayloadMode) -> Self {
        self.payload_mode = mode;
        self
    }

    pub fn hydration(&self) -> HydrationPolicy {
        self.hydration
    }

    pub fn payload_mode(&self) -> PayloadMode {
        self.payload_mode
    }

    /// Seeds one entry per node from its `selected` flag, as given.
    pub fn hydrate(&self, forest: &[NodeData]) -> SelectionState {
        let mut state = SelectionState::new();
        let mut stack: Vec<&NodeData> = forest.iter().collect();
        while let Some(node) = stack.pop() {
            state.set(node.id, node.selected);
            stack.extend(node.children.iter());
        }
        state
    }

    /// Hydrates and then applies the configured [`HydrationPolicy`] against
    /// the already-validated tree.
    pub fn hydrate_tree(&self, tree: &MenuTree, forest: &[NodeData]) -> SelectionState {
        let state = self.hydrate(forest);
        let violations = state.violations(tree);
        if violations.is_empty() {
            return state;
        }

        match self.hydration {
            HydrationPolicy::Trust => {
                warn!(
                    count = violations.len(),
                    nodes = ?violations,
                    "Loaded selection disagrees with its children; keeping server flags"
                );
                state
            }
            HydrationPolicy::Heal => {
                warn!(
                    count = violations.len(),
                    nodes = ?violations,
                    "Loaded selection disagrees with its children; recomputing from leaves"
                );
                PropagationEngine::new(tree).normalize(&state)
            }
        }
    }

    /// Every granted id, ascending, internal nodes included.
    pub fn to_payload(&self, state: &SelectionState) -> Vec<NodeId> {
        state.granted().collect()
    }

    /// Granted ids filtered by the configured [`PayloadMode`].
    pub fn payload_for(&self, tree: &MenuTree, state: &SelectionState) -> Vec<NodeId> {
        match self.payload_mode {
            PayloadMode::Full => self.to_payload(state),
            PayloadMode::LeavesOnly => state.granted().filter(|&id| tree.is_leaf(id)).collect(),
        }
    }

    pub fn request(
        &self,
        role_code: &str,
        tree: &MenuTree,
        state: &SelectionState,
    ) -> AssignmentRequest {
        AssignmentRequest::new(role_code, self.payload_for(tree, state))
    }
}
