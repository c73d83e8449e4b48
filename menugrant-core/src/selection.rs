#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::tree::{MenuTree, NodeId};

/// Granted flag per menu node. A missing entry reads as not granted.
///
/// Treated as a value: propagation never edits a state it was handed, it
/// returns a new one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionState {
    granted: BTreeMap<NodeId, bool>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NodeId) -> Option<bool> {
        self.granted.get(&id).copied()
    }

    pub fn is_granted(&self, id: NodeId) -> bool {
        self.get(id).unwrap_or(false)
    }

    pub(crate) fn set(&mut self, id: NodeId, value: bool) {
        self.granted.insert(id, value);
    }

    /// Granted ids in ascending order.
    pub fn granted(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.granted
            .iter()
            .filter(|(_, granted)| **granted)
            .map(|(id, _)| *id)
    }

    pub fn granted_count(&self) -> usize {
        self.granted.values().filter(|g| **g).count()
    }

    pub fn len(&self) -> usize {
        self.granted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.granted.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, bool)> + '_ {
        self.granted.iter().map(|(id, g)| (*id, *g))
    }

    /// Internal nodes whose flag disagrees with the OR of their children.
    pub fn violations(&self, tree: &MenuTree) -> Vec<NodeId> {
        tree.iter()
            .filter(|&id| !tree.is_leaf(id))
            .filter(|&id| {
                let expected = tree.children_of(id).any(|c| self.is_granted(c));
                self.is_granted(id) != expected
            })
            .collect()
    }

    pub fn is_consistent(&self, tree: &MenuTree) -> bool {
        self.violations(tree).is_empty()
    }

    /// Ids whose granted flag differs between `previous` and `self`.
    pub fn diff(&self, previous: &SelectionState) -> Vec<NodeId> {
        let mut changed: Vec<NodeId> = self
            .granted
            .keys()
            .chain(previous.granted.keys())
            .copied()
            .filter(|&id| self.is_granted(id) != previous.is_granted(id))
            .collect();
        changed.sort_unstable();
        changed.dedup();
        changed
    }
}

impl FromIterator<(NodeId, bool)> for SelectionState {
    fn from_iter<I: IntoIterator<Item = (NodeId, bool)>>(iter: I) -> Self {
        Self {
            granted: iter.into_iter().collect(),
        }
    }
}
