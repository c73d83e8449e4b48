#![forbid(unsafe_code)]

use std::collections::HashSet;

use crate::tree::{MenuTree, NodeId};

/// Which nodes show their children. Purely cosmetic, independent of grants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    expanded: HashSet<NodeId>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expanded.contains(&id)
    }

    /// Flips `id` and returns its new value.
    pub fn toggle(&mut self, id: NodeId) -> bool {
        if !self.expanded.remove(&id) {
            self.expanded.insert(id);
            return true;
        }
        false
    }

    pub fn expand(&mut self, id: NodeId) {
        self.expanded.insert(id);
    }

    pub fn collapse(&mut self, id: NodeId) {
        self.expanded.remove(&id);
    }

    /// Expands every node that has children.
    pub fn expand_all(&mut self, tree: &MenuTree) {
        self.expanded
            .extend(tree.iter().filter(|&id| !tree.is_leaf(id)));
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Nodes visible under the current expansion, in display order, with depth.
    pub fn visible(&self, tree: &MenuTree) -> Vec<(NodeId, usize)> {
        let mut out = Vec::new();
        let mut stack: Vec<(NodeId, usize)> = tree.roots().map(|id| (id, 0)).collect();
        stack.reverse();

        while let Some((id, depth)) = stack.pop() {
            out.push((id, depth));
            if self.is_expanded(id) {
                let children: Vec<NodeId> = tree.children_of(id).collect();
                stack.extend(children.into_iter().rev().map(|c| (c, depth + 1)));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::NodeData;

    fn tree() -> MenuTree {
        MenuTree::build(&[
            NodeData::new(1, "A")
                .with_child(NodeData::new(2, "B"))
                .with_child(NodeData::new(3, "C").with_child(NodeData::new(4, "D"))),
            NodeData::new(5, "E"),
        ])
        .unwrap()
    }

    #[test]
    fn test_absent_means_collapsed() {
        let state = ExpansionState::new();
        assert!(!state.is_expanded(NodeId(1)));
        assert_eq!(state.visible(&tree()), vec![(NodeId(1), 0), (NodeId(5), 0)]);
    }

    #[test]
    fn test_toggle() {
        let mut state = ExpansionState::new();
        assert!(state.toggle(NodeId(1)));
        assert!(state.is_expanded(NodeId(1)));
        assert!(!state.toggle(NodeId(1)));
        assert!(!state.is_expanded(NodeId(1)));
    }

    #[test]
    fn test_visible_follows_expansion() {
        let t = tree();
        let mut state = ExpansionState::new();
        state.expand(NodeId(1));
        assert_eq!(
            state.visible(&t),
            vec![(NodeId(1), 0), (NodeId(2), 1), (NodeId(3), 1), (NodeId(5), 0)]
        );

        state.expand_all(&t);
        assert!(state.is_expanded(NodeId(3)));
        assert!(!state.is_expanded(NodeId(5)));
        assert_eq!(state.visible(&t).len(), 5);

        state.collapse_all();
        assert_eq!(state.visible(&t).len(), 2);
    }
}
