#![forbid(unsafe_code)]

use crate::selection::SelectionState;
use crate::tree::{MenuTree, NodeId};
use crate::{Error, Result};

/// Applies grant changes to a [`SelectionState`] while keeping every internal
/// node equal to the OR of its children.
///
/// All operations take the current state by reference and return a new one;
/// a failed call leaves nothing half-applied.
#[derive(Debug, Clone, Copy)]
pub struct PropagationEngine<'a> {
    tree: &'a MenuTree,
}

impl<'a> PropagationEngine<'a> {
    pub fn new(tree: &'a MenuTree) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &'a MenuTree {
        self.tree
    }

    /// Flips `id`, forces its subtree to the new value and recomputes every
    /// ancestor up to the root.
    pub fn toggle(&self, state: &SelectionState, id: NodeId) -> Result<SelectionState> {
        self.ensure_known(id)?;
        self.set(state, id, !state.is_granted(id))
    }

    /// Grants or revokes `id` and its whole subtree.
    pub fn set(&self, state: &SelectionState, id: NodeId, value: bool) -> Result<SelectionState> {
        self.ensure_known(id)?;

        let mut next = state.clone();
        next.set(id, value);
        for descendant in self.tree.descendants_of(id) {
            next.set(descendant, value);
        }
        self.recompute_upward(&mut next, id);

        Ok(next)
    }

    /// Recomputes the ancestors of `id` without touching `id` or its subtree.
    pub fn recompute_ancestors(&self, state: &SelectionState, id: NodeId) -> Result<SelectionState> {
        self.ensure_known(id)?;
        let mut next = state.clone();
        self.recompute_upward(&mut next, id);
        Ok(next)
    }

    /// Rebuilds every internal node from its children, bottom-up. Leaves keep
    /// their flags.
    pub fn normalize(&self, state: &SelectionState) -> SelectionState {
        let mut next = state.clone();
        let order: Vec<NodeId> = self.tree.iter().collect();

        // Reversed pre-order visits every child before its parent.
        for &id in order.iter().rev() {
            if self.tree.is_leaf(id) {
                continue;
            }
            let any_child = self.tree.children_of(id).any(|c| next.is_granted(c));
            next.set(id, any_child);
        }

        next
    }

    fn recompute_upward(&self, state: &mut SelectionState, id: NodeId) {
        for ancestor in self.tree.ancestors_of(id) {
            let any_child = self.tree.children_of(ancestor).any(|c| state.is_granted(c));
            state.set(ancestor, any_child);
        }
    }

    fn ensure_known(&self, id: NodeId) -> Result<()> {
        if self.tree.contains(id) {
            Ok(())
        } else {
            Err(Error::UnknownNode(id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{MenuRow, NodeData};

    /// A{B, C{D}}
    fn small_tree() -> MenuTree {
        MenuTree::build(&[NodeData::new(1, "A")
            .with_child(NodeData::new(2, "B"))
            .with_child(NodeData::new(3, "C").with_child(NodeData::new(4, "D")))])
        .unwrap()
    }

    fn wide_tree() -> MenuTree {
        MenuTree::build(&[
            NodeData::new(1, "System")
                .with_child(NodeData::new(2, "Users"))
                .with_child(
                    NodeData::new(3, "Roles")
                        .with_child(NodeData::new(4, "Create"))
                        .with_child(NodeData::new(5, "Delete"))
                        .with_child(
                            NodeData::new(6, "Menus")
                                .with_child(NodeData::new(7, "Assign"))
                                .with_child(NodeData::new(8, "Revoke")),
                        ),
                ),
            NodeData::new(9, "Reports").with_child(NodeData::new(10, "Daily")),
            NodeData::new(11, "Help"),
        ])
        .unwrap()
    }

    fn granted(state: &SelectionState) -> Vec<i64> {
        state.granted().map(|id| id.0).collect()
    }

    #[test]
    fn test_toggle_leaf_propagates_up() {
        let tree = small_tree();
        let engine = PropagationEngine::new(&tree);
        let empty = SelectionState::new();

        let s1 = engine.toggle(&empty, NodeId(4)).unwrap();
        assert_eq!(granted(&s1), vec![1, 3, 4]);
        assert!(!s1.is_granted(NodeId(2)));

        let s2 = engine.toggle(&s1, NodeId(4)).unwrap();
        assert!(granted(&s2).is_empty());

        let s3 = engine.toggle(&s2, NodeId(1)).unwrap();
        assert_eq!(granted(&s3), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_input_state_untouched() {
        let tree = small_tree();
        let engine = PropagationEngine::new(&tree);
        let before = SelectionState::new();
        let _ = engine.toggle(&before, NodeId(1)).unwrap();
        assert!(before.is_empty());
    }

    #[test]
    fn test_sibling_keeps_parent_granted() {
        let tree = wide_tree();
        let engine = PropagationEngine::new(&tree);
        let s = engine.toggle(&SelectionState::new(), NodeId(4)).unwrap();
        let s = engine.toggle(&s, NodeId(5)).unwrap();
        let s = engine.toggle(&s, NodeId(4)).unwrap();
        assert!(s.is_granted(NodeId(3)));
        assert!(s.is_granted(NodeId(1)));

        let s = engine.toggle(&s, NodeId(5)).unwrap();
        assert!(!s.is_granted(NodeId(3)));
        assert!(!s.is_granted(NodeId(1)));
    }

    #[test]
    fn test_internal_toggle_sets_whole_subtree() {
        let tree = wide_tree();
        let engine = PropagationEngine::new(&tree);
        let s = engine.toggle(&SelectionState::new(), NodeId(3)).unwrap();
        for id in tree.descendants_of(NodeId(3)) {
            assert!(s.is_granted(id), "{} should be granted", id);
        }
        assert!(s.is_granted(NodeId(1)));
        assert!(!s.is_granted(NodeId(2)));

        let s = engine.toggle(&s, NodeId(3)).unwrap();
        assert!(tree.descendants_of(NodeId(3)).all(|id| !s.is_granted(id)));
        assert!(!s.is_granted(NodeId(1)));
    }

    #[test]
    fn test_childless_root_is_plain_flip() {
        let tree = wide_tree();
        let engine = PropagationEngine::new(&tree);
        let s = engine.toggle(&SelectionState::new(), NodeId(11)).unwrap();
        assert_eq!(granted(&s), vec![11]);
        let s = engine.toggle(&s, NodeId(11)).unwrap();
        assert!(granted(&s).is_empty());
    }

    #[test]
    fn test_unknown_node() {
        let tree = small_tree();
        let engine = PropagationEngine::new(&tree);
        let result = engine.toggle(&SelectionState::new(), NodeId(42));
        assert!(matches!(result, Err(Error::UnknownNode(NodeId(42)))));
    }

    #[test]
    fn test_recompute_ancestors_idempotent() {
        let tree = wide_tree();
        let engine = PropagationEngine::new(&tree);
        let s = engine.toggle(&SelectionState::new(), NodeId(7)).unwrap();
        let once = engine.recompute_ancestors(&s, NodeId(7)).unwrap();
        let twice = engine.recompute_ancestors(&once, NodeId(7)).unwrap();
        assert_eq!(once, s);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_heals_inconsistent_state() {
        let tree = wide_tree();
        let engine = PropagationEngine::new(&tree);
        let broken: SelectionState = [(NodeId(1), true), (NodeId(8), true), (NodeId(9), true)]
            .into_iter()
            .collect();
        assert!(!broken.is_consistent(&tree));

        let healed = engine.normalize(&broken);
        assert!(healed.is_consistent(&tree));
        assert_eq!(granted(&healed), vec![1, 3, 6, 8]);
        assert_eq!(engine.normalize(&healed), healed);
    }

    /// xorshift keeps the sequences reproducible
    struct Xorshift(u64);

    impl Xorshift {
        fn next(&mut self) -> u64 {
            self.0 ^= self.0 << 13;
            self.0 ^= self.0 >> 7;
            self.0 ^= self.0 << 17;
            self.0
        }
    }

    fn random_forest(rng: &mut Xorshift, size: i64) -> MenuTree {
        let rows = (0..size)
            .map(|i| {
                let row = MenuRow::new(i, format!("Menu {}", i));
                if i == 0 || rng.next() % 4 == 0 {
                    row
                } else {
                    row.with_parent((rng.next() % i as u64) as i64)
                }
            })
            .collect();
        MenuTree::from_rows(rows).unwrap()
    }

    fn chain(size: i64) -> MenuTree {
        let rows = (0..size)
            .map(|i| {
                let row = MenuRow::new(i, format!("Level {}", i));
                if i > 0 {
                    row.with_parent(i - 1)
                } else {
                    row
                }
            })
            .collect();
        MenuTree::from_rows(rows).unwrap()
    }

    fn flat(size: i64) -> MenuTree {
        MenuTree::from_rows((0..size).map(|i| MenuRow::new(i, "Leaf")).collect()).unwrap()
    }

    fn assert_toggle_sequence(tree: &MenuTree, rng: &mut Xorshift, steps: usize) {
        let engine = PropagationEngine::new(tree);
        let ids: Vec<NodeId> = tree.iter().collect();

        let mut state = SelectionState::new();
        for _ in 0..steps {
            let id = ids[(rng.next() % ids.len() as u64) as usize];

            let next = engine.toggle(&state, id).unwrap();
            let value = next.is_granted(id);
            assert_ne!(value, state.is_granted(id));
            assert!(tree.descendants_of(id).all(|d| next.is_granted(d) == value));
            assert!(next.is_consistent(tree), "violations after toggling {}", id);
            state = next;
        }
    }

    #[test]
    fn test_invariant_holds_over_toggle_sequences() {
        let mut rng = Xorshift(0x9e37_79b9_7f4a_7c15);
        assert_toggle_sequence(&wide_tree(), &mut rng, 500);
    }

    #[test]
    fn test_invariant_holds_on_generated_forests() {
        let mut rng = Xorshift(0x9e37_79b9_7f4a_7c15);
        for size in [1, 2, 7, 25, 60] {
            let tree = random_forest(&mut rng, size);
            assert_toggle_sequence(&tree, &mut rng, 200);
        }
        assert_toggle_sequence(&chain(40), &mut rng, 200);
        assert_toggle_sequence(&flat(15), &mut rng, 200);
    }
}
