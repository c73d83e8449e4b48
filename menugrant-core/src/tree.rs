#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::selection::SelectionState;

/// `url` value marking a node that only groups other nodes.
pub const ORGANIZATIONAL_URL: &str = "#";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl From<i64> for NodeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One node of the forest as returned by a tree loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: NodeId,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub children: Vec<NodeData>,
}

impl NodeData {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id: NodeId(id),
            title: title.into(),
            url: None,
            selected: false,
            children: Vec::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }

    pub fn with_child(mut self, child: NodeData) -> Self {
        self.children.push(child);
        self
    }
}

/// Flat menu row, the shape menus are usually stored in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuRow {
    pub id: NodeId,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

impl MenuRow {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id: NodeId(id),
            parent_id: None,
            title: title.into(),
            url: None,
            sort_order: 0,
        }
    }

    pub fn with_parent(mut self, parent: i64) -> Self {
        self.parent_id = Some(NodeId(parent));
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_sort_order(mut self, sort_order: i32) -> Self {
        self.sort_order = sort_order;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedTreeError {
    DuplicateId(NodeId),
    OrphanChild { id: NodeId, parent: NodeId },
    Cycle { path: Vec<NodeId> },
    MaxDepthExceeded { node: NodeId, depth: usize, max: usize },
}

impl fmt::Display for MalformedTreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateId(id) => write!(f, "node id {} appears more than once", id),
            Self::OrphanChild { id, parent } => {
                write!(f, "node {} references missing parent {}", id, parent)
            }
            Self::Cycle { path } => write!(f, "parent cycle detected: {:?}", path),
            Self::MaxDepthExceeded { node, depth, max } => {
                write!(
                    f,
                    "node {} sits at depth {} which exceeds maximum {}",
                    node, depth, max
                )
            }
        }
    }
}

impl std::error::Error for MalformedTreeError {}

/// Construction limits. The default accepts any finite depth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeLimits {
    pub max_depth: Option<usize>,
}

impl TreeLimits {
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    id: NodeId,
    title: String,
    url: Option<String>,
    children: Vec<usize>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Navigable target, `None` for organizational nodes.
    pub fn href(&self) -> Option<&str> {
        self.url().filter(|u| *u != ORGANIZATIONAL_URL)
    }

    pub fn is_organizational(&self) -> bool {
        self.href().is_none()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Arena-indexed menu forest. Node slots are assigned in display order and
/// the parent index is computed once at construction.
#[derive(Debug, Clone, Default)]
pub struct MenuTree {
    nodes: Vec<Node>,
    parents: Vec<Option<usize>>,
    depths: Vec<usize>,
    index: HashMap<NodeId, usize>,
    roots: Vec<usize>,
}

impl MenuTree {
    pub fn build(forest: &[NodeData]) -> Result<Self, MalformedTreeError> {
        Self::build_with_limits(forest, TreeLimits::default())
    }

    pub fn build_with_limits(
        forest: &[NodeData],
        limits: TreeLimits,
    ) -> Result<Self, MalformedTreeError> {
        let mut tree = Self::default();
        let mut stack: Vec<(&NodeData, Option<usize>)> =
            forest.iter().rev().map(|n| (n, None)).collect();

        while let Some((data, parent)) = stack.pop() {
            let slot = tree.push_node(
                data.id,
                data.title.clone(),
                data.url.clone(),
                parent,
                limits,
            )?;
            for child in data.children.iter().rev() {
                stack.push((child, Some(slot)));
            }
        }

        Ok(tree)
    }

    pub fn from_rows(rows: Vec<MenuRow>) -> Result<Self, MalformedTreeError> {
        Self::from_rows_with_limits(rows, TreeLimits::default())
    }

    pub fn from_rows_with_limits(
        rows: Vec<MenuRow>,
        limits: TreeLimits,
    ) -> Result<Self, MalformedTreeError> {
        let mut by_id: HashMap<NodeId, usize> = HashMap::with_capacity(rows.len());
        for (pos, row) in rows.iter().enumerate() {
            if by_id.insert(row.id, pos).is_some() {
                return Err(MalformedTreeError::DuplicateId(row.id));
            }
        }

        let mut root_rows = Vec::new();
        let mut child_rows: HashMap<NodeId, Vec<usize>> = HashMap::new();
        for (pos, row) in rows.iter().enumerate() {
            match row.parent_id {
                None => root_rows.push(pos),
                Some(parent) if parent == row.id => {
                    return Err(MalformedTreeError::Cycle {
                        path: vec![row.id, row.id],
                    });
                }
                Some(parent) if !by_id.contains_key(&parent) => {
                    return Err(MalformedTreeError::OrphanChild { id: row.id, parent });
                }
                Some(parent) => child_rows.entry(parent).or_default().push(pos),
            }
        }

        // Stable sort keeps input order among equal sort orders.
        root_rows.sort_by_key(|&pos| rows[pos].sort_order);
        for siblings in child_rows.values_mut() {
            siblings.sort_by_key(|&pos| rows[pos].sort_order);
        }

        let mut tree = Self::default();
        let mut stack: Vec<(usize, Option<usize>)> =
            root_rows.iter().rev().map(|&pos| (pos, None)).collect();

        while let Some((pos, parent)) = stack.pop() {
            let row = &rows[pos];
            let slot = tree.push_node(row.id, row.title.clone(), row.url.clone(), parent, limits)?;
            if let Some(children) = child_rows.get(&row.id) {
                for &child in children.iter().rev() {
                    stack.push((child, Some(slot)));
                }
            }
        }

        if tree.len() < rows.len() {
            let start = rows
                .iter()
                .find(|r| !tree.contains(r.id))
                .map(|r| r.id)
                .unwrap_or(NodeId(0));
            return Err(MalformedTreeError::Cycle {
                path: Self::cycle_path(start, &rows, &by_id),
            });
        }

        Ok(tree)
    }

    fn cycle_path(start: NodeId, rows: &[MenuRow], by_id: &HashMap<NodeId, usize>) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(start);

        while let Some(id) = current {
            if !seen.insert(id) {
                let cycle_start = path.iter().position(|p| *p == id).unwrap_or(0);
                let mut cycle: Vec<NodeId> = path[cycle_start..].to_vec();
                cycle.push(id);
                return cycle;
            }
            path.push(id);
            current = by_id.get(&id).and_then(|&pos| rows[pos].parent_id);
        }

        path
    }

    fn push_node(
        &mut self,
        id: NodeId,
        title: String,
        url: Option<String>,
        parent: Option<usize>,
        limits: TreeLimits,
    ) -> Result<usize, MalformedTreeError> {
        if self.index.contains_key(&id) {
            return Err(MalformedTreeError::DuplicateId(id));
        }

        let depth = parent.map_or(0, |p| self.depths[p] + 1);
        if let Some(max) = limits.max_depth {
            if depth >= max {
                return Err(MalformedTreeError::MaxDepthExceeded {
                    node: id,
                    depth: depth + 1,
                    max,
                });
            }
        }

        let slot = self.nodes.len();
        self.nodes.push(Node {
            id,
            title,
            url,
            children: Vec::new(),
        });
        self.parents.push(parent);
        self.depths.push(depth);
        self.index.insert(id, slot);

        match parent {
            Some(p) => self.nodes[p].children.push(slot),
            None => self.roots.push(slot),
        }

        Ok(slot)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.index.get(&id).map(|&slot| &self.nodes[slot])
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.roots.iter().map(|&slot| self.nodes[slot].id)
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        let slot = *self.index.get(&id)?;
        self.parents[slot].map(|p| self.nodes[p].id)
    }

    /// Direct children in display order. Empty for leaves and unknown ids.
    pub fn children_of(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.index
            .get(&id)
            .map(|&slot| self.nodes[slot].children.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&c| self.nodes[c].id)
    }

    /// Every node below `id` in display order, `id` excluded.
    pub fn descendants_of(&self, id: NodeId) -> Descendants<'_> {
        let stack = self
            .index
            .get(&id)
            .map(|&slot| self.nodes[slot].children.iter().rev().copied().collect())
            .unwrap_or_default();
        Descendants { tree: self, stack }
    }

    /// Parent first, root last.
    pub fn ancestors_of(&self, id: NodeId) -> Ancestors<'_> {
        let next = self.index.get(&id).and_then(|&slot| self.parents[slot]);
        Ancestors { tree: self, next }
    }

    /// Whole forest in display order.
    pub fn iter(&self) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|n| n.children.is_empty())
    }

    pub fn depth_of(&self, id: NodeId) -> Option<usize> {
        self.index.get(&id).map(|&slot| self.depths[slot])
    }

    /// Nested representation, `selected` taken from `state` when given.
    pub fn to_data(&self, state: Option<&SelectionState>) -> Vec<NodeData> {
        // Slots are stored in pre-order, so every child slot is greater than
        // its parent's and is finished first when walking backwards.
        let mut built: Vec<Option<NodeData>> = vec![None; self.nodes.len()];
        for slot in (0..self.nodes.len()).rev() {
            let node = &self.nodes[slot];
            let children = node
                .children
                .iter()
                .filter_map(|&c| built[c].take())
                .collect();
            built[slot] = Some(NodeData {
                id: node.id,
                title: node.title.clone(),
                url: node.url.clone(),
                selected: state.is_some_and(|s| s.is_granted(node.id)),
                children,
            });
        }

        self.roots
            .iter()
            .filter_map(|&slot| built[slot].take())
            .collect()
    }
}

/// Lazy pre-order walk. Cloning restarts from the same position.
#[derive(Debug, Clone)]
pub struct Descendants<'a> {
    tree: &'a MenuTree,
    stack: Vec<usize>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.stack.pop()?;
        let node = &self.tree.nodes[slot];
        self.stack.extend(node.children.iter().rev());
        Some(node.id)
    }
}

#[derive(Debug, Clone)]
pub struct Ancestors<'a> {
    tree: &'a MenuTree,
    next: Option<usize>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let slot = self.next?;
        self.next = self.tree.parents[slot];
        Some(self.tree.nodes[slot].id)
    }
}
