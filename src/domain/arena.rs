use generational_arena::{Arena, Index};
use termtree::Tree;
use tracing::instrument;

use crate::domain::entities::{MemberId, MemberSummary};

/// Tree node in the arena-based downline report.
#[derive(Debug)]
pub struct TreeNode {
    /// Member shown at this position
    pub data: MemberSummary,
    /// Levels below the report root (root is 0)
    pub depth: usize,
    /// Index of parent node in the arena, None for the root
    pub parent: Option<Index>,
    /// Indices of child nodes in join order
    pub children: Vec<Index>,
}

/// Arena-based downline tree for reporting.
///
/// Nodes are addressed by generational indices; parent and child links are
/// indices, never owning pointers.
#[derive(Debug)]
pub struct DownlineTree {
    arena: Arena<TreeNode>,
    root: Option<Index>,
}

impl Default for DownlineTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DownlineTree {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
        }
    }

    #[instrument(level = "trace", skip(self, data), fields(member = %data.handle))]
    pub fn insert_node(&mut self, data: MemberSummary, parent: Option<Index>) -> Index {
        let depth = parent
            .and_then(|p| self.arena.get(p))
            .map(|p| p.depth + 1)
            .unwrap_or(0);
        let node = TreeNode {
            data,
            depth,
            parent,
            children: Vec::new(),
        };
        let node_idx = self.arena.insert(node);

        if let Some(parent_idx) = parent {
            if let Some(parent) = self.arena.get_mut(parent_idx) {
                parent.children.push(node_idx);
            }
        } else {
            self.root = Some(node_idx);
        }

        node_idx
    }

    pub fn get_node(&self, idx: Index) -> Option<&TreeNode> {
        self.arena.get(idx)
    }

    pub fn root(&self) -> Option<Index> {
        self.root
    }

    pub fn root_member(&self) -> Option<&MemberSummary> {
        self.root.and_then(|r| self.get_node(r)).map(|n| &n.data)
    }

    /// Number of nodes including the root.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Pre-order iteration, children visited in join order.
    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self)
    }

    /// Number of levels in the tree, a lone root counts as 1.
    #[instrument(level = "debug", skip(self))]
    pub fn depth(&self) -> usize {
        self.iter().map(|(_, n)| n.depth + 1).max().unwrap_or(0)
    }

    pub fn find(&self, member: MemberId) -> Option<Index> {
        self.iter()
            .find(|(_, n)| n.data.id == member)
            .map(|(idx, _)| idx)
    }

    /// Members at exactly `depth` levels below the root.
    pub fn members_at_depth(&self, depth: usize) -> Vec<&MemberSummary> {
        self.iter()
            .filter(|(_, n)| n.depth == depth)
            .map(|(_, n)| &n.data)
            .collect()
    }

    /// Render for terminal output.
    pub fn to_termtree(&self) -> Tree<String> {
        fn build(tree: &DownlineTree, idx: Index) -> Tree<String> {
            match tree.get_node(idx) {
                Some(node) => Tree::new(node.data.to_string()).with_leaves(
                    node.children
                        .iter()
                        .map(|&child| build(tree, child))
                        .collect::<Vec<_>>(),
                ),
                None => Tree::new(String::new()),
            }
        }

        match self.root {
            Some(root) => build(self, root),
            None => Tree::new("(empty)".to_string()),
        }
    }
}

pub struct TreeIterator<'a> {
    tree: &'a DownlineTree,
    stack: Vec<Index>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a DownlineTree) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = tree.root() {
            stack.push(root);
        }
        Self { tree, stack }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (Index, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let current_idx = self.stack.pop()?;
        let node = self.tree.get_node(current_idx)?;
        // Reverse so the first-joined child is visited first
        for &child in node.children.iter().rev() {
            self.stack.push(child);
        }
        Some((current_idx, node))
    }
}
