//! Rebuilds a downline hierarchy from a flat set of fetched records.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::warn;

use crate::domain::arena::DownlineTree;
use crate::domain::entities::{MemberId, MemberSummary};

/// Constructs a `DownlineTree` by matching each node's `downlines` ids
/// against the fetched set.
pub struct TreeBuilder {
    by_id: HashMap<MemberId, MemberSummary>,
    visited: HashSet<MemberId>,
    max_depth: usize,
}

impl TreeBuilder {
    pub fn new(descendants: impl IntoIterator<Item = MemberSummary>, max_depth: usize) -> Self {
        Self {
            by_id: descendants.into_iter().map(|m| (m.id, m)).collect(),
            visited: HashSet::new(),
            max_depth,
        }
    }

    /// Build the tree below `root`. Ids that are not in the fetched set or
    /// that were already placed are skipped.
    pub fn build(mut self, root: MemberSummary) -> DownlineTree {
        let mut tree = DownlineTree::new();
        self.visited.insert(root.id);
        let root_idx = tree.insert_node(root.clone(), None);
        let mut queue = VecDeque::from([(root, root_idx, 0usize)]);

        while let Some((current, current_idx, depth)) = queue.pop_front() {
            if depth >= self.max_depth {
                continue;
            }
            for child_id in &current.downlines {
                if !self.visited.insert(*child_id) {
                    warn!(member = %child_id, "downline already placed in tree, skipping");
                    continue;
                }
                match self.by_id.remove(child_id) {
                    Some(child) => {
                        let child_idx = tree.insert_node(child.clone(), Some(current_idx));
                        queue.push_back((child, child_idx, depth + 1));
                    }
                    None => {
                        warn!(parent = %current.handle, member = %child_id, "downline record missing");
                    }
                }
            }
        }

        tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(handle: &str) -> MemberSummary {
        MemberSummary {
            id: MemberId::new(),
            handle: handle.to_string(),
            name: None,
            mobile: None,
            email: None,
            referral_code: handle.to_string(),
            level: 1,
            sponsor: None,
            downlines: Vec::new(),
        }
    }

    #[test]
    fn given_flat_records_when_building_then_hierarchy_restored() {
        let mut root = summary("root");
        let mut a = summary("a");
        let b = summary("b");
        let a1 = summary("a1");
        a.downlines = vec![a1.id];
        root.downlines = vec![a.id, b.id];

        let tree = TreeBuilder::new(vec![a1.clone(), b.clone(), a.clone()], 8).build(root);

        let order: Vec<_> = tree.iter().map(|(_, n)| n.data.handle.clone()).collect();
        assert_eq!(order, vec!["root", "a", "a1", "b"]);
    }

    #[test]
    fn given_depth_limit_when_building_then_deeper_nodes_dropped() {
        let mut root = summary("root");
        let mut a = summary("a");
        let a1 = summary("a1");
        a.downlines = vec![a1.id];
        root.downlines = vec![a.id];

        let tree = TreeBuilder::new(vec![a, a1], 1).build(root);

        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn given_missing_or_cyclic_ids_when_building_then_skipped() {
        let mut root = summary("root");
        let mut a = summary("a");
        a.downlines = vec![root.id];
        root.downlines = vec![a.id, MemberId::new()];

        let tree = TreeBuilder::new(vec![a], 8).build(root);

        assert_eq!(tree.len(), 2);
    }
}
