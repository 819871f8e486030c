//! Folding a flat pre-order listing back into a nested tree

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

use super::SubtreeRow;
use crate::resources::{Resource, ResourceId};

/// A node of a reconstructed tree. The sentinel root of an empty result or
/// of a multi-root forest has `node: None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub node: Option<Resource>,
    /// Children keyed by resource id, in listing order
    pub children: IndexMap<ResourceId, TreeNode>,
}

impl TreeNode {
    fn leaf(resource: Resource) -> Self {
        Self {
            node: Some(resource),
            children: IndexMap::new(),
        }
    }

    /// Number of resources in this subtree, the sentinel not counted
    pub fn len(&self) -> usize {
        usize::from(self.node.is_some()) + self.children.values().map(TreeNode::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build `{node, children}` from rows in pre-order, as produced by
/// `TreeNavigator::subtree`.
///
/// Each row is attached under the node its path points to once the last
/// segment is stripped. Rows whose parent is not in the listing are dropped.
/// A single top-level row becomes the returned node itself; otherwise the
/// top-level rows hang off a sentinel root.
pub fn build_subtree_struct(rows: impl IntoIterator<Item = SubtreeRow>) -> TreeNode {
    let mut root = TreeNode::default();

    for row in rows {
        let Some(path) = parse_path(&row.path) else {
            warn!("Skipping row with malformed path {:?}", row.path);
            continue;
        };
        let Some((_, ancestors)) = path.split_last() else {
            continue;
        };

        match descend(&mut root, ancestors) {
            Some(parent) => {
                parent
                    .children
                    .insert(row.resource.resource_id, TreeNode::leaf(row.resource));
            }
            None => warn!(
                "Skipping resource {} whose parent is missing from the listing",
                row.resource.resource_id
            ),
        }
    }

    if root.children.len() == 1 {
        if let Some((_, only)) = root.children.pop() {
            return only;
        }
    }
    root
}

fn parse_path(path: &str) -> Option<Vec<ResourceId>> {
    path.split('/').map(|s| s.parse().ok()).collect()
}

fn descend<'a>(mut node: &'a mut TreeNode, path: &[ResourceId]) -> Option<&'a mut TreeNode> {
    for id in path {
        node = node.children.get_mut(id)?;
    }
    Some(node)
}
