//! Resource hierarchy: navigation, reconstruction and mutation

mod mutator;
mod navigator;
mod structure;

pub use mutator::{OldBranchShift, ParentChange, TreeMutator};
pub use navigator::{SubtreeAnchor, SubtreeRow, TreeNavigator};
pub use structure::{build_subtree_struct, build_subtree_struct as reflow_to_tree, TreeNode};
