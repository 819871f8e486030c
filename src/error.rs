//! Tree mutation errors

use thiserror::Error;

use crate::resources::ResourceId;

/// Broad category of a [`TreeError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeErrorKind {
    /// A referenced node does not exist
    TreeMissing,
    /// The requested parent would leave the tree unchanged or cyclic
    TreePath,
    /// The requested position equals the current one
    WrongPosition,
    /// The requested position is outside the sibling range
    OutOfBoundary,
    /// The storage layer failed; nothing was committed
    Storage,
}

/// Rejections from `move_to_position`.
///
/// Every domain variant is raised before any ordering shift runs. None of them
/// are retried here.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("resource {0} not found")]
    ResourceNotFound(ResourceId),

    #[error("new parent node {0} not found")]
    ParentNotFound(ResourceId),

    #[error("new parent is the same as old parent")]
    SameParent,

    #[error("cannot move resource {resource_id} into its own subtree")]
    Cycle { resource_id: ResourceId },

    #[error("position {0} is the same as the current one")]
    SamePosition(i64),

    #[error("position {0} is lower than 1")]
    PositionTooLow(i64),

    #[error("position {position} is higher than allowed maximum {max}")]
    PositionTooHigh { position: i64, max: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl TreeError {
    pub fn kind(&self) -> TreeErrorKind {
        match self {
            TreeError::ResourceNotFound(_) | TreeError::ParentNotFound(_) => {
                TreeErrorKind::TreeMissing
            }
            TreeError::SameParent | TreeError::Cycle { .. } => TreeErrorKind::TreePath,
            TreeError::SamePosition(_) => TreeErrorKind::WrongPosition,
            TreeError::PositionTooLow(_) | TreeError::PositionTooHigh { .. } => {
                TreeErrorKind::OutOfBoundary
            }
            TreeError::Database(_) => TreeErrorKind::Storage,
        }
    }
}
