//! Transactional reordering and reparenting of resources
//!
//! `move_to_position` runs in one SQLite transaction:
//! 1. Lock the moved row, then its current parent, then the prospective parent
//! 2. Validate the request (same parent, missing parent, cycle, same position, bounds)
//! 3. Shift sibling orderings with set-based updates
//! 4. Write the new placement and commit
//!
//! Validation finishes before the first shift, so a rejected move never
//! leaves a partial update behind.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::TreeError;
use crate::resources::{OrderingRange, Resource, ResourceId, ResourceStore};

/// Requested parent for a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentChange {
    /// Keep the current parent and only reorder among siblings
    #[default]
    Unchanged,
    /// Reparent; `None` moves the resource to the forest root
    SetTo(Option<ResourceId>),
}

/// How the siblings left behind by a cross-branch move are renumbered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OldBranchShift {
    /// Decrement the followers of the moved resource, closing the gap
    #[default]
    Compact,
    /// Increment the followers of the moved resource, the same +1 shift the
    /// new branch receives. Leaves a gap at the old position.
    Legacy,
}

impl OldBranchShift {
    fn delta(self) -> i64 {
        match self {
            OldBranchShift::Compact => -1,
            OldBranchShift::Legacy => 1,
        }
    }
}

/// Write path for restructuring the resource forest
#[derive(Debug, Clone)]
pub struct TreeMutator {
    pool: SqlitePool,
    old_branch_shift: OldBranchShift,
}

impl TreeMutator {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            old_branch_shift: OldBranchShift::default(),
        }
    }

    pub fn with_old_branch_shift(mut self, shift: OldBranchShift) -> Self {
        self.old_branch_shift = shift;
        self
    }

    /// Move a resource to `to_position` among its siblings, optionally under a
    /// new parent. Returns the resource as stored after the move.
    pub async fn move_to_position(
        &self,
        resource_id: ResourceId,
        to_position: i64,
        parent_change: ParentChange,
    ) -> Result<Resource, TreeError> {
        let mut tx = self.pool.begin().await?;

        let mut resource = ResourceStore::lock_for_update(&mut tx, resource_id)
            .await?
            .ok_or(TreeError::ResourceNotFound(resource_id))?;
        if let Some(parent_id) = resource.parent_id {
            ResourceStore::lock_for_update(&mut tx, parent_id).await?;
        }

        if let ParentChange::SetTo(new_parent_id) = parent_change {
            if new_parent_id == resource.parent_id {
                return Err(TreeError::SameParent);
            }
            if let Some(new_parent_id) = new_parent_id {
                if ResourceStore::lock_for_update(&mut tx, new_parent_id)
                    .await?
                    .is_none()
                {
                    return Err(TreeError::ParentNotFound(new_parent_id));
                }
                let path = ResourceStore::fetch_ancestors(&mut *tx, new_parent_id, None).await?;
                if path.iter().any(|r| r.resource_id == resource_id) {
                    return Err(TreeError::Cycle { resource_id });
                }
            }
        }

        if parent_change == ParentChange::Unchanged && to_position == resource.ordering {
            return Err(TreeError::SamePosition(to_position));
        }
        if to_position < 1 {
            return Err(TreeError::PositionTooLow(to_position));
        }

        let target_parent_id = match parent_change {
            ParentChange::Unchanged => resource.parent_id,
            ParentChange::SetTo(new_parent_id) => new_parent_id,
        };
        let item_count = ResourceStore::count_children(&mut tx, target_parent_id).await?;
        let max = match parent_change {
            ParentChange::Unchanged => item_count,
            ParentChange::SetTo(_) => item_count + 1,
        };
        if to_position > max {
            return Err(TreeError::PositionTooHigh {
                position: to_position,
                max,
            });
        }

        let old_ordering = resource.ordering;
        match parent_change {
            ParentChange::Unchanged => {
                let (low, high, delta) = if to_position < old_ordering {
                    (to_position, old_ordering, 1)
                } else {
                    (old_ordering, to_position, -1)
                };
                let shifted = ResourceStore::shift_siblings(
                    &mut tx,
                    resource.parent_id,
                    OrderingRange::Between(low, high),
                    delta,
                    Some(resource_id),
                )
                .await?;
                debug!("Shifted {} siblings by {} under {:?}", shifted, delta, resource.parent_id);
            }
            ParentChange::SetTo(new_parent_id) => {
                let delta = self.old_branch_shift.delta();
                let shifted = ResourceStore::shift_siblings(
                    &mut tx,
                    resource.parent_id,
                    OrderingRange::Above(old_ordering),
                    delta,
                    Some(resource_id),
                )
                .await?;
                debug!(
                    "Shifted {} old siblings by {} under {:?}",
                    shifted, delta, resource.parent_id
                );

                let shifted = ResourceStore::shift_siblings(
                    &mut tx,
                    new_parent_id,
                    OrderingRange::AtOrAbove(to_position),
                    1,
                    Some(resource_id),
                )
                .await?;
                debug!("Shifted {} new siblings by 1 under {:?}", shifted, new_parent_id);
            }
        }

        ResourceStore::set_placement(&mut tx, resource_id, target_parent_id, to_position).await?;
        tx.commit().await?;

        info!(
            "Moved resource {} from {:?}#{} to {:?}#{}",
            resource_id, resource.parent_id, old_ordering, target_parent_id, to_position
        );

        resource.parent_id = target_parent_id;
        resource.ordering = to_position;
        Ok(resource)
    }
}
