//! Subtree and ancestor-path retrieval

use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::resources::{depth_limit, Resource, ResourceId, ResourceStore};

/// Where a subtree query starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtreeAnchor {
    /// The resource itself and everything below it
    Resource(ResourceId),
    /// Every child of the parent and everything below them; `None` means the
    /// roots of the forest
    Parent(Option<ResourceId>),
}

/// One row of a pre-order subtree listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SubtreeRow {
    #[sqlx(flatten)]
    pub resource: Resource,
    /// 1 for the anchor row(s)
    pub depth: i64,
    /// Zero-padded orderings of every level, `/`-joined
    pub sort_key: String,
    /// Resource ids from the anchor row down to this one, `/`-joined
    pub path: String,
}

/// Hierarchy views over the resource forest. Takes no locks.
#[derive(Debug, Clone)]
pub struct TreeNavigator {
    store: ResourceStore,
    default_depth: Option<u32>,
}

impl TreeNavigator {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            store: ResourceStore::new(pool),
            default_depth: None,
        }
    }

    /// Depth limit used when a query passes `None`
    pub fn with_default_depth(mut self, depth: Option<u32>) -> Self {
        self.default_depth = depth;
        self
    }

    /// Fetch a resource by id
    pub async fn fetch_by_id(&self, resource_id: ResourceId) -> Result<Option<Resource>, sqlx::Error> {
        self.store.get(resource_id).await
    }

    /// Pre-order listing of the subtree under `anchor`, at most `max_depth`
    /// levels deep, siblings in `ordering` order.
    pub async fn subtree(
        &self,
        anchor: SubtreeAnchor,
        max_depth: Option<u32>,
    ) -> Result<Vec<SubtreeRow>, sqlx::Error> {
        let (anchor_clause, anchor_id) = match anchor {
            SubtreeAnchor::Resource(id) => ("res.resource_id = ?1", Some(id)),
            SubtreeAnchor::Parent(parent_id) => ("res.parent_id IS ?1", parent_id),
        };

        let sql = format!(
            r#"
            WITH RECURSIVE subtree(resource_id, depth, sort_key, path) AS (
                    SELECT res.resource_id, 1, printf('%010d', res.ordering),
                           CAST(res.resource_id AS TEXT)
                    FROM resources AS res WHERE {}
                  UNION ALL
                    SELECT child.resource_id, st.depth + 1,
                           st.sort_key || '/' || printf('%010d', child.ordering),
                           st.path || '/' || child.resource_id
                    FROM resources AS child JOIN subtree AS st ON child.parent_id = st.resource_id
                    WHERE st.depth < ?2
                      AND instr('/' || st.path || '/', '/' || child.resource_id || '/') = 0
            )
            SELECT r.resource_id, r.parent_id, r.ordering, r.resource_name, r.resource_type,
                   r.owner_user_id, r.owner_group_id, st.depth, st.sort_key, st.path
            FROM subtree AS st JOIN resources AS r ON r.resource_id = st.resource_id
            ORDER BY st.sort_key
            "#,
            anchor_clause
        );

        let rows: Vec<SubtreeRow> = sqlx::query_as(&sql)
            .bind(anchor_id)
            .bind(depth_limit(max_depth.or(self.default_depth)))
            .fetch_all(self.store.pool())
            .await?;

        debug!("Subtree {:?} returned {} rows", anchor, rows.len());
        Ok(rows)
    }

    /// The resource followed by its ancestors up to the root, or `max_depth`
    /// rows in total
    pub async fn ancestor_path(
        &self,
        resource_id: ResourceId,
        max_depth: Option<u32>,
    ) -> Result<Vec<Resource>, sqlx::Error> {
        self.store
            .ancestor_path(resource_id, max_depth.or(self.default_depth))
            .await
    }
}
