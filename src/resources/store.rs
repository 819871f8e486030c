//! Resource persistence: keyed lookup, ancestor queries and the locking and
//! ordering primitives used by tree mutation

use sqlx::{SqliteConnection, SqliteExecutor, SqlitePool};

use super::{Group, GroupId, Resource, ResourceId, User, UserContext, UserId};

/// Ordering interval selected by a bulk sibling shift
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderingRange {
    /// `low <= ordering <= high`
    Between(i64, i64),
    /// `ordering > n`
    Above(i64),
    /// `ordering >= n`
    AtOrAbove(i64),
}

/// Read access to resources and principals, backed by SQLite
#[derive(Debug, Clone)]
pub struct ResourceStore {
    pool: SqlitePool,
}

impl ResourceStore {
    /// Create a new resource store with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get a resource by ID
    pub async fn get(&self, resource_id: ResourceId) -> Result<Option<Resource>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT resource_id, parent_id, ordering, resource_name, resource_type,
                   owner_user_id, owner_group_id
            FROM resources WHERE resource_id = ?
            "#,
        )
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Get the direct children of `parent_id` (forest roots for `None`) in order
    pub async fn children(&self, parent_id: Option<ResourceId>) -> Result<Vec<Resource>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT resource_id, parent_id, ordering, resource_name, resource_type,
                   owner_user_id, owner_group_id
            FROM resources WHERE parent_id IS ? ORDER BY ordering, resource_id
            "#,
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn user(&self, user_id: UserId) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as("SELECT id, user_name FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn group(&self, group_id: GroupId) -> Result<Option<Group>, sqlx::Error> {
        sqlx::query_as("SELECT id, group_name FROM principal_groups WHERE id = ?")
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Load a user together with all of its group memberships
    pub async fn user_context(&self, user_id: UserId) -> Result<Option<UserContext>, sqlx::Error> {
        let Some(user) = self.user(user_id).await? else {
            return Ok(None);
        };

        let groups: Vec<Group> = sqlx::query_as(
            r#"
            SELECT g.id, g.group_name
            FROM principal_groups g JOIN group_members m ON m.group_id = g.id
            WHERE m.user_id = ?
            ORDER BY g.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(UserContext::new(user, groups)))
    }

    /// Get every member of a group
    pub async fn group_members(&self, group_id: GroupId) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT u.id, u.user_name
            FROM users u JOIN group_members m ON m.user_id = u.id
            WHERE m.group_id = ?
            ORDER BY u.id
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
    }

    /// Path from `resource_id` up to its forest root
    pub async fn ancestor_path(
        &self,
        resource_id: ResourceId,
        max_depth: Option<u32>,
    ) -> Result<Vec<Resource>, sqlx::Error> {
        Self::fetch_ancestors(&self.pool, resource_id, max_depth).await
    }

    /// Resource followed by its ancestors, nearest first, at most `max_depth`
    /// rows. Usable inside a transaction. Already visited ids are never
    /// revisited, so a malformed parent cycle still terminates.
    pub async fn fetch_ancestors<'e, E>(
        executor: E,
        resource_id: ResourceId,
        max_depth: Option<u32>,
    ) -> Result<Vec<Resource>, sqlx::Error>
    where
        E: SqliteExecutor<'e>,
    {
        sqlx::query_as(
            r#"
            WITH RECURSIVE ancestors(resource_id, parent_id, depth, visited) AS (
                    SELECT resource_id, parent_id, 1, '/' || resource_id || '/'
                    FROM resources WHERE resource_id = ?1
                  UNION ALL
                    SELECT res.resource_id, res.parent_id, a.depth + 1,
                           a.visited || res.resource_id || '/'
                    FROM resources AS res JOIN ancestors AS a ON res.resource_id = a.parent_id
                    WHERE a.depth < ?2
                      AND instr(a.visited, '/' || res.resource_id || '/') = 0
            )
            SELECT r.resource_id, r.parent_id, r.ordering, r.resource_name, r.resource_type,
                   r.owner_user_id, r.owner_group_id
            FROM ancestors AS a JOIN resources AS r ON r.resource_id = a.resource_id
            ORDER BY a.depth
            "#,
        )
        .bind(resource_id)
        .bind(depth_limit(max_depth))
        .fetch_all(executor)
        .await
    }

    /// Select a resource for update.
    ///
    /// The no-op write takes SQLite's write lock for the rest of the enclosing
    /// transaction, so concurrent mutations queue behind it until commit.
    pub async fn lock_for_update(
        conn: &mut SqliteConnection,
        resource_id: ResourceId,
    ) -> Result<Option<Resource>, sqlx::Error> {
        sqlx::query_as(
            r#"
            UPDATE resources SET ordering = ordering WHERE resource_id = ?
            RETURNING resource_id, parent_id, ordering, resource_name, resource_type,
                      owner_user_id, owner_group_id
            "#,
        )
        .bind(resource_id)
        .fetch_optional(conn)
        .await
    }

    /// Number of direct children under `parent_id`
    pub async fn count_children(
        conn: &mut SqliteConnection,
        parent_id: Option<ResourceId>,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM resources WHERE parent_id IS ?")
            .bind(parent_id)
            .fetch_one(conn)
            .await?;
        Ok(count)
    }

    /// Add `delta` to the ordering of every child of `parent_id` inside
    /// `range`, except `skip`, in one statement. Returns the rows touched.
    pub async fn shift_siblings(
        conn: &mut SqliteConnection,
        parent_id: Option<ResourceId>,
        range: OrderingRange,
        delta: i64,
        skip: Option<ResourceId>,
    ) -> Result<u64, sqlx::Error> {
        let (condition, low, high) = match range {
            OrderingRange::Between(low, high) => ("ordering BETWEEN ? AND ?", low, Some(high)),
            OrderingRange::Above(n) => ("ordering > ?", n, None),
            OrderingRange::AtOrAbove(n) => ("ordering >= ?", n, None),
        };
        let sql = format!(
            "UPDATE resources SET ordering = ordering + ? \
             WHERE parent_id IS ? AND {} AND resource_id IS NOT ?",
            condition
        );

        let mut query = sqlx::query(&sql).bind(delta).bind(parent_id).bind(low);
        if let Some(high) = high {
            query = query.bind(high);
        }
        let result = query.bind(skip).execute(conn).await?;

        Ok(result.rows_affected())
    }

    /// Write a resource's parent and ordering
    pub async fn set_placement(
        conn: &mut SqliteConnection,
        resource_id: ResourceId,
        parent_id: Option<ResourceId>,
        ordering: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE resources SET parent_id = ?, ordering = ? WHERE resource_id = ?")
            .bind(parent_id)
            .bind(ordering)
            .bind(resource_id)
            .execute(conn)
            .await?;
        Ok(())
    }
}

/// Depth bound for recursive queries; unbounded maps to the largest integer
pub(crate) fn depth_limit(max_depth: Option<u32>) -> i64 {
    max_depth.map(i64::from).unwrap_or(i64::MAX)
}
