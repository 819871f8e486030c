//! Shared test utilities for database operations
//!
//! Provides an in-memory database with the full schema plus small seeding
//! helpers, so unit tests across modules build their fixtures the same way.

use sqlx::SqlitePool;

use super::Database;

/// Create an in-memory test database pool with full schema
pub async fn test_pool() -> SqlitePool {
    let db = Database::new(None)
        .await
        .expect("Failed to create test database");
    db.pool().clone()
}

pub async fn insert_user(pool: &SqlitePool, id: i64, name: &str) {
    sqlx::query("INSERT INTO users (id, user_name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await
        .expect("Failed to insert user");
}

pub async fn insert_group(pool: &SqlitePool, id: i64, name: &str, members: &[i64]) {
    sqlx::query("INSERT INTO principal_groups (id, group_name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await
        .expect("Failed to insert group");
    for user_id in members {
        sqlx::query("INSERT INTO group_members (group_id, user_id) VALUES (?, ?)")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await
            .expect("Failed to insert group member");
    }
}

pub async fn insert_resource(
    pool: &SqlitePool,
    id: i64,
    parent_id: Option<i64>,
    ordering: i64,
) {
    sqlx::query(
        "INSERT INTO resources (resource_id, parent_id, ordering, resource_name, resource_type)
         VALUES (?, ?, ?, ?, 'entry')",
    )
    .bind(id)
    .bind(parent_id)
    .bind(ordering)
    .bind(format!("resource-{}", id))
    .execute(pool)
    .await
    .expect("Failed to insert resource");
}

pub async fn set_owner(pool: &SqlitePool, resource_id: i64, user: Option<i64>, group: Option<i64>) {
    sqlx::query("UPDATE resources SET owner_user_id = ?, owner_group_id = ? WHERE resource_id = ?")
        .bind(user)
        .bind(group)
        .bind(resource_id)
        .execute(pool)
        .await
        .expect("Failed to set owner");
}

pub async fn grant_user(pool: &SqlitePool, user_id: i64, resource_id: i64, perm_name: &str) {
    sqlx::query(
        "INSERT INTO user_resource_permissions (user_id, resource_id, perm_name) VALUES (?, ?, ?)",
    )
    .bind(user_id)
    .bind(resource_id)
    .bind(perm_name)
    .execute(pool)
    .await
    .expect("Failed to grant user permission");
}

pub async fn grant_group(pool: &SqlitePool, group_id: i64, resource_id: i64, perm_name: &str) {
    sqlx::query(
        "INSERT INTO group_resource_permissions (group_id, resource_id, perm_name) VALUES (?, ?, ?)",
    )
    .bind(group_id)
    .bind(resource_id)
    .bind(perm_name)
    .execute(pool)
    .await
    .expect("Failed to grant group permission");
}

/// Orderings of the children of `parent_id`, keyed by resource id
pub async fn child_orderings(pool: &SqlitePool, parent_id: Option<i64>) -> Vec<(i64, i64)> {
    sqlx::query_as(
        "SELECT resource_id, ordering FROM resources WHERE parent_id IS ? ORDER BY resource_id",
    )
    .bind(parent_id)
    .fetch_all(pool)
    .await
    .expect("Failed to read orderings")
}
