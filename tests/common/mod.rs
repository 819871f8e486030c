//! Common test utilities - CanopyTest fixture for end-to-end testing

#![allow(dead_code)]

use anyhow::Result;
use canopy::config::{Config, DatabaseConfig};
use canopy::resources::{Resource, ResourceStore, UserContext};
use canopy::Engine;
use sqlx::SqlitePool;
use tempfile::TempDir;

/// An engine over a fresh database plus seeding helpers
pub struct CanopyTest {
    pub engine: Engine,
    _dir: Option<TempDir>,
}

impl CanopyTest {
    /// Engine over an in-memory database
    pub async fn memory() -> Result<Self> {
        let engine = Engine::new(Config::default()).await?;
        Ok(Self { engine, _dir: None })
    }

    /// Engine over a file-backed database with a real connection pool
    pub async fn file() -> Result<Self> {
        Self::file_with(Config::default()).await
    }

    /// File-backed engine; the database path in `config` is replaced
    pub async fn file_with(mut config: Config) -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("canopy.db");
        config.database = DatabaseConfig {
            path: Some(path.to_string_lossy().into_owned()),
            ..config.database
        };

        let engine = Engine::new(config).await?;
        Ok(Self {
            engine,
            _dir: Some(dir),
        })
    }

    pub fn pool(&self) -> SqlitePool {
        self.engine.db().pool().clone()
    }

    pub fn store(&self) -> ResourceStore {
        ResourceStore::new(self.pool())
    }

    pub async fn user(&self, id: i64, name: &str) -> Result<()> {
        sqlx::query("INSERT INTO users (id, user_name) VALUES (?, ?)")
            .bind(id)
            .bind(name)
            .execute(&self.pool())
            .await?;
        Ok(())
    }

    pub async fn group(&self, id: i64, name: &str, members: &[i64]) -> Result<()> {
        let pool = self.pool();
        sqlx::query("INSERT INTO principal_groups (id, group_name) VALUES (?, ?)")
            .bind(id)
            .bind(name)
            .execute(&pool)
            .await?;
        for user_id in members {
            sqlx::query("INSERT INTO group_members (group_id, user_id) VALUES (?, ?)")
                .bind(id)
                .bind(user_id)
                .execute(&pool)
                .await?;
        }
        Ok(())
    }

    pub async fn resource(&self, id: i64, parent_id: Option<i64>, ordering: i64) -> Result<()> {
        sqlx::query(
            "INSERT INTO resources (resource_id, parent_id, ordering, resource_name, resource_type)
             VALUES (?, ?, ?, ?, 'folder')",
        )
        .bind(id)
        .bind(parent_id)
        .bind(ordering)
        .bind(format!("folder-{}", id))
        .execute(&self.pool())
        .await?;
        Ok(())
    }

    /// Insert `ids` as children of `parent_id`, numbered 1.. in the given order
    pub async fn children(&self, parent_id: Option<i64>, ids: &[i64]) -> Result<()> {
        for (i, id) in ids.iter().enumerate() {
            self.resource(*id, parent_id, i as i64 + 1).await?;
        }
        Ok(())
    }

    pub async fn owner(&self, resource_id: i64, user: Option<i64>, group: Option<i64>) -> Result<()> {
        sqlx::query(
            "UPDATE resources SET owner_user_id = ?, owner_group_id = ? WHERE resource_id = ?",
        )
        .bind(user)
        .bind(group)
        .bind(resource_id)
        .execute(&self.pool())
        .await?;
        Ok(())
    }

    pub async fn grant_user(&self, user_id: i64, resource_id: i64, perm_name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_resource_permissions (user_id, resource_id, perm_name) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(resource_id)
        .bind(perm_name)
        .execute(&self.pool())
        .await?;
        Ok(())
    }

    pub async fn grant_group(&self, group_id: i64, resource_id: i64, perm_name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO group_resource_permissions (group_id, resource_id, perm_name) VALUES (?, ?, ?)",
        )
        .bind(group_id)
        .bind(resource_id)
        .bind(perm_name)
        .execute(&self.pool())
        .await?;
        Ok(())
    }

    pub async fn get(&self, resource_id: i64) -> Result<Resource> {
        self.store()
            .get(resource_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("resource {} missing", resource_id))
    }

    pub async fn context(&self, user_id: i64) -> Result<UserContext> {
        self.store()
            .user_context(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {} missing", user_id))
    }

    /// Children of `parent_id` in ordering order
    pub async fn child_ids(&self, parent_id: Option<i64>) -> Result<Vec<i64>> {
        let children = self.store().children(parent_id).await?;
        Ok(children.into_iter().map(|r| r.resource_id).collect())
    }

    /// Sorted orderings of the children of `parent_id`
    pub async fn orderings(&self, parent_id: Option<i64>) -> Result<Vec<i64>> {
        let children = self.store().children(parent_id).await?;
        Ok(children.into_iter().map(|r| r.ordering).collect())
    }
}

/// `1..=n` as a vector, for contiguity checks
pub fn contiguous(n: usize) -> Vec<i64> {
    (1..=n as i64).collect()
}
