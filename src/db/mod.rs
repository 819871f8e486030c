//! Database module - SQLite pool and the resource/permission schema

#[cfg(test)]
pub mod test_utils;

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::config::DatabaseConfig;

/// Database handle wrapping SQLite connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection with default settings.
    /// If path is None, uses in-memory database (for testing)
    pub async fn new(path: Option<&str>) -> Result<Self> {
        let config = DatabaseConfig {
            path: path.map(str::to_string),
            ..DatabaseConfig::default()
        };
        Self::connect(&config).await
    }

    /// Open (or create) the database described by `config` and apply migrations
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let conn_str = match config.path.as_deref() {
            Some(p) => format!("sqlite:{}?mode=rwc", p),
            None => "sqlite::memory:".to_string(),
        };

        let options = SqliteConnectOptions::from_str(&conn_str)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .foreign_keys(true);

        // In-memory databases share one cache across connections and fail fast
        // on table locks instead of waiting, so they get a single connection.
        let max_connections = if config.path.is_some() {
            config.max_connections.max(1)
        } else {
            1
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        // Principals
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                user_name TEXT UNIQUE NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS principal_groups (
                id INTEGER PRIMARY KEY,
                group_name TEXT UNIQUE NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS group_members (
                group_id INTEGER NOT NULL REFERENCES principal_groups(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (group_id, user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Resource forest. No unique (parent_id, ordering) index: SQLite checks
        // uniqueness row by row, which bulk ordering shifts would trip over.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS resources (
                resource_id INTEGER PRIMARY KEY,
                parent_id INTEGER REFERENCES resources(resource_id) ON DELETE CASCADE,
                ordering INTEGER NOT NULL DEFAULT 1 CHECK (ordering >= 1),
                resource_name TEXT NOT NULL,
                resource_type TEXT NOT NULL,
                owner_user_id INTEGER REFERENCES users(id) ON DELETE SET NULL,
                owner_group_id INTEGER REFERENCES principal_groups(id) ON DELETE SET NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Grants
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_resource_permissions (
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                resource_id INTEGER NOT NULL REFERENCES resources(resource_id) ON DELETE CASCADE,
                perm_name TEXT NOT NULL,
                PRIMARY KEY (user_id, resource_id, perm_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS group_resource_permissions (
                perm_id INTEGER PRIMARY KEY,
                group_id INTEGER NOT NULL REFERENCES principal_groups(id) ON DELETE CASCADE,
                resource_id INTEGER NOT NULL REFERENCES resources(resource_id) ON DELETE CASCADE,
                perm_name TEXT NOT NULL,
                UNIQUE (group_id, resource_id, perm_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create indexes
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_resources_parent ON resources(parent_id, ordering)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_user_perms_resource ON user_resource_permissions(resource_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_group_perms_resource ON group_resource_permissions(resource_id)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_group_members_user ON group_members(user_id)")
            .execute(&self.pool)
            .await?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check if database is healthy
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
