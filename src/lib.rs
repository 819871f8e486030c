//! canopy - resource authorization and tree engine
//!
//! Resolves what a user may do on a resource (direct, group and ownership
//! grants) and restructures the resource forest under concurrent access while
//! keeping sibling orderings contiguous and parent links acyclic.

pub mod config;
pub mod db;
pub mod error;
pub mod permissions;
pub mod resources;
pub mod tree;

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

pub use config::Config;
pub use error::{TreeError, TreeErrorKind};
use db::Database;
use permissions::PermissionResolver;
use tree::{TreeMutator, TreeNavigator};

/// The engine instance: a database plus the components working on it
pub struct Engine {
    config: Config,
    db: Arc<Database>,
}

impl Engine {
    /// Open the configured database and apply migrations
    pub async fn new(config: Config) -> Result<Self> {
        let db = Database::connect(&config.database).await?;
        db.health_check().await?;
        info!(
            "canopy engine ready ({})",
            config.database.path.as_deref().unwrap_or("in-memory")
        );

        Ok(Self {
            config,
            db: Arc::new(db),
        })
    }

    /// Get the database handle
    pub fn db(&self) -> Arc<Database> {
        self.db.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> PermissionResolver {
        PermissionResolver::new(self.db.pool().clone())
    }

    pub fn navigator(&self) -> TreeNavigator {
        TreeNavigator::new(self.db.pool().clone())
            .with_default_depth(self.config.tree.max_depth)
    }

    pub fn mutator(&self) -> TreeMutator {
        TreeMutator::new(self.db.pool().clone())
            .with_old_branch_shift(self.config.tree.old_branch_shift)
    }
}
