//! Engine configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file, then
//! `CANOPY_`-prefixed environment variables (`__` separates nested keys, e.g.
//! `CANOPY_DATABASE__PATH=/var/lib/canopy.db`).

use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::tree::OldBranchShift;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "CANOPY_";

/// Default busy timeout while waiting for another writer's lock
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Default connection pool size for file-backed databases
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub tree: TreeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; `None` = in-memory
    pub path: Option<String>,
    pub max_connections: u32,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Renumbering of the old branch on cross-branch moves
    pub old_branch_shift: OldBranchShift,
    /// Depth limit for subtree listings and ancestor paths when the caller
    /// gives none
    pub max_depth: Option<u32>,
}

impl Config {
    /// Figment with defaults, the optional TOML file and the environment
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load configuration from all layers
    pub fn load(file: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(file).extract()
    }
}
