//! canopy - inspect permissions and restructure the resource tree

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use canopy::permissions::{PermissionQuery, PrincipalFilter, ANY_PERMISSION};
use canopy::resources::{ResourceStore, UserContext};
use canopy::tree::{build_subtree_struct, ParentChange, SubtreeAnchor};
use canopy::{Config, Engine};

/// Resource authorization and tree engine
#[derive(Parser, Debug)]
#[command(name = "canopy", version, about = "Inspect and restructure a canopy database")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides configuration)
    #[arg(short, long)]
    database: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a subtree, nested or as a flat pre-order listing
    Tree {
        /// Start at this resource
        #[arg(long, conflicts_with = "parent")]
        resource: Option<i64>,
        /// Start at the children of this parent (forest roots when neither is given)
        #[arg(long)]
        parent: Option<i64>,
        #[arg(long)]
        depth: Option<u32>,
        /// Print rows with depth, sort key and path instead of nesting
        #[arg(long)]
        flat: bool,
    },
    /// Print the path from a resource up to its root
    Path {
        resource: i64,
        #[arg(long)]
        depth: Option<u32>,
    },
    /// Resolve a user's permissions on a resource
    Perms {
        resource: i64,
        user: i64,
        #[arg(long, value_enum, default_value_t = Scope::All)]
        scope: Scope,
    },
    /// List principals holding a permission on a resource
    Who {
        resource: i64,
        #[arg(long, default_value = ANY_PERMISSION)]
        perm: String,
        #[arg(long = "user")]
        users: Vec<i64>,
        #[arg(long = "group")]
        groups: Vec<i64>,
        #[arg(long)]
        limit_group_expansion: bool,
        #[arg(long, conflicts_with = "groups_only")]
        skip_group_grants: bool,
        /// Only grants held through groups
        #[arg(long)]
        groups_only: bool,
    },
    /// Move a resource to a new position, optionally under a new parent
    Move {
        resource: i64,
        position: i64,
        #[arg(long, conflicts_with = "root")]
        parent: Option<i64>,
        /// Move to the forest root
        #[arg(long)]
        root: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Scope {
    All,
    Direct,
    Group,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "canopy=info".into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(path) = args.database {
        config.database.path = Some(path);
    }

    let engine = Engine::new(config).await?;
    let store = ResourceStore::new(engine.db().pool().clone());

    match args.command {
        Command::Tree {
            resource,
            parent,
            depth,
            flat,
        } => {
            let anchor = match resource {
                Some(id) => SubtreeAnchor::Resource(id),
                None => SubtreeAnchor::Parent(parent),
            };
            let rows = engine.navigator().subtree(anchor, depth).await?;
            if flat {
                print_json(&rows)?;
            } else {
                print_json(&build_subtree_struct(rows))?;
            }
        }
        Command::Path { resource, depth } => {
            let path = engine.navigator().ancestor_path(resource, depth).await?;
            print_json(&path)?;
        }
        Command::Perms {
            resource,
            user,
            scope,
        } => {
            let resource = store
                .get(resource)
                .await?
                .ok_or_else(|| anyhow!("resource {} not found", resource))?;
            let user: UserContext = store
                .user_context(user)
                .await?
                .ok_or_else(|| anyhow!("user {} not found", user))?;

            let resolver = engine.resolver();
            let perms = match scope {
                Scope::All => resolver.resolve_permissions(&resource, &user).await?,
                Scope::Direct => resolver.resolve_direct_permissions(&resource, &user).await?,
                Scope::Group => resolver.resolve_group_permissions(&resource, &user).await?,
            };
            print_json(&perms)?;
        }
        Command::Who {
            resource,
            perm,
            users,
            groups,
            limit_group_expansion,
            skip_group_grants,
            groups_only,
        } => {
            let resource = store
                .get(resource)
                .await?
                .ok_or_else(|| anyhow!("resource {} not found", resource))?;
            let perm = PermissionQuery::from(perm.as_str());
            let group_ids = (!groups.is_empty()).then_some(groups);

            let resolver = engine.resolver();
            let perms = if groups_only {
                resolver
                    .groups_with_permission(
                        &resource,
                        &perm,
                        group_ids.as_deref(),
                        limit_group_expansion,
                    )
                    .await?
            } else {
                let filter = PrincipalFilter {
                    user_ids: (!users.is_empty()).then_some(users),
                    group_ids,
                    limit_group_expansion,
                    skip_group_grants,
                };
                resolver
                    .principals_with_permission(&resource, &perm, &filter)
                    .await?
            };
            print_json(&perms)?;
        }
        Command::Move {
            resource,
            position,
            parent,
            root,
        } => {
            let parent_change = match (parent, root) {
                (Some(id), _) => ParentChange::SetTo(Some(id)),
                (None, true) => ParentChange::SetTo(None),
                (None, false) => ParentChange::Unchanged,
            };
            let moved = engine
                .mutator()
                .move_to_position(resource, position, parent_change)
                .await?;
            print_json(&moved)?;
        }
    }

    Ok(())
}
