//! Permission resolution for resources
//!
//! A user holds a permission on a resource when any of these apply:
//! 1. Direct grant: a `user_resource_permissions` row for the user
//! 2. Group grant: a `group_resource_permissions` row for a group the user belongs to
//! 3. User ownership: `resource.owner_user_id == user.id` → ALL_PERMISSIONS
//! 4. Group ownership: `resource.owner_group_id` is one of the user's groups → ALL_PERMISSIONS
//!
//! Ownership is never stored as a grant row; it is recomputed from the
//! resource on every resolution.

mod resolver;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resources::{Group, Resource, User};

pub use resolver::{PermissionResolver, PrincipalFilter};

/// Sentinel permission name carried by ownership grants
pub const ALL_PERMISSIONS: &str = "__all_permissions__";

/// Wildcard accepted by principal queries to match any permission name
pub const ANY_PERMISSION: &str = "__any_permission__";

/// Permission carried by a resolved grant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Permission {
    /// Every permission, granted through ownership
    All,
    Named(String),
}

impl Permission {
    /// Check if this grant covers the given permission name
    pub fn covers(&self, perm_name: &str) -> bool {
        match self {
            Permission::All => true,
            Permission::Named(name) => name == perm_name,
        }
    }
}

impl From<String> for Permission {
    fn from(s: String) -> Self {
        if s == ALL_PERMISSIONS {
            Permission::All
        } else {
            Permission::Named(s)
        }
    }
}

impl From<&str> for Permission {
    fn from(s: &str) -> Self {
        Permission::from(s.to_string())
    }
}

impl From<Permission> for String {
    fn from(p: Permission) -> Self {
        match p {
            Permission::All => ALL_PERMISSIONS.to_string(),
            Permission::Named(name) => name,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::All => f.write_str(ALL_PERMISSIONS),
            Permission::Named(name) => f.write_str(name),
        }
    }
}

/// Permission name a principal query matches against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionQuery {
    /// Any permission at all
    Any,
    Named(String),
}

impl PermissionQuery {
    /// The name to filter on, `None` when every name matches
    pub fn name(&self) -> Option<&str> {
        match self {
            PermissionQuery::Any => None,
            PermissionQuery::Named(name) => Some(name),
        }
    }
}

impl From<&str> for PermissionQuery {
    fn from(s: &str) -> Self {
        match s {
            ANY_PERMISSION | "any" => PermissionQuery::Any,
            name => PermissionQuery::Named(name.to_string()),
        }
    }
}

/// How a grant reached the principal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrantType {
    User,
    Group,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::User => "user",
            GrantType::Group => "group",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resolved grant: who holds what on which resource, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionTuple {
    /// Holder of the grant. `None` only for group grants returned with
    /// member expansion suppressed.
    pub user: Option<User>,
    pub perm_name: Permission,
    #[serde(rename = "type")]
    pub grant_type: GrantType,
    /// Group the grant was inherited through, for `GrantType::Group`
    pub group: Option<Group>,
    pub resource: Resource,
    /// Synthesized from `owner_user_id`/`owner_group_id`
    pub owner: bool,
    /// Attached to this resource itself rather than to an ancestor
    pub direct: bool,
}

impl PermissionTuple {
    pub fn user_grant(user: User, perm_name: Permission, resource: &Resource) -> Self {
        Self {
            user: Some(user),
            perm_name,
            grant_type: GrantType::User,
            group: None,
            resource: resource.clone(),
            owner: false,
            direct: true,
        }
    }

    pub fn group_grant(
        user: Option<User>,
        perm_name: Permission,
        group: Group,
        resource: &Resource,
    ) -> Self {
        Self {
            user,
            perm_name,
            grant_type: GrantType::Group,
            group: Some(group),
            resource: resource.clone(),
            owner: false,
            direct: true,
        }
    }

    /// ALL_PERMISSIONS grant from owning the resource directly
    pub fn user_ownership(user: User, resource: &Resource) -> Self {
        Self {
            owner: true,
            ..Self::user_grant(user, Permission::All, resource)
        }
    }

    /// ALL_PERMISSIONS grant from membership in the owning group
    pub fn group_ownership(user: Option<User>, group: Group, resource: &Resource) -> Self {
        Self {
            owner: true,
            ..Self::group_grant(user, Permission::All, group, resource)
        }
    }
}
