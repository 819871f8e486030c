//! Resource, principal and grant records

use serde::{Deserialize, Serialize};

/// Stable identity of a resource row
pub type ResourceId = i64;
/// Stable identity of a user
pub type UserId = i64;
/// Stable identity of a group
pub type GroupId = i64;

/// A protected object positioned in the resource forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Resource {
    pub resource_id: ResourceId,
    /// Parent resource, `None` for forest roots
    pub parent_id: Option<ResourceId>,
    /// 1-based position among the siblings sharing `parent_id`
    pub ordering: i64,
    pub resource_name: String,
    /// Opaque discriminator owned by the caller
    pub resource_type: String,
    pub owner_user_id: Option<UserId>,
    pub owner_group_id: Option<GroupId>,
}

impl Resource {
    /// Whether the given user owns this resource directly
    pub fn is_owned_by_user(&self, user_id: UserId) -> bool {
        self.owner_user_id == Some(user_id)
    }

    /// Whether this resource is owned by one of the given groups
    pub fn owning_group_in<'a>(&self, groups: &'a [Group]) -> Option<&'a Group> {
        let owner = self.owner_group_id?;
        groups.iter().find(|g| g.id == owner)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct Group {
    pub id: GroupId,
    pub group_name: String,
}

/// A user together with its loaded group memberships.
///
/// Permission resolution reads group objects from here instead of issuing a
/// lookup per grant row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserContext {
    pub user: User,
    pub groups: Vec<Group>,
}

impl UserContext {
    pub fn new(user: User, groups: Vec<Group>) -> Self {
        Self { user, groups }
    }

    pub fn id(&self) -> UserId {
        self.user.id
    }

    pub fn group_ids(&self) -> Vec<GroupId> {
        self.groups.iter().map(|g| g.id).collect()
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == id)
    }
}

/// A permission granted directly to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct UserResourcePermission {
    pub user_id: UserId,
    pub resource_id: ResourceId,
    pub perm_name: String,
}

/// A permission granted to every member of a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct GroupResourcePermission {
    pub perm_id: i64,
    pub group_id: GroupId,
    pub resource_id: ResourceId,
    pub perm_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(owner_user_id: Option<UserId>, owner_group_id: Option<GroupId>) -> Resource {
        Resource {
            resource_id: 1,
            parent_id: None,
            ordering: 1,
            resource_name: "docs".to_string(),
            resource_type: "folder".to_string(),
            owner_user_id,
            owner_group_id,
        }
    }

    #[test]
    fn test_user_ownership() {
        let r = resource(Some(7), None);
        assert!(r.is_owned_by_user(7));
        assert!(!r.is_owned_by_user(8));
        assert!(!resource(None, None).is_owned_by_user(7));
    }

    #[test]
    fn test_owning_group_lookup() {
        let groups = vec![
            Group {
                id: 1,
                group_name: "staff".to_string(),
            },
            Group {
                id: 2,
                group_name: "admins".to_string(),
            },
        ];
        let r = resource(None, Some(2));
        assert_eq!(r.owning_group_in(&groups).map(|g| g.id), Some(2));
        assert!(resource(None, Some(3)).owning_group_in(&groups).is_none());
        assert!(resource(None, None).owning_group_in(&groups).is_none());
    }

    #[test]
    fn test_user_context_groups() {
        let ctx = UserContext::new(
            User {
                id: 5,
                user_name: "alice".to_string(),
            },
            vec![Group {
                id: 9,
                group_name: "editors".to_string(),
            }],
        );
        assert_eq!(ctx.id(), 5);
        assert_eq!(ctx.group_ids(), vec![9]);
        assert_eq!(ctx.group(9).map(|g| g.group_name.as_str()), Some("editors"));
        assert!(ctx.group(1).is_none());
    }
}
