//! Read-only resolution of grants into permission tuples

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use super::{GrantType, Permission, PermissionQuery, PermissionTuple};
use crate::resources::{
    Group, GroupId, GroupResourcePermission, Resource, ResourceId, ResourceStore, User,
    UserContext, UserId, UserResourcePermission,
};

/// Narrowing options for principal queries
#[derive(Debug, Clone, Default)]
pub struct PrincipalFilter {
    /// Only these users (direct grants, and members of expanded group grants).
    /// An empty list matches nobody.
    pub user_ids: Option<Vec<UserId>>,
    /// Only grants held by these groups
    pub group_ids: Option<Vec<GroupId>>,
    /// Return one member-less tuple per group grant instead of one per member
    pub limit_group_expansion: bool,
    /// Leave group-sourced grants out entirely
    pub skip_group_grants: bool,
}

impl PrincipalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(mut self, ids: impl Into<Vec<UserId>>) -> Self {
        self.user_ids = Some(ids.into());
        self
    }

    pub fn groups(mut self, ids: impl Into<Vec<GroupId>>) -> Self {
        self.group_ids = Some(ids.into());
        self
    }

    pub fn limit_group_expansion(mut self, limit: bool) -> Self {
        self.limit_group_expansion = limit;
        self
    }

    pub fn skip_group_grants(mut self, skip: bool) -> Self {
        self.skip_group_grants = skip;
        self
    }
}

/// Grant row across principals, group side possibly expanded to members
#[derive(sqlx::FromRow)]
struct PrincipalGrantRow {
    user_id: Option<i64>,
    user_name: Option<String>,
    group_id: Option<i64>,
    group_name: Option<String>,
    perm_name: String,
    grant_type: String,
}

impl PrincipalGrantRow {
    fn into_tuple(self, resource: &Resource) -> PermissionTuple {
        let user = match (self.user_id, self.user_name) {
            (Some(id), Some(user_name)) => Some(User { id, user_name }),
            _ => None,
        };
        let group = match (self.group_id, self.group_name) {
            (Some(id), Some(group_name)) => Some(Group { id, group_name }),
            _ => None,
        };
        let perm_name = Permission::from(self.perm_name);

        match (parse_grant_type(&self.grant_type), group, user) {
            (GrantType::Group, Some(group), user) => {
                PermissionTuple::group_grant(user, perm_name, group, resource)
            }
            (_, _, Some(user)) => PermissionTuple::user_grant(user, perm_name, resource),
            (grant_type, group, None) => PermissionTuple {
                user: None,
                perm_name,
                grant_type,
                group,
                resource: resource.clone(),
                owner: false,
                direct: true,
            },
        }
    }
}

fn parse_grant_type(s: &str) -> GrantType {
    if s == "group" {
        GrantType::Group
    } else {
        GrantType::User
    }
}

/// Append `(id, id, ...)` with every id bound
fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    qb.push("(");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

/// Computes effective permissions from direct, group and ownership grants
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    pool: SqlitePool,
    store: ResourceStore,
}

impl PermissionResolver {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            store: ResourceStore::new(pool.clone()),
            pool,
        }
    }

    /// Every permission the user holds on the resource: direct grants, grants
    /// inherited from its groups, and ownership by the user or one of its groups
    pub async fn resolve_permissions(
        &self,
        resource: &Resource,
        user: &UserContext,
    ) -> Result<Vec<PermissionTuple>, sqlx::Error> {
        let mut perms = self.user_grants(resource, user, true, true).await?;

        if resource.is_owned_by_user(user.id()) {
            perms.push(PermissionTuple::user_ownership(user.user.clone(), resource));
        }
        if let Some(group) = resource.owning_group_in(&user.groups) {
            perms.push(PermissionTuple::group_ownership(
                Some(user.user.clone()),
                group.clone(),
                resource,
            ));
        }

        debug!(
            "Resolved {} permissions for user {} on resource {}",
            perms.len(),
            user.id(),
            resource.resource_id
        );
        Ok(perms)
    }

    /// Permissions held directly, without anything inherited from groups
    pub async fn resolve_direct_permissions(
        &self,
        resource: &Resource,
        user: &UserContext,
    ) -> Result<Vec<PermissionTuple>, sqlx::Error> {
        let mut perms = self.user_grants(resource, user, true, false).await?;

        if resource.is_owned_by_user(user.id()) {
            perms.push(PermissionTuple::user_ownership(user.user.clone(), resource));
        }
        Ok(perms)
    }

    /// Permissions inherited from the user's groups only
    pub async fn resolve_group_permissions(
        &self,
        resource: &Resource,
        user: &UserContext,
    ) -> Result<Vec<PermissionTuple>, sqlx::Error> {
        let mut perms = self.user_grants(resource, user, false, true).await?;

        if let Some(group) = resource.owning_group_in(&user.groups) {
            perms.push(PermissionTuple::group_ownership(
                Some(user.user.clone()),
                group.clone(),
                resource,
            ));
        }
        Ok(perms)
    }

    /// Check whether the user holds `perm_name` (or ALL_PERMISSIONS) on the resource
    pub async fn has_permission(
        &self,
        resource: &Resource,
        user: &UserContext,
        perm_name: &str,
    ) -> Result<bool, sqlx::Error> {
        let perms = self.resolve_permissions(resource, user).await?;
        Ok(perms.iter().any(|p| p.perm_name.covers(perm_name)))
    }

    /// Every principal holding `perm` on the resource, plus the resource owner.
    ///
    /// The owner is appended regardless of the id filters: the owning user as
    /// one tuple, the owning group as one tuple per member (or a single
    /// member-less tuple when expansion is limited) unless group grants are
    /// skipped.
    pub async fn principals_with_permission(
        &self,
        resource: &Resource,
        perm: &PermissionQuery,
        filter: &PrincipalFilter,
    ) -> Result<Vec<PermissionTuple>, sqlx::Error> {
        let mut perms = self.principal_grants(resource, perm, filter, true).await?;

        if let Some(owner_id) = resource.owner_user_id {
            if let Some(owner) = self.store.user(owner_id).await? {
                perms.push(PermissionTuple::user_ownership(owner, resource));
            }
        }
        if !filter.skip_group_grants {
            self.push_group_owner(resource, filter.limit_group_expansion, &mut perms)
                .await?;
        }

        debug!(
            "Found {} principal grants for {:?} on resource {}",
            perms.len(),
            perm,
            resource.resource_id
        );
        Ok(perms)
    }

    /// Group counterpart of `principals_with_permission`: never includes
    /// grants made to users directly
    pub async fn groups_with_permission(
        &self,
        resource: &Resource,
        perm: &PermissionQuery,
        group_ids: Option<&[GroupId]>,
        limit_group_expansion: bool,
    ) -> Result<Vec<PermissionTuple>, sqlx::Error> {
        let filter = PrincipalFilter {
            user_ids: None,
            group_ids: group_ids.map(<[GroupId]>::to_vec),
            limit_group_expansion,
            skip_group_grants: false,
        };
        let mut perms = self.principal_grants(resource, perm, &filter, false).await?;
        self.push_group_owner(resource, limit_group_expansion, &mut perms)
            .await?;
        Ok(perms)
    }

    /// Exact lookup of one group grant
    pub async fn group_permission(
        &self,
        resource_id: ResourceId,
        group_id: GroupId,
        perm_name: &str,
    ) -> Result<Option<GroupResourcePermission>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT perm_id, group_id, resource_id, perm_name
            FROM group_resource_permissions
            WHERE resource_id = ? AND group_id = ? AND perm_name = ?
            "#,
        )
        .bind(resource_id)
        .bind(group_id)
        .bind(perm_name)
        .fetch_optional(&self.pool)
        .await
    }

    /// Stored grants for one user, direct and/or through its groups
    async fn user_grants(
        &self,
        resource: &Resource,
        user: &UserContext,
        direct: bool,
        via_groups: bool,
    ) -> Result<Vec<PermissionTuple>, sqlx::Error> {
        let mut perms = Vec::new();

        if direct {
            let rows: Vec<UserResourcePermission> = sqlx::query_as(
                r#"
                SELECT user_id, resource_id, perm_name
                FROM user_resource_permissions
                WHERE user_id = ? AND resource_id = ?
                ORDER BY perm_name
                "#,
            )
            .bind(user.id())
            .bind(resource.resource_id)
            .fetch_all(&self.pool)
            .await?;

            perms.extend(rows.into_iter().map(|row| {
                PermissionTuple::user_grant(user.user.clone(), row.perm_name.into(), resource)
            }));
        }

        let group_ids = user.group_ids();
        if via_groups && !group_ids.is_empty() {
            let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
                "SELECT perm_id, group_id, resource_id, perm_name \
                 FROM group_resource_permissions WHERE resource_id = ",
            );
            qb.push_bind(resource.resource_id);
            qb.push(" AND group_id IN ");
            push_id_list(&mut qb, &group_ids);
            qb.push(" ORDER BY group_id, perm_name");

            let rows: Vec<GroupResourcePermission> =
                qb.build_query_as().fetch_all(&self.pool).await?;

            perms.extend(rows.into_iter().filter_map(|row| {
                user.group(row.group_id).map(|group| {
                    PermissionTuple::group_grant(
                        Some(user.user.clone()),
                        row.perm_name.into(),
                        group.clone(),
                        resource,
                    )
                })
            }));
        }

        Ok(perms)
    }

    /// Stored grants across principals matching `perm` and `filter`
    async fn principal_grants(
        &self,
        resource: &Resource,
        perm: &PermissionQuery,
        filter: &PrincipalFilter,
        include_user_grants: bool,
    ) -> Result<Vec<PermissionTuple>, sqlx::Error> {
        let include_group_grants = !filter.skip_group_grants;
        if !include_user_grants && !include_group_grants {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new("");
        if include_group_grants {
            if filter.limit_group_expansion {
                qb.push(
                    "SELECT NULL AS user_id, NULL AS user_name, g.id AS group_id, \
                     g.group_name AS group_name, p.perm_name AS perm_name, 'group' AS grant_type \
                     FROM group_resource_permissions p \
                     JOIN principal_groups g ON g.id = p.group_id \
                     WHERE p.resource_id = ",
                );
            } else {
                qb.push(
                    "SELECT u.id AS user_id, u.user_name AS user_name, g.id AS group_id, \
                     g.group_name AS group_name, p.perm_name AS perm_name, 'group' AS grant_type \
                     FROM group_resource_permissions p \
                     JOIN principal_groups g ON g.id = p.group_id \
                     JOIN group_members m ON m.group_id = p.group_id \
                     JOIN users u ON u.id = m.user_id \
                     WHERE p.resource_id = ",
                );
            }
            qb.push_bind(resource.resource_id);
            if let Some(name) = perm.name() {
                qb.push(" AND p.perm_name = ");
                qb.push_bind(name.to_string());
            }
            if let Some(ids) = &filter.group_ids {
                qb.push(" AND p.group_id IN ");
                push_id_list(&mut qb, ids);
            }
            if let (Some(ids), false) = (&filter.user_ids, filter.limit_group_expansion) {
                qb.push(" AND m.user_id IN ");
                push_id_list(&mut qb, ids);
            }
        }

        if include_user_grants {
            if include_group_grants {
                qb.push(" UNION ");
            }
            qb.push(
                "SELECT u.id AS user_id, u.user_name AS user_name, NULL AS group_id, \
                 NULL AS group_name, p.perm_name AS perm_name, 'user' AS grant_type \
                 FROM user_resource_permissions p \
                 JOIN users u ON u.id = p.user_id \
                 WHERE p.resource_id = ",
            );
            qb.push_bind(resource.resource_id);
            if let Some(name) = perm.name() {
                qb.push(" AND p.perm_name = ");
                qb.push_bind(name.to_string());
            }
            if let Some(ids) = &filter.user_ids {
                qb.push(" AND p.user_id IN ");
                push_id_list(&mut qb, ids);
            }
        }
        qb.push(" ORDER BY grant_type DESC, user_id, group_id, perm_name");

        let rows: Vec<PrincipalGrantRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        Ok(rows.into_iter().map(|row| row.into_tuple(resource)).collect())
    }

    /// ALL_PERMISSIONS tuples for the resource's owning group
    async fn push_group_owner(
        &self,
        resource: &Resource,
        limit_group_expansion: bool,
        perms: &mut Vec<PermissionTuple>,
    ) -> Result<(), sqlx::Error> {
        let Some(group_id) = resource.owner_group_id else {
            return Ok(());
        };
        let Some(group) = self.store.group(group_id).await? else {
            return Ok(());
        };

        if limit_group_expansion {
            perms.push(PermissionTuple::group_ownership(None, group, resource));
        } else {
            for member in self.store.group_members(group_id).await? {
                perms.push(PermissionTuple::group_ownership(
                    Some(member),
                    group.clone(),
                    resource,
                ));
            }
        }
        Ok(())
    }
}
