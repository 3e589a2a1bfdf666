//! Administrative operations over the permission store — guarded
//! deletes and validate-then-mutate link editing.

use std::collections::HashSet;

use frontdesk_core::error::{FrontdeskError, FrontdeskResult};
use frontdesk_core::models::grant::{GrantSpec, LinkMode};
use frontdesk_core::models::group::{CreateGroup, UpdateGroup, UserGroup, validate_group_name};
use frontdesk_core::models::permission::{CreatePermission, Permission, PermissionKey};
use frontdesk_core::models::user::DeleteOutcome;
use frontdesk_core::store::{GroupRepository, PermissionRepository, UserRepository};
use uuid::Uuid;

/// Administrative service over the three repositories.
///
/// Every mutating operation validates all referenced entities before
/// touching the store, so a failed call leaves no partial state behind.
pub struct AdminService<P, G, U>
where
    P: PermissionRepository,
    G: GroupRepository,
    U: UserRepository,
{
    permissions: P,
    groups: G,
    users: U,
}

impl<P, G, U> AdminService<P, G, U>
where
    P: PermissionRepository,
    G: GroupRepository,
    U: UserRepository,
{
    pub fn new(permissions: P, groups: G, users: U) -> Self {
        Self {
            permissions,
            groups,
            users,
        }
    }

    // -----------------------------------------------------------------
    // Permissions
    // -----------------------------------------------------------------

    /// Create a single permission after checking its key pattern and
    /// uniqueness.
    pub async fn create_permission(&self, input: CreatePermission) -> FrontdeskResult<Permission> {
        input.validate()?;

        if let Some(existing) = self.permissions.get_by_key(&input.key()).await? {
            return Err(FrontdeskError::Conflict {
                entity: "permission".into(),
                reason: format!("permission {} already exists", existing.key()),
                blocking: vec![existing.id.to_string()],
            });
        }

        self.permissions.create(input).await
    }

    /// Bulk-create permissions. The payload must not repeat a key, and
    /// none of the keys may already exist; either problem rejects the
    /// whole call before any row is written.
    pub async fn create_permissions(
        &self,
        inputs: Vec<CreatePermission>,
    ) -> FrontdeskResult<Vec<Permission>> {
        for input in &inputs {
            input.validate()?;
        }

        let keys: Vec<PermissionKey> = inputs.iter().map(CreatePermission::key).collect();
        reject_payload_duplicates(&keys)?;

        let existing = self.permissions.find_by_keys(&keys).await?;
        if !existing.is_empty() {
            return Err(FrontdeskError::Conflict {
                entity: "permission".into(),
                reason: "some permissions already exist".into(),
                blocking: existing.iter().map(|p| p.key().to_string()).collect(),
            });
        }

        self.permissions.create_many(inputs).await?;
        self.permissions.find_by_keys(&keys).await
    }

    /// Bulk-delete permissions. Every id must exist and be unreferenced;
    /// otherwise the call fails reporting the blockers and removes
    /// nothing.
    pub async fn delete_permissions(&self, ids: &[Uuid]) -> FrontdeskResult<u64> {
        let found = self.ensure_permissions_exist(ids).await?;

        let mut blocking = Vec::new();
        for permission in &found {
            let usage = self.permissions.usage_count(permission.id).await?;
            if usage.total() > 0 {
                blocking.push(format!(
                    "{} ({} group links, {} user links)",
                    permission.key(),
                    usage.group_links,
                    usage.user_links
                ));
            }
        }
        if !blocking.is_empty() {
            return Err(FrontdeskError::Conflict {
                entity: "permission".into(),
                reason: "permissions are still referenced by groups or users".into(),
                blocking,
            });
        }

        for permission in &found {
            self.permissions.delete(permission.id).await?;
        }
        Ok(found.len() as u64)
    }

    // -----------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------

    /// Create a group after checking name length and uniqueness.
    pub async fn create_group(&self, input: CreateGroup) -> FrontdeskResult<UserGroup> {
        input.validate()?;

        if let Some(existing) = self.groups.get_by_name(&input.name).await? {
            return Err(FrontdeskError::Conflict {
                entity: "user_group".into(),
                reason: format!("group name {:?} already exists", input.name),
                blocking: vec![existing.id.to_string()],
            });
        }

        self.groups.create(input).await
    }

    pub async fn update_group(&self, id: Uuid, input: UpdateGroup) -> FrontdeskResult<UserGroup> {
        if let Some(name) = &input.name {
            validate_group_name(name)?;
            if let Some(existing) = self.groups.get_by_name(name).await?
                && existing.id != id
            {
                return Err(FrontdeskError::Conflict {
                    entity: "user_group".into(),
                    reason: format!("group name {name:?} already exists"),
                    blocking: vec![existing.id.to_string()],
                });
            }
        }
        self.groups.update(id, input).await
    }

    /// Delete a group; fails while users still reference it. Users are
    /// reassigned or deactivated by the caller first, never cascaded.
    pub async fn delete_group(&self, id: Uuid) -> FrontdeskResult<()> {
        let group = self.groups.get_by_id(id).await?;
        let members = self.groups.user_count(id).await?;
        if members > 0 {
            return Err(FrontdeskError::Conflict {
                entity: "user_group".into(),
                reason: format!("group {:?} still has {members} member(s)", group.name),
                blocking: vec![group.id.to_string()],
            });
        }
        self.groups.delete(id).await
    }

    /// Edit a group's permission links. The group and every referenced
    /// permission must exist before anything is mutated.
    pub async fn set_group_permissions(
        &self,
        group_id: Uuid,
        grants: &[GrantSpec],
        mode: LinkMode,
    ) -> FrontdeskResult<u64> {
        self.groups.get_by_id(group_id).await?;
        let ids: Vec<Uuid> = grants.iter().map(|g| g.permission_id).collect();
        self.ensure_permissions_exist(&ids).await?;
        self.groups.link_permissions(group_id, grants, mode).await
    }

    // -----------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------

    /// Edit a user's override links. The user and every referenced
    /// permission must exist before anything is mutated.
    pub async fn set_user_permissions(
        &self,
        user_id: Uuid,
        grants: &[GrantSpec],
        mode: LinkMode,
    ) -> FrontdeskResult<u64> {
        self.users.get_by_id(user_id).await?;
        let ids: Vec<Uuid> = grants.iter().map(|g| g.permission_id).collect();
        self.ensure_permissions_exist(&ids).await?;
        self.users.link_permissions(user_id, grants, mode).await
    }

    /// Insert or update a single override row for the user.
    pub async fn set_user_permission(&self, user_id: Uuid, grant: GrantSpec) -> FrontdeskResult<()> {
        self.users.get_by_id(user_id).await?;
        self.ensure_permissions_exist(&[grant.permission_id]).await?;
        self.users.upsert_permission(user_id, grant).await
    }

    /// Delete a user, downgrading to deactivation while historical
    /// records still reference them. The outcome says which happened.
    pub async fn delete_user(&self, id: Uuid) -> FrontdeskResult<DeleteOutcome> {
        self.users.get_by_id(id).await?;
        self.users.delete(id).await
    }

    // -----------------------------------------------------------------

    /// Resolve every id, failing with `NotFound` that lists the missing
    /// ones if any are absent.
    async fn ensure_permissions_exist(&self, ids: &[Uuid]) -> FrontdeskResult<Vec<Permission>> {
        let unique: HashSet<Uuid> = ids.iter().copied().collect();
        let found = self.permissions.find_by_ids(ids).await?;
        if found.len() != unique.len() {
            let found_ids: HashSet<Uuid> = found.iter().map(|p| p.id).collect();
            let mut missing: Vec<String> = unique
                .iter()
                .filter(|id| !found_ids.contains(id))
                .map(Uuid::to_string)
                .collect();
            missing.sort();
            return Err(FrontdeskError::NotFound {
                entity: "permission".into(),
                id: missing.join(", "),
            });
        }
        Ok(found)
    }
}

/// Reject a payload that names the same `(module, action)` twice.
fn reject_payload_duplicates(keys: &[PermissionKey]) -> FrontdeskResult<()> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = keys
        .iter()
        .filter(|key| !seen.insert((*key).clone()))
        .map(PermissionKey::to_string)
        .collect();
    if !duplicates.is_empty() {
        duplicates.sort();
        duplicates.dedup();
        return Err(FrontdeskError::Validation {
            message: format!("duplicate permissions in payload: {}", duplicates.join(", ")),
        });
    }
    Ok(())
}
