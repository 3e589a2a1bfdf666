//! Store contracts for permission data access.
//!
//! All operations are async. Implementations carry the transactional
//! guarantees called out on each method. Two concurrent `Replace` calls
//! on the same target are ordered by the store's transaction isolation
//! (last-committed-wins); this core adds no locking of its own.

use uuid::Uuid;

use crate::error::FrontdeskResult;
use crate::models::grant::{GrantSpec, LinkMode, PermissionGrant};
use crate::models::group::{CreateGroup, UpdateGroup, UserGroup};
use crate::models::permission::{CreatePermission, Permission, PermissionKey, UpdatePermission};
use crate::models::user::{CreateUser, DeleteOutcome, UpdateUser, User};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

/// Live references that block a permission's deletion.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissionUsage {
    pub group_links: u64,
    pub user_links: u64,
}

impl PermissionUsage {
    pub fn total(&self) -> u64 {
        self.group_links + self.user_links
    }
}

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

pub trait PermissionRepository: Send + Sync {
    fn create(
        &self,
        input: CreatePermission,
    ) -> impl Future<Output = FrontdeskResult<Permission>> + Send;

    /// Insert a batch in a single atomic statement, skipping keys that
    /// already exist. Returns the number actually created.
    fn create_many(
        &self,
        inputs: Vec<CreatePermission>,
    ) -> impl Future<Output = FrontdeskResult<u64>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FrontdeskResult<Permission>> + Send;

    fn get_by_key(
        &self,
        key: &PermissionKey,
    ) -> impl Future<Output = FrontdeskResult<Option<Permission>>> + Send;

    fn find_by_ids(
        &self,
        ids: &[Uuid],
    ) -> impl Future<Output = FrontdeskResult<Vec<Permission>>> + Send;

    fn find_by_keys(
        &self,
        keys: &[PermissionKey],
    ) -> impl Future<Output = FrontdeskResult<Vec<Permission>>> + Send;

    fn update(
        &self,
        id: Uuid,
        input: UpdatePermission,
    ) -> impl Future<Output = FrontdeskResult<Permission>> + Send;

    /// Fails with `Conflict` while any group or user link still
    /// references the permission; nothing is removed in that case.
    fn delete(&self, id: Uuid) -> impl Future<Output = FrontdeskResult<()>> + Send;

    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = FrontdeskResult<PaginatedResult<Permission>>> + Send;

    fn usage_count(&self, id: Uuid)
    -> impl Future<Output = FrontdeskResult<PermissionUsage>> + Send;
}

// ---------------------------------------------------------------------------
// User groups
// ---------------------------------------------------------------------------

pub trait GroupRepository: Send + Sync {
    fn create(&self, input: CreateGroup) -> impl Future<Output = FrontdeskResult<UserGroup>> + Send;

    /// Create a group and link its initial permission set inside one
    /// store transaction.
    fn create_with_permissions(
        &self,
        input: CreateGroup,
        grants: Vec<GrantSpec>,
    ) -> impl Future<Output = FrontdeskResult<UserGroup>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FrontdeskResult<UserGroup>> + Send;

    fn get_by_name(
        &self,
        name: &str,
    ) -> impl Future<Output = FrontdeskResult<Option<UserGroup>>> + Send;

    fn update(
        &self,
        id: Uuid,
        input: UpdateGroup,
    ) -> impl Future<Output = FrontdeskResult<UserGroup>> + Send;

    /// Fails with `Conflict` while any user still references the group.
    /// Group-permission join rows are removed with the group; users are
    /// never cascade-deleted.
    fn delete(&self, id: Uuid) -> impl Future<Output = FrontdeskResult<()>> + Send;

    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = FrontdeskResult<PaginatedResult<UserGroup>>> + Send;

    fn user_count(&self, id: Uuid) -> impl Future<Output = FrontdeskResult<u64>> + Send;

    /// The group's granted permissions, with their allow/deny flags.
    fn permissions(
        &self,
        group_id: Uuid,
    ) -> impl Future<Output = FrontdeskResult<Vec<PermissionGrant>>> + Send;

    /// Edit the group's permission links per [`LinkMode`]. Returns the
    /// number of links created or removed.
    fn link_permissions(
        &self,
        group_id: Uuid,
        grants: &[GrantSpec],
        mode: LinkMode,
    ) -> impl Future<Output = FrontdeskResult<u64>> + Send;
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = FrontdeskResult<User>> + Send;

    fn get_by_id(&self, id: Uuid) -> impl Future<Output = FrontdeskResult<User>> + Send;

    fn get_by_username(&self, username: &str)
    -> impl Future<Output = FrontdeskResult<User>> + Send;

    fn get_by_email(&self, email: &str) -> impl Future<Output = FrontdeskResult<User>> + Send;

    fn update(
        &self,
        id: Uuid,
        input: UpdateUser,
    ) -> impl Future<Output = FrontdeskResult<User>> + Send;

    /// Hard-deletes only when the user owns no historical records;
    /// otherwise deactivates the account and reports the downgrade.
    /// The user's permission-override rows go with a hard delete.
    fn delete(&self, id: Uuid) -> impl Future<Output = FrontdeskResult<DeleteOutcome>> + Send;

    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = FrontdeskResult<PaginatedResult<User>>> + Send;

    /// Number of historical records (bookings, created hotels/rooms)
    /// still owned by the user.
    fn owned_record_count(&self, id: Uuid) -> impl Future<Output = FrontdeskResult<u64>> + Send;

    /// The user's individual permission overrides.
    fn permissions(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = FrontdeskResult<Vec<PermissionGrant>>> + Send;

    /// Insert or update a single override row for the user.
    fn upsert_permission(
        &self,
        user_id: Uuid,
        grant: GrantSpec,
    ) -> impl Future<Output = FrontdeskResult<()>> + Send;

    /// Edit the user's override links per [`LinkMode`]. Returns the
    /// number of links created or removed.
    fn link_permissions(
        &self,
        user_id: Uuid,
        grants: &[GrantSpec],
        mode: LinkMode,
    ) -> impl Future<Output = FrontdeskResult<u64>> + Send;
}
