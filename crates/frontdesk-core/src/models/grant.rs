//! Grant and link-editing types shared by the store contracts.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::permission::Permission;

/// A permission attached to a group or a user, with its allow/deny flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub permission: Permission,
    pub is_allowed: bool,
}

/// One `(permission, is_allowed)` pair for a link-editing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantSpec {
    pub permission_id: Uuid,
    pub is_allowed: bool,
}

impl GrantSpec {
    pub fn allow(permission_id: Uuid) -> Self {
        Self {
            permission_id,
            is_allowed: true,
        }
    }

    pub fn deny(permission_id: Uuid) -> Self {
        Self {
            permission_id,
            is_allowed: false,
        }
    }
}

impl From<Uuid> for GrantSpec {
    fn from(permission_id: Uuid) -> Self {
        Self::allow(permission_id)
    }
}

/// Edit mode for bulk link operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkMode {
    /// Insert the given pairs; pairs that already exist are skipped.
    Add,
    /// Delete the given pairs; missing pairs are a no-op.
    Remove,
    /// Delete every existing pair for the target, then insert the given
    /// set, inside one store transaction.
    Replace,
}
