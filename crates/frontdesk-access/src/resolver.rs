//! Effective-permission resolution — the two-tier group + override
//! merge.
//!
//! The merge itself is a pure function over two grant lists so it can
//! be tested without any storage behind it; [`PermissionResolver`]
//! wires it to the repository traits.

use std::collections::BTreeMap;

use frontdesk_core::error::{FrontdeskError, FrontdeskResult};
use frontdesk_core::models::grant::PermissionGrant;
use frontdesk_core::models::permission::{Permission, PermissionKey};
use frontdesk_core::store::{GroupRepository, UserRepository};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which layer an effective permission came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionSource {
    Group,
    User,
}

/// One entry of an actor's merged allow/deny table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectivePermission {
    pub permission: Permission,
    pub is_allowed: bool,
    pub source: PermissionSource,
}

/// The merged allow/deny table for one actor.
///
/// Lookups are fail-closed: a key absent from both layers is denied.
/// Callers may hold the set for the duration of a single request; it
/// must not be reused across requests, since stale grants are a
/// security defect.
#[derive(Debug, Clone, Default)]
pub struct EffectiveSet {
    entries: BTreeMap<PermissionKey, EffectivePermission>,
}

impl EffectiveSet {
    pub fn allows(&self, key: &PermissionKey) -> bool {
        self.entries.get(key).map(|e| e.is_allowed).unwrap_or(false)
    }

    /// True iff at least one of the keys is allowed.
    pub fn allows_any<'a, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a PermissionKey>,
    {
        keys.into_iter().any(|key| self.allows(key))
    }

    /// True iff every key is allowed.
    pub fn allows_all<'a, I>(&self, keys: I) -> bool
    where
        I: IntoIterator<Item = &'a PermissionKey>,
    {
        keys.into_iter().all(|key| self.allows(key))
    }

    pub fn get(&self, key: &PermissionKey) -> Option<&EffectivePermission> {
        self.entries.get(key)
    }

    /// Entries in `(module, action)` order.
    pub fn iter(&self) -> impl Iterator<Item = &EffectivePermission> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build an actor's effective set from its group layer and user layer.
///
/// Group grants are inserted first; user grants then overwrite the same
/// key unconditionally. Precedence is structural, not value-compared: a
/// user-level deny suppresses a group-level allow, and a user-level
/// allow grants something the group denies or never mentions.
pub fn merge_grants(group: Vec<PermissionGrant>, user: Vec<PermissionGrant>) -> EffectiveSet {
    let mut entries = BTreeMap::new();
    for grant in group {
        let key = grant.permission.key();
        entries.insert(
            key,
            EffectivePermission {
                permission: grant.permission,
                is_allowed: grant.is_allowed,
                source: PermissionSource::Group,
            },
        );
    }
    for grant in user {
        let key = grant.permission.key();
        entries.insert(
            key,
            EffectivePermission {
                permission: grant.permission,
                is_allowed: grant.is_allowed,
                source: PermissionSource::User,
            },
        );
    }
    EffectiveSet { entries }
}

/// Resolves actors' effective permissions from the store.
///
/// Generic over repository implementations so the resolution layer has
/// no dependency on the database crate. Purely read-driven; no state is
/// kept between calls.
pub struct PermissionResolver<U: UserRepository, G: GroupRepository> {
    users: U,
    groups: G,
}

impl<U: UserRepository, G: GroupRepository> PermissionResolver<U, G> {
    pub fn new(users: U, groups: G) -> Self {
        Self { users, groups }
    }

    /// Compute the actor's merged allow/deny table.
    ///
    /// Fails with `NotFound` if the actor does not exist. An inactive,
    /// unassigned, or dangling group contributes no grants.
    pub async fn effective_permissions(&self, actor_id: Uuid) -> FrontdeskResult<EffectiveSet> {
        let user = self.users.get_by_id(actor_id).await?;

        let group_grants = match user.group_id {
            Some(group_id) => match self.groups.get_by_id(group_id).await {
                Ok(group) if group.is_active => self.groups.permissions(group_id).await?,
                Ok(_) => Vec::new(),
                Err(FrontdeskError::NotFound { .. }) => Vec::new(),
                Err(e) => return Err(e),
            },
            None => Vec::new(),
        };

        let user_grants = self.users.permissions(actor_id).await?;

        Ok(merge_grants(group_grants, user_grants))
    }

    /// Fail-closed point query. A store failure surfaces as an error;
    /// callers must treat it as a denial, never as a grant.
    pub async fn has_permission(
        &self,
        actor_id: Uuid,
        module: &str,
        action: &str,
    ) -> FrontdeskResult<bool> {
        let set = self.effective_permissions(actor_id).await?;
        Ok(set.allows(&PermissionKey::new(module, action)))
    }

    /// True iff at least one of the keys resolves to allowed.
    pub async fn has_any(&self, actor_id: Uuid, keys: &[PermissionKey]) -> FrontdeskResult<bool> {
        let set = self.effective_permissions(actor_id).await?;
        Ok(set.allows_any(keys))
    }

    /// True iff every key resolves to allowed.
    pub async fn has_all(&self, actor_id: Uuid, keys: &[PermissionKey]) -> FrontdeskResult<bool> {
        let set = self.effective_permissions(actor_id).await?;
        Ok(set.allows_all(keys))
    }

    /// Sugar for `has_permission(actor_id, module, "manage")`.
    pub async fn can_manage(&self, actor_id: Uuid, module: &str) -> FrontdeskResult<bool> {
        self.has_permission(actor_id, module, "manage").await
    }
}
