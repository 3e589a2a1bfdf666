//! Shared in-memory store used by the access-layer tests.
//!
//! Implements the three repository traits over plain maps, with
//! injectable store failures. Mutations honor the same contracts the
//! database implementation does (atomic replace, guarded deletes), so
//! service-level behavior can be verified without a database.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use frontdesk_core::error::{FrontdeskError, FrontdeskResult};
use frontdesk_core::models::grant::{GrantSpec, LinkMode, PermissionGrant};
use frontdesk_core::models::group::{CreateGroup, UpdateGroup, UserGroup};
use frontdesk_core::models::permission::{
    CreatePermission, Permission, PermissionKey, UpdatePermission,
};
use frontdesk_core::models::user::{CreateUser, DeleteOutcome, UpdateUser, User};
use frontdesk_core::store::{
    GroupRepository, PaginatedResult, Pagination, PermissionRepository, PermissionUsage,
    UserRepository,
};
use uuid::Uuid;

#[derive(Default)]
struct State {
    permissions: HashMap<Uuid, Permission>,
    groups: HashMap<Uuid, UserGroup>,
    users: HashMap<Uuid, User>,
    /// `(group_id, permission_id) -> is_allowed`
    group_links: HashMap<(Uuid, Uuid), bool>,
    /// `(user_id, permission_id) -> is_allowed`
    user_links: HashMap<(Uuid, Uuid), bool>,
    owned_records: HashMap<Uuid, u64>,
    /// Method names that should fail with a store error on their next
    /// call.
    fail_on: Vec<&'static str>,
}

#[derive(Clone, Default)]
pub struct MemStore {
    state: Arc<Mutex<State>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arrange for the named method to fail once with a store error.
    pub fn fail_on(&self, method: &'static str) {
        self.state.lock().unwrap().fail_on.push(method);
    }

    fn trip(&self, method: &'static str) -> FrontdeskResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(pos) = state.fail_on.iter().position(|m| *m == method) {
            state.fail_on.remove(pos);
            return Err(FrontdeskError::Store(format!(
                "injected failure in {method}"
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Seeding and assertion helpers
    // -----------------------------------------------------------------

    pub fn seed_permission(&self, module: &str, action: &str) -> Permission {
        let permission = Permission {
            id: Uuid::new_v4(),
            module: module.into(),
            action: action.into(),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.state
            .lock()
            .unwrap()
            .permissions
            .insert(permission.id, permission.clone());
        permission
    }

    pub fn seed_group(&self, name: &str, is_active: bool) -> UserGroup {
        let group = UserGroup {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            is_active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.state
            .lock()
            .unwrap()
            .groups
            .insert(group.id, group.clone());
        group
    }

    pub fn seed_user(&self, username: &str, group_id: Option<Uuid>) -> User {
        let user = User {
            id: Uuid::new_v4(),
            username: username.into(),
            email: format!("{username}@example.com"),
            full_name: None,
            password_hash: "hashed:test".into(),
            group_id,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.state
            .lock()
            .unwrap()
            .users
            .insert(user.id, user.clone());
        user
    }

    pub fn set_owned_records(&self, user_id: Uuid, count: u64) {
        self.state
            .lock()
            .unwrap()
            .owned_records
            .insert(user_id, count);
    }

    pub fn group_link_pairs(&self, group_id: Uuid) -> Vec<(Uuid, bool)> {
        let state = self.state.lock().unwrap();
        let mut pairs: Vec<(Uuid, bool)> = state
            .group_links
            .iter()
            .filter(|((g, _), _)| *g == group_id)
            .map(|((_, p), allowed)| (*p, *allowed))
            .collect();
        pairs.sort();
        pairs
    }

    pub fn user_link_pairs(&self, user_id: Uuid) -> Vec<(Uuid, bool)> {
        let state = self.state.lock().unwrap();
        let mut pairs: Vec<(Uuid, bool)> = state
            .user_links
            .iter()
            .filter(|((u, _), _)| *u == user_id)
            .map(|((_, p), allowed)| (*p, *allowed))
            .collect();
        pairs.sort();
        pairs
    }

    pub fn permission_count(&self) -> usize {
        self.state.lock().unwrap().permissions.len()
    }

    pub fn group_count(&self) -> usize {
        self.state.lock().unwrap().groups.len()
    }

    fn grants_for(state: &State, links: &HashMap<(Uuid, Uuid), bool>, owner: Uuid) -> Vec<PermissionGrant> {
        let mut grants: Vec<PermissionGrant> = links
            .iter()
            .filter(|((o, _), _)| *o == owner)
            .filter_map(|((_, pid), allowed)| {
                state.permissions.get(pid).map(|p| PermissionGrant {
                    permission: p.clone(),
                    is_allowed: *allowed,
                })
            })
            .collect();
        grants.sort_by(|a, b| a.permission.key().cmp(&b.permission.key()));
        grants
    }

    fn edit_links(
        links: &mut HashMap<(Uuid, Uuid), bool>,
        owner: Uuid,
        grants: &[GrantSpec],
        mode: LinkMode,
    ) -> u64 {
        match mode {
            LinkMode::Add => {
                let mut created = 0;
                for grant in grants {
                    let key = (owner, grant.permission_id);
                    if !links.contains_key(&key) {
                        links.insert(key, grant.is_allowed);
                        created += 1;
                    }
                }
                created
            }
            LinkMode::Remove => {
                let mut removed = 0;
                for grant in grants {
                    if links.remove(&(owner, grant.permission_id)).is_some() {
                        removed += 1;
                    }
                }
                removed
            }
            LinkMode::Replace => {
                links.retain(|(o, _), _| *o != owner);
                for grant in grants {
                    links.insert((owner, grant.permission_id), grant.is_allowed);
                }
                grants.len() as u64
            }
        }
    }
}

impl PermissionRepository for MemStore {
    async fn create(&self, input: CreatePermission) -> FrontdeskResult<Permission> {
        self.trip("permission_create")?;
        let mut state = self.state.lock().unwrap();
        let key = input.key();
        if state.permissions.values().any(|p| p.key() == key) {
            return Err(FrontdeskError::Conflict {
                entity: "permission".into(),
                reason: format!("permission {key} already exists"),
                blocking: vec![key.to_string()],
            });
        }
        let permission = Permission {
            id: Uuid::new_v4(),
            module: input.module,
            action: input.action,
            description: input.description,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    async fn create_many(&self, inputs: Vec<CreatePermission>) -> FrontdeskResult<u64> {
        self.trip("permission_create_many")?;
        let mut state = self.state.lock().unwrap();
        let mut created = 0;
        for input in inputs {
            let key = input.key();
            if state.permissions.values().any(|p| p.key() == key) {
                continue;
            }
            let permission = Permission {
                id: Uuid::new_v4(),
                module: input.module,
                action: input.action,
                description: input.description,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            state.permissions.insert(permission.id, permission);
            created += 1;
        }
        Ok(created)
    }

    async fn get_by_id(&self, id: Uuid) -> FrontdeskResult<Permission> {
        self.trip("permission_get_by_id")?;
        self.state
            .lock()
            .unwrap()
            .permissions
            .get(&id)
            .cloned()
            .ok_or_else(|| FrontdeskError::NotFound {
                entity: "permission".into(),
                id: id.to_string(),
            })
    }

    async fn get_by_key(&self, key: &PermissionKey) -> FrontdeskResult<Option<Permission>> {
        self.trip("permission_get_by_key")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .permissions
            .values()
            .find(|p| p.key() == *key)
            .cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> FrontdeskResult<Vec<Permission>> {
        self.trip("permission_find_by_ids")?;
        let state = self.state.lock().unwrap();
        let mut found: Vec<Permission> = ids
            .iter()
            .filter_map(|id| state.permissions.get(id).cloned())
            .collect();
        found.sort_by(|a, b| a.key().cmp(&b.key()));
        found.dedup_by(|a, b| a.id == b.id);
        Ok(found)
    }

    async fn find_by_keys(&self, keys: &[PermissionKey]) -> FrontdeskResult<Vec<Permission>> {
        self.trip("permission_find_by_keys")?;
        let state = self.state.lock().unwrap();
        let mut found: Vec<Permission> = state
            .permissions
            .values()
            .filter(|p| keys.contains(&p.key()))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.key().cmp(&b.key()));
        Ok(found)
    }

    async fn update(&self, id: Uuid, input: UpdatePermission) -> FrontdeskResult<Permission> {
        self.trip("permission_update")?;
        let mut state = self.state.lock().unwrap();
        let permission = state
            .permissions
            .get_mut(&id)
            .ok_or_else(|| FrontdeskError::NotFound {
                entity: "permission".into(),
                id: id.to_string(),
            })?;
        if let Some(description) = input.description {
            permission.description = description;
        }
        permission.updated_at = Utc::now();
        Ok(permission.clone())
    }

    async fn delete(&self, id: Uuid) -> FrontdeskResult<()> {
        self.trip("permission_delete")?;
        let mut state = self.state.lock().unwrap();
        let group_links = state.group_links.keys().filter(|(_, p)| *p == id).count();
        let user_links = state.user_links.keys().filter(|(_, p)| *p == id).count();
        if group_links + user_links > 0 {
            return Err(FrontdeskError::Conflict {
                entity: "permission".into(),
                reason: format!("permission has {group_links} group link(s) and {user_links} user link(s)"),
                blocking: vec![id.to_string()],
            });
        }
        state
            .permissions
            .remove(&id)
            .ok_or_else(|| FrontdeskError::NotFound {
                entity: "permission".into(),
                id: id.to_string(),
            })?;
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> FrontdeskResult<PaginatedResult<Permission>> {
        self.trip("permission_list")?;
        let state = self.state.lock().unwrap();
        let mut all: Vec<Permission> = state.permissions.values().cloned().collect();
        all.sort_by(|a, b| a.key().cmp(&b.key()));
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn usage_count(&self, id: Uuid) -> FrontdeskResult<PermissionUsage> {
        self.trip("permission_usage_count")?;
        let state = self.state.lock().unwrap();
        Ok(PermissionUsage {
            group_links: state.group_links.keys().filter(|(_, p)| *p == id).count() as u64,
            user_links: state.user_links.keys().filter(|(_, p)| *p == id).count() as u64,
        })
    }
}

impl GroupRepository for MemStore {
    async fn create(&self, input: CreateGroup) -> FrontdeskResult<UserGroup> {
        self.create_with_permissions(input, Vec::new()).await
    }

    async fn create_with_permissions(
        &self,
        input: CreateGroup,
        grants: Vec<GrantSpec>,
    ) -> FrontdeskResult<UserGroup> {
        self.trip("group_create")?;
        let mut state = self.state.lock().unwrap();
        if state.groups.values().any(|g| g.name == input.name) {
            return Err(FrontdeskError::Conflict {
                entity: "user_group".into(),
                reason: format!("group name {:?} already exists", input.name),
                blocking: vec![input.name],
            });
        }
        let group = UserGroup {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            is_active: input.is_active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        for grant in &grants {
            state
                .group_links
                .insert((group.id, grant.permission_id), grant.is_allowed);
        }
        state.groups.insert(group.id, group.clone());
        Ok(group)
    }

    async fn get_by_id(&self, id: Uuid) -> FrontdeskResult<UserGroup> {
        self.trip("group_get_by_id")?;
        self.state
            .lock()
            .unwrap()
            .groups
            .get(&id)
            .cloned()
            .ok_or_else(|| FrontdeskError::NotFound {
                entity: "user_group".into(),
                id: id.to_string(),
            })
    }

    async fn get_by_name(&self, name: &str) -> FrontdeskResult<Option<UserGroup>> {
        self.trip("group_get_by_name")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .groups
            .values()
            .find(|g| g.name == name)
            .cloned())
    }

    async fn update(&self, id: Uuid, input: UpdateGroup) -> FrontdeskResult<UserGroup> {
        self.trip("group_update")?;
        let mut state = self.state.lock().unwrap();
        let group = state
            .groups
            .get_mut(&id)
            .ok_or_else(|| FrontdeskError::NotFound {
                entity: "user_group".into(),
                id: id.to_string(),
            })?;
        if let Some(name) = input.name {
            group.name = name;
        }
        if let Some(description) = input.description {
            group.description = description;
        }
        if let Some(is_active) = input.is_active {
            group.is_active = is_active;
        }
        group.updated_at = Utc::now();
        Ok(group.clone())
    }

    async fn delete(&self, id: Uuid) -> FrontdeskResult<()> {
        self.trip("group_delete")?;
        let mut state = self.state.lock().unwrap();
        let members = state
            .users
            .values()
            .filter(|u| u.group_id == Some(id))
            .count();
        if members > 0 {
            return Err(FrontdeskError::Conflict {
                entity: "user_group".into(),
                reason: format!("group still has {members} member(s)"),
                blocking: vec![id.to_string()],
            });
        }
        state
            .groups
            .remove(&id)
            .ok_or_else(|| FrontdeskError::NotFound {
                entity: "user_group".into(),
                id: id.to_string(),
            })?;
        state.group_links.retain(|(g, _), _| *g != id);
        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> FrontdeskResult<PaginatedResult<UserGroup>> {
        self.trip("group_list")?;
        let state = self.state.lock().unwrap();
        let mut all: Vec<UserGroup> = state.groups.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn user_count(&self, id: Uuid) -> FrontdeskResult<u64> {
        self.trip("group_user_count")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .users
            .values()
            .filter(|u| u.group_id == Some(id))
            .count() as u64)
    }

    async fn permissions(&self, group_id: Uuid) -> FrontdeskResult<Vec<PermissionGrant>> {
        self.trip("group_permissions")?;
        let state = self.state.lock().unwrap();
        Ok(Self::grants_for(&state, &state.group_links, group_id))
    }

    async fn link_permissions(
        &self,
        group_id: Uuid,
        grants: &[GrantSpec],
        mode: LinkMode,
    ) -> FrontdeskResult<u64> {
        // Tripping before any mutation models a store whose replace is
        // transactional: a failure leaves the prior set intact.
        self.trip("group_link_permissions")?;
        let mut state = self.state.lock().unwrap();
        Ok(Self::edit_links(
            &mut state.group_links,
            group_id,
            grants,
            mode,
        ))
    }
}

impl UserRepository for MemStore {
    async fn create(&self, input: CreateUser) -> FrontdeskResult<User> {
        self.trip("user_create")?;
        let mut state = self.state.lock().unwrap();
        if state.users.values().any(|u| u.username == input.username) {
            return Err(FrontdeskError::Conflict {
                entity: "user".into(),
                reason: format!("username {:?} already exists", input.username),
                blocking: vec![input.username],
            });
        }
        let user = User {
            id: Uuid::new_v4(),
            username: input.username,
            email: input.email,
            full_name: input.full_name,
            password_hash: format!("hashed:{}", input.password),
            group_id: input.group_id,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> FrontdeskResult<User> {
        self.trip("user_get_by_id")?;
        self.state
            .lock()
            .unwrap()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| FrontdeskError::NotFound {
                entity: "user".into(),
                id: id.to_string(),
            })
    }

    async fn get_by_username(&self, username: &str) -> FrontdeskResult<User> {
        self.trip("user_get_by_username")?;
        self.state
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| FrontdeskError::NotFound {
                entity: "user".into(),
                id: username.into(),
            })
    }

    async fn get_by_email(&self, email: &str) -> FrontdeskResult<User> {
        self.trip("user_get_by_email")?;
        self.state
            .lock()
            .unwrap()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or_else(|| FrontdeskError::NotFound {
                entity: "user".into(),
                id: email.into(),
            })
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> FrontdeskResult<User> {
        self.trip("user_update")?;
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| FrontdeskError::NotFound {
                entity: "user".into(),
                id: id.to_string(),
            })?;
        if let Some(username) = input.username {
            user.username = username;
        }
        if let Some(email) = input.email {
            user.email = email;
        }
        if let Some(full_name) = input.full_name {
            user.full_name = full_name;
        }
        if let Some(group_id) = input.group_id {
            user.group_id = group_id;
        }
        if let Some(is_active) = input.is_active {
            user.is_active = is_active;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete(&self, id: Uuid) -> FrontdeskResult<DeleteOutcome> {
        self.trip("user_delete")?;
        let mut state = self.state.lock().unwrap();
        let owned = state.owned_records.get(&id).copied().unwrap_or(0);
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| FrontdeskError::NotFound {
                entity: "user".into(),
                id: id.to_string(),
            })?;
        if owned > 0 {
            user.is_active = false;
            user.updated_at = Utc::now();
            return Ok(DeleteOutcome::Deactivated);
        }
        state.users.remove(&id);
        state.user_links.retain(|(u, _), _| *u != id);
        Ok(DeleteOutcome::Deleted)
    }

    async fn list(&self, pagination: Pagination) -> FrontdeskResult<PaginatedResult<User>> {
        self.trip("user_list")?;
        let state = self.state.lock().unwrap();
        let mut all: Vec<User> = state.users.values().cloned().collect();
        all.sort_by(|a, b| a.username.cmp(&b.username));
        let total = all.len() as u64;
        let items = all
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn owned_record_count(&self, id: Uuid) -> FrontdeskResult<u64> {
        self.trip("user_owned_record_count")?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .owned_records
            .get(&id)
            .copied()
            .unwrap_or(0))
    }

    async fn permissions(&self, user_id: Uuid) -> FrontdeskResult<Vec<PermissionGrant>> {
        self.trip("user_permissions")?;
        let state = self.state.lock().unwrap();
        Ok(Self::grants_for(&state, &state.user_links, user_id))
    }

    async fn upsert_permission(&self, user_id: Uuid, grant: GrantSpec) -> FrontdeskResult<()> {
        self.trip("user_upsert_permission")?;
        self.state
            .lock()
            .unwrap()
            .user_links
            .insert((user_id, grant.permission_id), grant.is_allowed);
        Ok(())
    }

    async fn link_permissions(
        &self,
        user_id: Uuid,
        grants: &[GrantSpec],
        mode: LinkMode,
    ) -> FrontdeskResult<u64> {
        self.trip("user_link_permissions")?;
        let mut state = self.state.lock().unwrap();
        Ok(Self::edit_links(
            &mut state.user_links,
            user_id,
            grants,
            mode,
        ))
    }
}
