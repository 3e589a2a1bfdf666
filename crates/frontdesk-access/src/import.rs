//! Import reconciliation for permissions and groups.
//!
//! Imports merge a payload against current store state under explicit
//! policy flags. Validation problems reject the whole payload before
//! any store call; once mutation starts, per-item failures are
//! collected into the summary instead of aborting the batch.

use std::collections::{BTreeSet, HashMap, HashSet};

use frontdesk_core::error::{FrontdeskError, FrontdeskResult};
use frontdesk_core::models::grant::{GrantSpec, LinkMode};
use frontdesk_core::models::group::{CreateGroup, UpdateGroup, validate_group_name};
use frontdesk_core::models::permission::{
    CreatePermission, Permission, PermissionKey, UpdatePermission,
};
use frontdesk_core::store::{GroupRepository, PermissionRepository};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Description attached to permissions auto-created by a group import.
pub const IMPORTED_PERMISSION_DESCRIPTION: &str = "Created automatically during import";

/// Policy flags controlling how an import treats existing entries.
#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    /// Count duplicates as skipped instead of failing the import.
    pub skip_duplicates: bool,
    /// Update the mutable fields of duplicates whose values differ.
    pub update_existing: bool,
    /// Report what would happen without mutating anything.
    pub validate_only: bool,
    /// Group imports only: create referenced permissions that do not
    /// exist yet instead of failing.
    pub create_missing_permissions: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            skip_duplicates: true,
            update_existing: false,
            validate_only: false,
            create_missing_permissions: false,
        }
    }
}

/// One permission row of an import payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionImport {
    pub module: String,
    pub action: String,
    pub description: Option<String>,
}

impl PermissionImport {
    fn key(&self) -> PermissionKey {
        PermissionKey::new(&self.module, &self.action)
    }
}

/// One group row of an import payload, with its permission keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupImport {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub permissions: Vec<PermissionKey>,
}

/// Dry-run result returned for `validate_only`.
#[derive(Debug, Clone, Serialize)]
pub struct ImportPreview {
    pub total: u64,
    pub new: u64,
    pub duplicates: u64,
    /// Referenced permission keys absent from the store (group imports).
    pub missing_permissions: Vec<String>,
    pub valid: bool,
}

/// Outcome of an applied import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub total: u64,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
    /// Permissions auto-created while importing groups.
    pub created_permissions: u64,
    /// Per-item failures collected without aborting the batch.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub enum ImportReport {
    Preview(ImportPreview),
    Applied(ImportSummary),
}

/// Import service over the permission and group repositories.
pub struct ImportService<P, G>
where
    P: PermissionRepository,
    G: GroupRepository,
{
    permissions: P,
    groups: G,
}

impl<P, G> ImportService<P, G>
where
    P: PermissionRepository,
    G: GroupRepository,
{
    pub fn new(permissions: P, groups: G) -> Self {
        Self {
            permissions,
            groups,
        }
    }

    /// Merge a permission payload against the store.
    pub async fn import_permissions(
        &self,
        items: Vec<PermissionImport>,
        options: ImportOptions,
    ) -> FrontdeskResult<ImportReport> {
        let keys: Vec<PermissionKey> = items.iter().map(PermissionImport::key).collect();
        for key in &keys {
            key.validate()?;
        }
        reject_duplicate_keys(&keys)?;

        let existing = self.permissions.find_by_keys(&keys).await?;
        let existing_by_key: HashMap<PermissionKey, Permission> = existing
            .into_iter()
            .map(|p| (p.key(), p))
            .collect();

        let (new_items, duplicate_items): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|item| !existing_by_key.contains_key(&item.key()));

        if options.validate_only {
            return Ok(ImportReport::Preview(ImportPreview {
                total: keys.len() as u64,
                new: new_items.len() as u64,
                duplicates: duplicate_items.len() as u64,
                missing_permissions: Vec::new(),
                valid: true,
            }));
        }

        if !duplicate_items.is_empty() && !options.skip_duplicates && !options.update_existing {
            return Err(FrontdeskError::Conflict {
                entity: "permission".into(),
                reason: "import contains permissions that already exist".into(),
                blocking: duplicate_items.iter().map(|i| i.key().to_string()).collect(),
            });
        }

        let mut summary = ImportSummary {
            total: keys.len() as u64,
            ..Default::default()
        };

        if !new_items.is_empty() {
            let inputs = new_items
                .into_iter()
                .map(|item| CreatePermission {
                    module: item.module,
                    action: item.action,
                    description: item.description,
                })
                .collect();
            match self.permissions.create_many(inputs).await {
                Ok(count) => summary.created = count,
                Err(e) => summary.errors.push(format!("failed to create new permissions: {e}")),
            }
        }

        if options.update_existing {
            for item in &duplicate_items {
                let existing = &existing_by_key[&item.key()];
                if item.description == existing.description {
                    continue;
                }
                let update = UpdatePermission {
                    description: Some(item.description.clone()),
                };
                match self.permissions.update(existing.id, update).await {
                    Ok(_) => summary.updated += 1,
                    Err(e) => summary
                        .errors
                        .push(format!("failed to update {}: {e}", item.key())),
                }
            }
        } else if options.skip_duplicates {
            summary.skipped = duplicate_items.len() as u64;
        }

        Ok(ImportReport::Applied(summary))
    }

    /// Merge a group payload (with attached permission keys) against
    /// the store.
    pub async fn import_groups(
        &self,
        items: Vec<GroupImport>,
        options: ImportOptions,
    ) -> FrontdeskResult<ImportReport> {
        for item in &items {
            validate_group_name(&item.name)?;
            for key in &item.permissions {
                key.validate()?;
            }
        }
        reject_duplicate_names(&items)?;

        let mut existing_by_name = HashMap::new();
        for item in &items {
            if let Some(group) = self.groups.get_by_name(&item.name).await? {
                existing_by_name.insert(item.name.clone(), group);
            }
        }

        let (new_items, duplicate_items): (Vec<_>, Vec<_>) = items
            .into_iter()
            .partition(|item| !existing_by_name.contains_key(&item.name));

        let wanted_keys: BTreeSet<PermissionKey> = new_items
            .iter()
            .chain(duplicate_items.iter())
            .flat_map(|item| item.permissions.iter().cloned())
            .collect();
        let wanted_keys: Vec<PermissionKey> = wanted_keys.into_iter().collect();

        let found = self.permissions.find_by_keys(&wanted_keys).await?;
        let found_keys: HashSet<PermissionKey> = found.iter().map(Permission::key).collect();
        let missing: Vec<&PermissionKey> = wanted_keys
            .iter()
            .filter(|key| !found_keys.contains(key))
            .collect();

        let total = (new_items.len() + duplicate_items.len()) as u64;

        if options.validate_only {
            return Ok(ImportReport::Preview(ImportPreview {
                total,
                new: new_items.len() as u64,
                duplicates: duplicate_items.len() as u64,
                missing_permissions: missing.iter().map(|k| k.to_string()).collect(),
                valid: missing.is_empty() || options.create_missing_permissions,
            }));
        }

        if !missing.is_empty() && !options.create_missing_permissions {
            let mut keys: Vec<String> = missing.iter().map(|k| k.to_string()).collect();
            keys.sort();
            return Err(FrontdeskError::NotFound {
                entity: "permission".into(),
                id: keys.join(", "),
            });
        }

        if !duplicate_items.is_empty() && !options.skip_duplicates && !options.update_existing {
            return Err(FrontdeskError::Conflict {
                entity: "user_group".into(),
                reason: "import contains groups that already exist".into(),
                blocking: duplicate_items.iter().map(|i| i.name.clone()).collect(),
            });
        }

        let mut summary = ImportSummary {
            total,
            ..Default::default()
        };

        if options.create_missing_permissions && !missing.is_empty() {
            let inputs = missing
                .iter()
                .map(|key| CreatePermission {
                    module: key.module.clone(),
                    action: key.action.clone(),
                    description: Some(IMPORTED_PERMISSION_DESCRIPTION.into()),
                })
                .collect();
            match self.permissions.create_many(inputs).await {
                Ok(count) => {
                    info!(created = count, "auto-created permissions for group import");
                    summary.created_permissions = count;
                }
                Err(e) => summary
                    .errors
                    .push(format!("failed to create missing permissions: {e}")),
            }
        }

        // Re-resolve after any auto-creation.
        let found = self.permissions.find_by_keys(&wanted_keys).await?;
        let id_by_key: HashMap<PermissionKey, _> =
            found.into_iter().map(|p| (p.key(), p.id)).collect();

        for item in new_items {
            let grants = match resolve_grants(&item, &id_by_key) {
                Ok(grants) => grants,
                Err(message) => {
                    summary.errors.push(message);
                    continue;
                }
            };
            let input = CreateGroup {
                name: item.name.clone(),
                description: item.description,
                is_active: item.is_active,
            };
            match self.groups.create_with_permissions(input, grants).await {
                Ok(_) => summary.created += 1,
                Err(e) => summary
                    .errors
                    .push(format!("failed to create group {:?}: {e}", item.name)),
            }
        }

        if options.update_existing {
            for item in duplicate_items {
                let existing = &existing_by_name[&item.name];
                let update = UpdateGroup {
                    name: None,
                    description: item.description.clone().map(Some),
                    is_active: Some(item.is_active),
                };
                if let Err(e) = self.groups.update(existing.id, update).await {
                    summary
                        .errors
                        .push(format!("failed to update group {:?}: {e}", item.name));
                    continue;
                }
                if !item.permissions.is_empty() {
                    let grants = match resolve_grants(&item, &id_by_key) {
                        Ok(grants) => grants,
                        Err(message) => {
                            summary.errors.push(message);
                            continue;
                        }
                    };
                    if let Err(e) = self
                        .groups
                        .link_permissions(existing.id, &grants, LinkMode::Replace)
                        .await
                    {
                        summary.errors.push(format!(
                            "failed to replace permissions of group {:?}: {e}",
                            item.name
                        ));
                        continue;
                    }
                }
                summary.updated += 1;
            }
        } else if options.skip_duplicates {
            summary.skipped = duplicate_items.len() as u64;
        }

        Ok(ImportReport::Applied(summary))
    }
}

fn resolve_grants(
    item: &GroupImport,
    id_by_key: &HashMap<PermissionKey, uuid::Uuid>,
) -> Result<Vec<GrantSpec>, String> {
    let mut grants = Vec::with_capacity(item.permissions.len());
    let mut unresolved = Vec::new();
    for key in &item.permissions {
        match id_by_key.get(key) {
            Some(id) => grants.push(GrantSpec::allow(*id)),
            None => unresolved.push(key.to_string()),
        }
    }
    if unresolved.is_empty() {
        Ok(grants)
    } else {
        Err(format!(
            "group {:?}: unresolved permissions: {}",
            item.name,
            unresolved.join(", ")
        ))
    }
}

/// Reject a payload that names the same `(module, action)` twice.
fn reject_duplicate_keys(keys: &[PermissionKey]) -> FrontdeskResult<()> {
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

/// Reject a payload that names the same group twice.
fn reject_duplicate_names(items: &[GroupImport]) -> FrontdeskResult<()> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = items
        .iter()
        .filter(|item| !seen.insert(item.name.clone()))
        .map(|item| item.name.clone())
        .collect();
    if !duplicates.is_empty() {
        duplicates.sort();
        duplicates.dedup();
        return Err(FrontdeskError::Validation {
            message: format!("duplicate groups in payload: {}", duplicates.join(", ")),
        });
    }
    Ok(())
}
