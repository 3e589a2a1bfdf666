//! Export snapshots of permissions and groups.
//!
//! Produces serializable records that round-trip through the import
//! payload types; rendering (JSON, CSV) belongs to the presentation
//! layer.

use frontdesk_core::error::FrontdeskResult;
use frontdesk_core::models::permission::PermissionKey;
use frontdesk_core::store::{GroupRepository, Pagination, PermissionRepository};
use serde::{Deserialize, Serialize};

const EXPORT_PAGE_SIZE: u64 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionExport {
    pub module: String,
    pub action: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupExport {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    /// Keys of the group's allowed permissions.
    pub permissions: Vec<PermissionKey>,
}

/// Export service over the permission and group repositories.
pub struct ExportService<P, G>
where
    P: PermissionRepository,
    G: GroupRepository,
{
    permissions: P,
    groups: G,
}

impl<P, G> ExportService<P, G>
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

    /// Snapshot every permission, in `(module, action)` order.
    pub async fn export_permissions(&self) -> FrontdeskResult<Vec<PermissionExport>> {
        let mut records = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .permissions
                .list(Pagination {
                    offset,
                    limit: EXPORT_PAGE_SIZE,
                })
                .await?;
            let fetched = page.items.len() as u64;
            records.extend(page.items.into_iter().map(|p| PermissionExport {
                module: p.module,
                action: p.action,
                description: p.description,
            }));
            offset += fetched;
            if offset >= page.total || fetched == 0 {
                break;
            }
        }
        Ok(records)
    }

    /// Snapshot every group with the keys of its allowed permissions.
    pub async fn export_groups(&self) -> FrontdeskResult<Vec<GroupExport>> {
        let mut records = Vec::new();
        let mut offset = 0;
        loop {
            let page = self
                .groups
                .list(Pagination {
                    offset,
                    limit: EXPORT_PAGE_SIZE,
                })
                .await?;
            let fetched = page.items.len() as u64;
            for group in page.items {
                let grants = self.groups.permissions(group.id).await?;
                let permissions = grants
                    .into_iter()
                    .filter(|g| g.is_allowed)
                    .map(|g| g.permission.key())
                    .collect();
                records.push(GroupExport {
                    name: group.name,
                    description: group.description,
                    is_active: group.is_active,
                    permissions,
                });
            }
            offset += fetched;
            if offset >= page.total || fetched == 0 {
                break;
            }
        }
        Ok(records)
    }
}
