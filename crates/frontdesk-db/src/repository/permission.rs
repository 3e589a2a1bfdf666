//! SurrealDB implementation of [`PermissionRepository`].

use chrono::{DateTime, Utc};
use frontdesk_core::error::FrontdeskResult;
use frontdesk_core::models::permission::{
    CreatePermission, Permission, PermissionKey, UpdatePermission,
};
use frontdesk_core::store::{PaginatedResult, Pagination, PermissionRepository, PermissionUsage};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct PermissionRow {
    module: String,
    action: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct PermissionRowWithId {
    record_id: String,
    module: String,
    action: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PermissionRowWithId {
    fn try_into_permission(self) -> Result<Permission, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        Ok(Permission {
            id,
            module: self.module,
            action: self.action,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Row struct for batch inserts.
#[derive(Debug, SurrealValue)]
struct PermissionInsert {
    id: String,
    module: String,
    action: String,
    description: Option<String>,
}

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the Permission repository.
#[derive(Clone)]
pub struct SurrealPermissionRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealPermissionRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn key_exists(&self, module: &str, action: &str) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM permission \
                 WHERE module = $module AND action = $action GROUP ALL",
            )
            .bind(("module", module.to_string()))
            .bind(("action", action.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }
}

impl<C: Connection> PermissionRepository for SurrealPermissionRepository<C> {
    async fn create(&self, input: CreatePermission) -> FrontdeskResult<Permission> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        // Pre-check the key; the unique index is the safety net against
        // races.
        if self.key_exists(&input.module, &input.action).await? {
            let key = PermissionKey::new(&input.module, &input.action);
            return Err(DbError::Conflict {
                entity: "permission".into(),
                reason: format!("permission {key} already exists"),
                blocking: vec![key.to_string()],
            }
            .into());
        }

        let result = self
            .db
            .query(
                "CREATE type::record('permission', $id) SET \
                 module = $module, action = $action, \
                 description = $description",
            )
            .bind(("id", id_str.clone()))
            .bind(("module", input.module))
            .bind(("action", input.action))
            .bind(("description", input.description))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission".into(),
            id: id_str,
        })?;

        Ok(Permission {
            id,
            module: row.module,
            action: row.action,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn create_many(&self, inputs: Vec<CreatePermission>) -> FrontdeskResult<u64> {
        if inputs.is_empty() {
            return Ok(0);
        }

        let rows: Vec<PermissionInsert> = inputs
            .into_iter()
            .map(|input| PermissionInsert {
                id: Uuid::new_v4().to_string(),
                module: input.module,
                action: input.action,
                description: input.description,
            })
            .collect();

        // INSERT IGNORE skips rows that would violate the unique
        // (module, action) index instead of failing the batch.
        let mut result = self
            .db
            .query("INSERT IGNORE INTO permission $rows")
            .bind(("rows", rows))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        let created: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        Ok(created.len() as u64)
    }

    async fn get_by_id(&self, id: Uuid) -> FrontdeskResult<Permission> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('permission', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission".into(),
            id: id_str,
        })?;

        Ok(Permission {
            id,
            module: row.module,
            action: row.action,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn get_by_key(&self, key: &PermissionKey) -> FrontdeskResult<Option<Permission>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 WHERE module = $module AND action = $action",
            )
            .bind(("module", key.module.clone()))
            .bind(("action", key.action.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(PermissionRowWithId::try_into_permission)
            .transpose()?)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> FrontdeskResult<Vec<Permission>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let id_strings: Vec<String> = ids.iter().map(Uuid::to_string).collect();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 WHERE meta::id(id) IN $ids \
                 ORDER BY module ASC, action ASC",
            )
            .bind(("ids", id_strings))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;
        let permissions = rows
            .into_iter()
            .map(PermissionRowWithId::try_into_permission)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(permissions)
    }

    async fn find_by_keys(&self, keys: &[PermissionKey]) -> FrontdeskResult<Vec<Permission>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let key_strings: Vec<String> = keys.iter().map(PermissionKey::to_string).collect();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 WHERE string::concat(module, ':', action) IN $keys \
                 ORDER BY module ASC, action ASC",
            )
            .bind(("keys", key_strings))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;
        let permissions = rows
            .into_iter()
            .map(PermissionRowWithId::try_into_permission)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(permissions)
    }

    async fn update(&self, id: Uuid, input: UpdatePermission) -> FrontdeskResult<Permission> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.description.is_some() {
            sets.push("description = $description");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('permission', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<PermissionRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "permission".into(),
            id: id_str,
        })?;

        Ok(Permission {
            id,
            module: row.module,
            action: row.action,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn delete(&self, id: Uuid) -> FrontdeskResult<()> {
        // Reference-count guard: never remove a permission that a group
        // or user still links to.
        let usage = self.usage_count(id).await?;
        if usage.total() > 0 {
            return Err(DbError::Conflict {
                entity: "permission".into(),
                reason: format!(
                    "permission has {} group link(s) and {} user link(s)",
                    usage.group_links, usage.user_links
                ),
                blocking: vec![id.to_string()],
            }
            .into());
        }

        self.db
            .query("DELETE type::record('permission', $id)")
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> FrontdeskResult<PaginatedResult<Permission>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM permission GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 ORDER BY module ASC, action ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<PermissionRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(PermissionRowWithId::try_into_permission)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn usage_count(&self, id: Uuid) -> FrontdeskResult<PermissionUsage> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM group_permission \
                 WHERE permission_id = $id GROUP ALL; \
                 SELECT count() AS total FROM user_permission \
                 WHERE permission_id = $id GROUP ALL;",
            )
            .bind(("id", id_str))
            .await
            .map_err(DbError::from)?;

        let group_rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        let user_rows: Vec<CountRow> = result.take(1).map_err(DbError::from)?;

        Ok(PermissionUsage {
            group_links: group_rows.first().map(|r| r.total).unwrap_or(0),
            user_links: user_rows.first().map(|r| r.total).unwrap_or(0),
        })
    }
}
