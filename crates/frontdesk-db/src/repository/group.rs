//! SurrealDB implementation of [`GroupRepository`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use frontdesk_core::error::FrontdeskResult;
use frontdesk_core::models::grant::{GrantSpec, LinkMode, PermissionGrant};
use frontdesk_core::models::group::{CreateGroup, UpdateGroup, UserGroup};
use frontdesk_core::models::permission::Permission;
use frontdesk_core::store::{GroupRepository, PaginatedResult, Pagination};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct GroupRow {
    name: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct GroupRowWithId {
    record_id: String,
    name: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRowWithId {
    fn try_into_group(self) -> Result<UserGroup, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        Ok(UserGroup {
            id,
            name: self.name,
            description: self.description,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Join-table row for grant queries.
#[derive(Debug, SurrealValue)]
struct GrantRow {
    permission_id: String,
    is_allowed: bool,
}

/// Row struct for batch link inserts.
#[derive(Debug, SurrealValue)]
struct GroupPermissionInsert {
    group_id: String,
    permission_id: String,
    is_allowed: bool,
}

/// Permission row joined back for grant queries.
#[derive(Debug, SurrealValue)]
struct GrantPermissionRow {
    record_id: String,
    module: String,
    action: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GrantPermissionRow {
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

/// Row struct for count queries.
#[derive(Debug, SurrealValue)]
struct CountRow {
    total: u64,
}

/// SurrealDB implementation of the UserGroup repository.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn name_exists(&self, name: &str, exclude: Option<Uuid>) -> Result<bool, DbError> {
        let query = match exclude {
            Some(_) => {
                "SELECT count() AS total FROM user_group \
                 WHERE name = $name \
                 AND id != type::record('user_group', $exclude) GROUP ALL"
            }
            None => "SELECT count() AS total FROM user_group WHERE name = $name GROUP ALL",
        };

        let mut builder = self.db.query(query).bind(("name", name.to_string()));
        if let Some(exclude) = exclude {
            builder = builder.bind(("exclude", exclude.to_string()));
        }

        let mut result = builder.await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    fn link_rows(group_id: Uuid, grants: &[GrantSpec]) -> Vec<GroupPermissionInsert> {
        grants
            .iter()
            .map(|grant| GroupPermissionInsert {
                group_id: group_id.to_string(),
                permission_id: grant.permission_id.to_string(),
                is_allowed: grant.is_allowed,
            })
            .collect()
    }
}

impl<C: Connection> GroupRepository for SurrealGroupRepository<C> {
    async fn create(&self, input: CreateGroup) -> FrontdeskResult<UserGroup> {
        self.create_with_permissions(input, Vec::new()).await
    }

    async fn create_with_permissions(
        &self,
        input: CreateGroup,
        grants: Vec<GrantSpec>,
    ) -> FrontdeskResult<UserGroup> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        // Pre-check the name; the unique index is the safety net
        // against races.
        if self.name_exists(&input.name, None).await? {
            return Err(DbError::Conflict {
                entity: "user_group".into(),
                reason: format!("group name {:?} already exists", input.name),
                blocking: vec![input.name],
            }
            .into());
        }

        let rows = Self::link_rows(id, &grants);

        // Group and its initial grants land in one transaction so a
        // half-linked group is never observable.
        let query = if rows.is_empty() {
            "BEGIN TRANSACTION; \
             CREATE type::record('user_group', $id) SET \
             name = $name, description = $description, \
             is_active = $is_active; \
             COMMIT TRANSACTION;"
        } else {
            "BEGIN TRANSACTION; \
             CREATE type::record('user_group', $id) SET \
             name = $name, description = $description, \
             is_active = $is_active; \
             INSERT IGNORE INTO group_permission $rows; \
             COMMIT TRANSACTION;"
        };

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id_str))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("is_active", input.is_active));
        if !rows.is_empty() {
            builder = builder.bind(("rows", rows));
        }

        builder
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> FrontdeskResult<UserGroup> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('user_group', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user_group".into(),
            id: id_str,
        })?;

        Ok(UserGroup {
            id,
            name: row.name,
            description: row.description,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn get_by_name(&self, name: &str) -> FrontdeskResult<Option<UserGroup>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user_group \
                 WHERE name = $name",
            )
            .bind(("name", name.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(GroupRowWithId::try_into_group)
            .transpose()?)
    }

    async fn update(&self, id: Uuid, input: UpdateGroup) -> FrontdeskResult<UserGroup> {
        let id_str = id.to_string();

        if let Some(name) = &input.name
            && self.name_exists(name, Some(id)).await?
        {
            return Err(DbError::Conflict {
                entity: "user_group".into(),
                reason: format!("group name {name:?} already exists"),
                blocking: vec![name.clone()],
            }
            .into());
        }

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        sets.push("updated_at = time::now()");

        let query = format!(
            "UPDATE type::record('user_group', $id) SET {}",
            sets.join(", ")
        );

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user_group".into(),
            id: id_str,
        })?;

        Ok(UserGroup {
            id,
            name: row.name,
            description: row.description,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    async fn delete(&self, id: Uuid) -> FrontdeskResult<()> {
        let group = self.get_by_id(id).await?;

        // Users are never cascade-deleted; the caller reassigns or
        // deactivates them first.
        let members = self.user_count(id).await?;
        if members > 0 {
            return Err(DbError::Conflict {
                entity: "user_group".into(),
                reason: format!("group {:?} still has {members} member(s)", group.name),
                blocking: vec![id.to_string()],
            }
            .into());
        }

        // Join rows go with the group.
        self.db
            .query(
                "DELETE group_permission WHERE group_id = $id; \
                 DELETE type::record('user_group', $id);",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn list(&self, pagination: Pagination) -> FrontdeskResult<PaginatedResult<UserGroup>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM user_group GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user_group \
                 ORDER BY name ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(GroupRowWithId::try_into_group)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn user_count(&self, id: Uuid) -> FrontdeskResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM user \
                 WHERE group_id = $id GROUP ALL",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn permissions(&self, group_id: Uuid) -> FrontdeskResult<Vec<PermissionGrant>> {
        let mut result = self
            .db
            .query(
                "SELECT permission_id, is_allowed FROM group_permission \
                 WHERE group_id = $id",
            )
            .bind(("id", group_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let grant_rows: Vec<GrantRow> = result.take(0).map_err(DbError::from)?;
        if grant_rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = grant_rows.iter().map(|r| r.permission_id.clone()).collect();

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM permission \
                 WHERE meta::id(id) IN $ids",
            )
            .bind(("ids", ids))
            .await
            .map_err(DbError::from)?;

        let permission_rows: Vec<GrantPermissionRow> = result.take(0).map_err(DbError::from)?;
        let by_id: HashMap<String, Permission> = permission_rows
            .into_iter()
            .map(|row| {
                let record_id = row.record_id.clone();
                row.try_into_permission().map(|p| (record_id, p))
            })
            .collect::<Result<_, DbError>>()?;

        let mut grants = Vec::with_capacity(grant_rows.len());
        for row in grant_rows {
            if let Some(permission) = by_id.get(&row.permission_id) {
                grants.push(PermissionGrant {
                    permission: permission.clone(),
                    is_allowed: row.is_allowed,
                });
            }
        }
        grants.sort_by(|a, b| a.permission.key().cmp(&b.permission.key()));

        Ok(grants)
    }

    async fn link_permissions(
        &self,
        group_id: Uuid,
        grants: &[GrantSpec],
        mode: LinkMode,
    ) -> FrontdeskResult<u64> {
        let group_id_str = group_id.to_string();

        match mode {
            LinkMode::Add => {
                if grants.is_empty() {
                    return Ok(0);
                }
                let rows = Self::link_rows(group_id, grants);

                let mut result = self
                    .db
                    .query("INSERT IGNORE INTO group_permission $rows")
                    .bind(("rows", rows))
                    .await
                    .map_err(DbError::from)?
                    .check()
                    .map_err(DbError::from)?;

                let created: Vec<GrantRow> = result.take(0).map_err(DbError::from)?;
                Ok(created.len() as u64)
            }
            LinkMode::Remove => {
                if grants.is_empty() {
                    return Ok(0);
                }
                let ids: Vec<String> =
                    grants.iter().map(|g| g.permission_id.to_string()).collect();

                let mut count_result = self
                    .db
                    .query(
                        "SELECT count() AS total FROM group_permission \
                         WHERE group_id = $id AND permission_id IN $ids GROUP ALL",
                    )
                    .bind(("id", group_id_str.clone()))
                    .bind(("ids", ids.clone()))
                    .await
                    .map_err(DbError::from)?;
                let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
                let removed = count_rows.first().map(|r| r.total).unwrap_or(0);

                self.db
                    .query(
                        "DELETE group_permission \
                         WHERE group_id = $id AND permission_id IN $ids",
                    )
                    .bind(("id", group_id_str))
                    .bind(("ids", ids))
                    .await
                    .map_err(DbError::from)?;

                Ok(removed)
            }
            LinkMode::Replace => {
                let rows = Self::link_rows(group_id, grants);
                let inserted = rows.len() as u64;

                // Delete-all-then-recreate in one transaction; a partial
                // replacement is never observable.
                let query = if rows.is_empty() {
                    "BEGIN TRANSACTION; \
                     DELETE group_permission WHERE group_id = $id; \
                     COMMIT TRANSACTION;"
                } else {
                    "BEGIN TRANSACTION; \
                     DELETE group_permission WHERE group_id = $id; \
                     INSERT IGNORE INTO group_permission $rows; \
                     COMMIT TRANSACTION;"
                };

                let mut builder = self.db.query(query).bind(("id", group_id_str));
                if !rows.is_empty() {
                    builder = builder.bind(("rows", rows));
                }

                builder
                    .await
                    .map_err(DbError::from)?
                    .check()
                    .map_err(DbError::from)?;

                Ok(inserted)
            }
        }
    }
}
