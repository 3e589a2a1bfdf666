//! SurrealDB implementation of [`UserRepository`].
//!
//! Password hashing uses Argon2id with OWASP-recommended parameters
//! (memory: 19 MiB, iterations: 2, parallelism: 1). Salt is randomly
//! generated per hash. An optional pepper (server-side secret) can be
//! provided at construction time.

use std::collections::HashMap;

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use frontdesk_core::error::FrontdeskResult;
use frontdesk_core::models::grant::{GrantSpec, LinkMode, PermissionGrant};
use frontdesk_core::models::permission::Permission;
use frontdesk_core::models::user::{CreateUser, DeleteOutcome, UpdateUser, User};
use frontdesk_core::store::{PaginatedResult, Pagination, UserRepository};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;

use crate::error::DbError;

/// DB-side row struct for queries where the UUID is already known.
#[derive(Debug, SurrealValue)]
struct UserRow {
    username: String,
    email: String,
    full_name: Option<String>,
    password_hash: String,
    group_id: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self, id: Uuid) -> Result<User, DbError> {
        let group_id = self
            .group_id
            .map(|raw| {
                Uuid::parse_str(&raw).map_err(|e| DbError::Decode(format!("invalid group UUID: {e}")))
            })
            .transpose()?;
        Ok(User {
            id,
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            password_hash: self.password_hash,
            group_id,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct UserRowWithId {
    record_id: String,
    username: String,
    email: String,
    full_name: Option<String>,
    password_hash: String,
    group_id: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRowWithId {
    fn try_into_user(self) -> Result<User, DbError> {
        let id = Uuid::parse_str(&self.record_id)
            .map_err(|e| DbError::Decode(format!("invalid UUID: {e}")))?;
        let group_id = self
            .group_id
            .map(|raw| {
                Uuid::parse_str(&raw).map_err(|e| DbError::Decode(format!("invalid group UUID: {e}")))
            })
            .transpose()?;
        Ok(User {
            id,
            username: self.username,
            email: self.email,
            full_name: self.full_name,
            password_hash: self.password_hash,
            group_id,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Join-table row for override queries.
#[derive(Debug, SurrealValue)]
struct GrantRow {
    permission_id: String,
    is_allowed: bool,
}

/// Row struct for batch link inserts.
#[derive(Debug, SurrealValue)]
struct UserPermissionInsert {
    user_id: String,
    permission_id: String,
    is_allowed: bool,
}

/// Permission row joined back for override queries.
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

/// Hash a password with Argon2id using OWASP-recommended parameters.
///
/// If a pepper is provided, it is prepended to the password before
/// hashing. The salt is randomly generated for each call.
fn hash_password(password: &str, pepper: Option<&str>) -> Result<String, DbError> {
    // OWASP ASVS recommended: m=19456 (19 MiB), t=2, p=1
    let params = argon2::Params::new(19456, 2, 1, None)
        .map_err(|e| DbError::Internal(format!("argon2 params error: {e}")))?;
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let peppered: String;
    let input = match pepper {
        Some(p) => {
            peppered = format!("{p}{password}");
            peppered.as_bytes()
        }
        None => password.as_bytes(),
    };

    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = argon2
        .hash_password(input, &salt)
        .map_err(|e| DbError::Internal(format!("password hash error: {e}")))?;

    Ok(hash.to_string())
}

/// SurrealDB implementation of the User repository.
#[derive(Clone)]
pub struct SurrealUserRepository<C: Connection> {
    db: Surreal<C>,
    /// Optional server-side pepper for password hashing.
    pepper: Option<String>,
}

impl<C: Connection> SurrealUserRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db, pepper: None }
    }

    pub fn with_pepper(db: Surreal<C>, pepper: String) -> Self {
        Self {
            db,
            pepper: Some(pepper),
        }
    }

    async fn group_exists(&self, group_id: Uuid) -> Result<bool, DbError> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM user_group \
                 WHERE id = type::record('user_group', $id) GROUP ALL",
            )
            .bind(("id", group_id.to_string()))
            .await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    async fn field_taken(
        &self,
        field: &'static str,
        value: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, DbError> {
        let query = match exclude {
            Some(_) => format!(
                "SELECT count() AS total FROM user \
                 WHERE {field} = $value \
                 AND id != type::record('user', $exclude) GROUP ALL"
            ),
            None => format!("SELECT count() AS total FROM user WHERE {field} = $value GROUP ALL"),
        };

        let mut builder = self.db.query(&query).bind(("value", value.to_string()));
        if let Some(exclude) = exclude {
            builder = builder.bind(("exclude", exclude.to_string()));
        }

        let mut result = builder.await?;
        let rows: Vec<CountRow> = result.take(0)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0) > 0)
    }

    fn link_rows(user_id: Uuid, grants: &[GrantSpec]) -> Vec<UserPermissionInsert> {
        grants
            .iter()
            .map(|grant| UserPermissionInsert {
                user_id: user_id.to_string(),
                permission_id: grant.permission_id.to_string(),
                is_allowed: grant.is_allowed,
            })
            .collect()
    }
}

impl<C: Connection> UserRepository for SurrealUserRepository<C> {
    async fn create(&self, input: CreateUser) -> FrontdeskResult<User> {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        if self.field_taken("username", &input.username, None).await? {
            return Err(DbError::Conflict {
                entity: "user".into(),
                reason: format!("username {:?} already exists", input.username),
                blocking: vec![input.username],
            }
            .into());
        }
        if self.field_taken("email", &input.email, None).await? {
            return Err(DbError::Conflict {
                entity: "user".into(),
                reason: format!("email {:?} already exists", input.email),
                blocking: vec![input.email],
            }
            .into());
        }
        if let Some(group_id) = input.group_id
            && !self.group_exists(group_id).await?
        {
            return Err(DbError::NotFound {
                entity: "user_group".into(),
                id: group_id.to_string(),
            }
            .into());
        }

        let password_hash = hash_password(&input.password, self.pepper.as_deref())?;

        let result = self
            .db
            .query(
                "CREATE type::record('user', $id) SET \
                 username = $username, email = $email, \
                 full_name = $full_name, \
                 password_hash = $password_hash, \
                 group_id = $group_id, \
                 is_active = true",
            )
            .bind(("id", id_str.clone()))
            .bind(("username", input.username))
            .bind(("email", input.email))
            .bind(("full_name", input.full_name))
            .bind(("password_hash", password_hash))
            .bind(("group_id", input.group_id.map(|g| g.to_string())))
            .await
            .map_err(DbError::from)?;

        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn get_by_id(&self, id: Uuid) -> FrontdeskResult<User> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT * FROM type::record('user', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn get_by_username(&self, username: &str) -> FrontdeskResult<User> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE username = $username",
            )
            .bind(("username", username.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: username.to_string(),
        })?;

        Ok(row.try_into_user()?)
    }

    async fn get_by_email(&self, email: &str) -> FrontdeskResult<User> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 WHERE email = $email",
            )
            .bind(("email", email.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: email.to_string(),
        })?;

        Ok(row.try_into_user()?)
    }

    async fn update(&self, id: Uuid, input: UpdateUser) -> FrontdeskResult<User> {
        let id_str = id.to_string();

        if let Some(username) = &input.username
            && self.field_taken("username", username, Some(id)).await?
        {
            return Err(DbError::Conflict {
                entity: "user".into(),
                reason: format!("username {username:?} already exists"),
                blocking: vec![username.clone()],
            }
            .into());
        }
        if let Some(email) = &input.email
            && self.field_taken("email", email, Some(id)).await?
        {
            return Err(DbError::Conflict {
                entity: "user".into(),
                reason: format!("email {email:?} already exists"),
                blocking: vec![email.clone()],
            }
            .into());
        }
        if let Some(Some(group_id)) = input.group_id
            && !self.group_exists(group_id).await?
        {
            return Err(DbError::NotFound {
                entity: "user_group".into(),
                id: group_id.to_string(),
            }
            .into());
        }

        let mut sets = Vec::new();
        if input.username.is_some() {
            sets.push("username = $username");
        }
        if input.email.is_some() {
            sets.push("email = $email");
        }
        if input.full_name.is_some() {
            sets.push("full_name = $full_name");
        }
        if input.group_id.is_some() {
            sets.push("group_id = $group_id");
        }
        if input.is_active.is_some() {
            sets.push("is_active = $is_active");
        }
        sets.push("updated_at = time::now()");

        let query = format!("UPDATE type::record('user', $id) SET {}", sets.join(", "));

        let mut builder = self.db.query(&query).bind(("id", id_str.clone()));

        if let Some(username) = input.username {
            builder = builder.bind(("username", username));
        }
        if let Some(email) = input.email {
            builder = builder.bind(("email", email));
        }
        if let Some(full_name) = input.full_name {
            builder = builder.bind(("full_name", full_name));
        }
        if let Some(group_id) = input.group_id {
            builder = builder.bind(("group_id", group_id.map(|g| g.to_string())));
        }
        if let Some(is_active) = input.is_active {
            builder = builder.bind(("is_active", is_active));
        }

        let result = builder.await.map_err(DbError::from)?;
        let mut result = result.check().map_err(DbError::from)?;

        let rows: Vec<UserRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "user".into(),
            id: id_str,
        })?;

        Ok(row.into_user(id)?)
    }

    async fn delete(&self, id: Uuid) -> FrontdeskResult<DeleteOutcome> {
        // Existence check up front so a missing user is NotFound, not a
        // silent no-op.
        self.get_by_id(id).await?;

        let owned = self.owned_record_count(id).await?;
        if owned > 0 {
            // Historical records keep their owner; downgrade to a
            // deactivation and report it.
            self.db
                .query(
                    "UPDATE type::record('user', $id) SET \
                     is_active = false, updated_at = time::now()",
                )
                .bind(("id", id.to_string()))
                .await
                .map_err(DbError::from)?
                .check()
                .map_err(DbError::from)?;

            return Ok(DeleteOutcome::Deactivated);
        }

        // Override rows go with the user.
        self.db
            .query(
                "BEGIN TRANSACTION; \
                 DELETE user_permission WHERE user_id = $id; \
                 DELETE type::record('user', $id); \
                 COMMIT TRANSACTION;",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        Ok(DeleteOutcome::Deleted)
    }

    async fn list(&self, pagination: Pagination) -> FrontdeskResult<PaginatedResult<User>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM user GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM user \
                 ORDER BY created_at ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<UserRowWithId> = result.take(0).map_err(DbError::from)?;

        let items = rows
            .into_iter()
            .map(UserRowWithId::try_into_user)
            .collect::<Result<Vec<_>, DbError>>()?;

        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn owned_record_count(&self, id: Uuid) -> FrontdeskResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM owned_by \
                 WHERE out = type::record('user', $id) GROUP ALL",
            )
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn permissions(&self, user_id: Uuid) -> FrontdeskResult<Vec<PermissionGrant>> {
        let mut result = self
            .db
            .query(
                "SELECT permission_id, is_allowed FROM user_permission \
                 WHERE user_id = $id",
            )
            .bind(("id", user_id.to_string()))
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

    async fn upsert_permission(&self, user_id: Uuid, grant: GrantSpec) -> FrontdeskResult<()> {
        let user_id_str = user_id.to_string();
        let permission_id_str = grant.permission_id.to_string();

        let mut check = self
            .db
            .query(
                "SELECT count() AS total FROM user_permission \
                 WHERE user_id = $user_id AND permission_id = $permission_id \
                 GROUP ALL",
            )
            .bind(("user_id", user_id_str.clone()))
            .bind(("permission_id", permission_id_str.clone()))
            .await
            .map_err(DbError::from)?;
        let rows: Vec<CountRow> = check.take(0).map_err(DbError::from)?;
        let exists = rows.first().map(|r| r.total).unwrap_or(0) > 0;

        let query = if exists {
            "UPDATE user_permission SET is_allowed = $is_allowed \
             WHERE user_id = $user_id AND permission_id = $permission_id"
        } else {
            "CREATE user_permission SET user_id = $user_id, \
             permission_id = $permission_id, is_allowed = $is_allowed"
        };

        self.db
            .query(query)
            .bind(("user_id", user_id_str))
            .bind(("permission_id", permission_id_str))
            .bind(("is_allowed", grant.is_allowed))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(DbError::from)?;

        Ok(())
    }

    async fn link_permissions(
        &self,
        user_id: Uuid,
        grants: &[GrantSpec],
        mode: LinkMode,
    ) -> FrontdeskResult<u64> {
        let user_id_str = user_id.to_string();

        match mode {
            LinkMode::Add => {
                if grants.is_empty() {
                    return Ok(0);
                }
                let rows = Self::link_rows(user_id, grants);

                let mut result = self
                    .db
                    .query("INSERT IGNORE INTO user_permission $rows")
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
                        "SELECT count() AS total FROM user_permission \
                         WHERE user_id = $id AND permission_id IN $ids GROUP ALL",
                    )
                    .bind(("id", user_id_str.clone()))
                    .bind(("ids", ids.clone()))
                    .await
                    .map_err(DbError::from)?;
                let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
                let removed = count_rows.first().map(|r| r.total).unwrap_or(0);

                self.db
                    .query(
                        "DELETE user_permission \
                         WHERE user_id = $id AND permission_id IN $ids",
                    )
                    .bind(("id", user_id_str))
                    .bind(("ids", ids))
                    .await
                    .map_err(DbError::from)?;

                Ok(removed)
            }
            LinkMode::Replace => {
                let rows = Self::link_rows(user_id, grants);
                let inserted = rows.len() as u64;

                let query = if rows.is_empty() {
                    "BEGIN TRANSACTION; \
                     DELETE user_permission WHERE user_id = $id; \
                     COMMIT TRANSACTION;"
                } else {
                    "BEGIN TRANSACTION; \
                     DELETE user_permission WHERE user_id = $id; \
                     INSERT IGNORE INTO user_permission $rows; \
                     COMMIT TRANSACTION;"
                };

                let mut builder = self.db.query(query).bind(("id", user_id_str));
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
