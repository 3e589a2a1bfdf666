//! User domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub password_hash: String,
    /// The group whose grants form this actor's base permission layer.
    /// `None` only transitionally (e.g. mid-reassignment).
    pub group_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    /// Raw password (hashed with Argon2id before storage).
    pub password: String,
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateUser {
    pub username: Option<String>,
    pub email: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub full_name: Option<Option<String>>,
    /// `Some(Some(id))` = assign, `Some(None)` = detach, `None` = no change.
    pub group_id: Option<Option<Uuid>>,
    pub is_active: Option<bool>,
}

/// Result of a user deletion request.
///
/// Users owning historical records (bookings, created hotels or rooms)
/// are never hard-deleted; the request downgrades to a deactivation and
/// reports that it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteOutcome {
    Deleted,
    Deactivated,
}
