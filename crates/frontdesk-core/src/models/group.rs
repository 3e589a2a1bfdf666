//! User group domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FrontdeskError, FrontdeskResult};

pub const MAX_GROUP_NAME_LEN: usize = 100;

/// A named bundle of permissions assignable to many users.
///
/// Each user belongs to exactly one group; per-user overrides sit on
/// top of the group's grants. An inactive group contributes no grants
/// during resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGroup {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateGroup {
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

impl CreateGroup {
    pub fn validate(&self) -> FrontdeskResult<()> {
        validate_group_name(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateGroup {
    pub name: Option<String>,
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

pub fn validate_group_name(name: &str) -> FrontdeskResult<()> {
    if name.is_empty() || name.chars().count() > MAX_GROUP_NAME_LEN {
        return Err(FrontdeskError::Validation {
            message: format!(
                "group name must be 1-{MAX_GROUP_NAME_LEN} characters, got {} in {name:?}",
                name.chars().count()
            ),
        });
    }
    Ok(())
}
