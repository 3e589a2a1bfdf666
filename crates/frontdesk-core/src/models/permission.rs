//! Permission domain model and key validation.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FrontdeskError, FrontdeskResult};

/// A grantable capability, identified by its `(module, action)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    /// Capability domain (e.g. `hotels`, `bookings`, `reports`).
    pub module: String,
    /// Operation within the module (e.g. `create`, `read`, `manage`).
    pub action: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    pub fn key(&self) -> PermissionKey {
        PermissionKey::new(&self.module, &self.action)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermission {
    pub module: String,
    pub action: String,
    pub description: Option<String>,
}

impl CreatePermission {
    /// Check both name parts against the naming rule before any store
    /// call is made.
    pub fn validate(&self) -> FrontdeskResult<()> {
        validate_name_part("module", &self.module)?;
        validate_name_part("action", &self.action)
    }

    pub fn key(&self) -> PermissionKey {
        PermissionKey::new(&self.module, &self.action)
    }
}

/// Module and action are immutable after creation — renaming would
/// silently re-scope every existing grant.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdatePermission {
    /// `Some(Some(val))` = set, `Some(None)` = clear, `None` = no change.
    pub description: Option<Option<String>>,
}

/// A `(module, action)` pair — the identity of a capability.
///
/// Ordered so that effective-set merges iterate in a stable order.
/// Displays and parses as `module:action`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermissionKey {
    pub module: String,
    pub action: String,
}

impl PermissionKey {
    pub fn new(module: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            action: action.into(),
        }
    }

    pub fn validate(&self) -> FrontdeskResult<()> {
        validate_name_part("module", &self.module)?;
        validate_name_part("action", &self.action)
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.action)
    }
}

impl FromStr for PermissionKey {
    type Err = FrontdeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (module, action) = s.split_once(':').ok_or_else(|| FrontdeskError::Validation {
            message: format!("permission key must be module:action, got {s:?}"),
        })?;
        Ok(Self::new(module, action))
    }
}

/// A module or action name must start with an ASCII letter, followed by
/// letters, digits, or underscores.
pub fn validate_name_part(kind: &str, name: &str) -> FrontdeskResult<()> {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => {
            return Err(FrontdeskError::Validation {
                message: format!("{kind} must start with a letter: {name:?}"),
            });
        }
    }
    if let Some(c) = chars.find(|c| !c.is_ascii_alphanumeric() && *c != '_') {
        return Err(FrontdeskError::Validation {
            message: format!("{kind} contains invalid character {c:?}: {name:?}"),
        });
    }
    Ok(())
}
