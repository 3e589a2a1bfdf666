//! Error types for the Frontdesk system.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontdeskError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// Duplicate key, or a delete blocked by live references. `blocking`
    /// lists the entities the caller has to resolve first.
    #[error("Conflict on {entity}: {reason}")]
    Conflict {
        entity: String,
        reason: String,
        blocking: Vec<String>,
    },

    /// Rejected before any store call was made.
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    /// Underlying persistence unreachable or a transaction failed.
    /// Permission checks hitting this must be treated as denied.
    #[error("Store error: {0}")]
    Store(String),

    #[error("Cryptography error: {0}")]
    Crypto(String),
}

pub type FrontdeskResult<T> = Result<T, FrontdeskError>;
