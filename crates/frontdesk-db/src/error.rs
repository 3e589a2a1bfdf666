//! Database-specific error types and conversions.

use frontdesk_core::error::FrontdeskError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Row decode failed: {0}")]
    Decode(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Conflict on {entity}: {reason}")]
    Conflict {
        entity: String,
        reason: String,
        blocking: Vec<String>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DbError> for FrontdeskError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => FrontdeskError::NotFound { entity, id },
            DbError::Conflict {
                entity,
                reason,
                blocking,
            } => FrontdeskError::Conflict {
                entity,
                reason,
                blocking,
            },
            // Transport and transaction failures surface as store
            // errors; permission checks hitting them must fail closed.
            other => FrontdeskError::Store(other.to_string()),
        }
    }
}
