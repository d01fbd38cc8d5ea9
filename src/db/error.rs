use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database connection error: {0}")]
    Connection(String),
    #[error("database migration error: {0}")]
    Migration(String),
    #[error("database query error: {0}")]
    Query(String),
    #[error("database constraint violated: {0}")]
    Conflict(String),
}

/// Maps a diesel error, keeping constraint violations distinguishable from
/// other failures so the web layer can answer with a conflict.
pub(crate) fn query_error(err: DieselError) -> DatabaseError {
    match err {
        DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation | DatabaseErrorKind::ForeignKeyViolation,
            info,
        ) => DatabaseError::Conflict(info.message().to_string()),
        other => DatabaseError::Query(other.to_string()),
    }
}
