use thiserror::Error;

/// Record store failures.
///
/// When one of these is returned from a step that follows a successful
/// sensor operation, the sensor and the store disagree until someone
/// reconciles them by hand.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An identity with this id already exists.
    #[error("Fingerprint id {id} is already enrolled")]
    DuplicateId { id: i64 },

    /// The database could not be reached or the pool is gone.
    #[error("Store connection lost: {0}")]
    ConnectionLost(String),

    /// A CHECK, NOT NULL or UNIQUE constraint rejected the write.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Migration execution failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Invalid database configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Any other query failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    /// Whether this error means the database itself was unreachable.
    pub fn is_connection_lost(&self) -> bool {
        matches!(self, Self::ConnectionLost(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                Self::ConstraintViolation(db.message().to_string())
            }
            sqlx::Error::Database(ref db)
                if db.is_check_violation() || db.is_foreign_key_violation() =>
            {
                Self::ConstraintViolation(db.message().to_string())
            }
            sqlx::Error::Database(ref db) if db.message().contains("constraint failed") => {
                Self::ConstraintViolation(db.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::ConnectionLost(err.to_string()),
            other => Self::Database(other),
        }
    }
}

/// Whether `err` is a primary key or unique index collision.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_unique_violation() || db.message().contains("UNIQUE constraint failed")
        }
        _ => false,
    }
}

/// Specialized result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
