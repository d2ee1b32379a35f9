//! Error types for the dedup store client

use thiserror::Error;

/// Result type for dedup store operations
pub type DedupResult<T> = Result<T, DedupError>;

/// Errors that can occur while reading or writing dedup records
#[derive(Error, Debug)]
pub enum DedupError {
    /// The conditional insert failed because a record for this event ID exists.
    ///
    /// Not a storage failure: another writer (or an earlier delivery) got there first.
    #[error("Processed event record already exists: {0}")]
    AlreadyExists(String),

    /// Database operation failed (connection, query execution, etc.)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Event ID validation failed (empty, too long)
    #[error("Invalid event ID: {0}")]
    InvalidEventId(String),

    /// Generic error with context
    #[error("{0:#}")]
    Other(#[from] anyhow::Error),
}

impl DedupError {
    /// Check if the conditional insert lost to an existing record
    pub fn is_already_exists(&self) -> bool {
        matches!(self, DedupError::AlreadyExists(_))
    }

    /// Check if error is a unique key violation on insert
    ///
    /// The insert uses ON CONFLICT DO NOTHING, so this only shows up if a
    /// conflicting row slips past the conflict target.
    pub fn is_duplicate_key(&self) -> bool {
        self.sqlx_error()
            .and_then(|sqlx_err| sqlx_err.as_database_error())
            // PostgreSQL unique violation error code: 23505
            .map(|db_err| db_err.code().as_deref() == Some("23505"))
            .unwrap_or(false)
    }

    /// Check if error is transient (should retry)
    ///
    /// Covers pool and connection failures and PostgreSQL conditions that
    /// clear up on their own (failover, connection limits, serialization).
    pub fn is_transient(&self) -> bool {
        match self.sqlx_error() {
            Some(
                sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::Io(_)
                | sqlx::Error::WorkerCrashed,
            ) => true,
            Some(sqlx::Error::Database(db_err)) => db_err
                .code()
                .map(|code| is_transient_sqlstate(&code))
                .unwrap_or(false),
            _ => false,
        }
    }

    fn sqlx_error(&self) -> Option<&sqlx::Error> {
        match self {
            DedupError::Database(err) => Some(err),
            DedupError::Other(err) => err.downcast_ref::<sqlx::Error>(),
            _ => None,
        }
    }
}

/// SQLSTATE codes worth retrying
fn is_transient_sqlstate(code: &str) -> bool {
    matches!(
        code,
        // admin_shutdown, crash_shutdown, cannot_connect_now
        "57P01" | "57P02" | "57P03"
        // too_many_connections
        | "53300"
        // serialization_failure, deadlock_detected
        | "40001" | "40P01"
    ) || code.starts_with("08") // connection exception class
}
