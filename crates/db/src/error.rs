//! Typed error type for the db crate.

use sqlx::error::ErrorKind;
use thiserror::Error;

use crate::library::Operation;

/// Name of the unique index that guards `borrower.ssn`.
pub const BORROWER_SSN_CONSTRAINT: &str = "borrower_ssn_key";

/// SQLSTATE `undefined_table`, also raised for a missing sequence.
const UNDEFINED_TABLE: &str = "42P01";

#[derive(Debug, Error)]
pub enum DbError {
    /// The connection factory could not hand out a connection.
    #[error("database connection unavailable: {0}")]
    ConnectionUnavailable(#[source] sqlx::Error),

    #[error("invalid database configuration: {0}")]
    InvalidConfig(String),

    /// Unique, foreign-key, not-null or check constraint rejected a write.
    #[error("constraint '{constraint}' violated: {message}")]
    ConstraintViolation { constraint: String, message: String },

    #[error("row not found")]
    NotFound,

    /// A table or sequence the client relies on is missing; `migrate` has
    /// not been applied to this database.
    #[error("schema not migrated: {0}")]
    SchemaNotMigrated(String),

    /// Any other statement failure, including errors raised by stored procedures.
    #[error("statement execution failed: {0}")]
    ExecutionFailed(#[source] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Classify an error returned while a statement was executing.
    pub fn from_execution(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => Self::ConnectionUnavailable(err),
            sqlx::Error::Database(db) => match db.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => Self::ConstraintViolation {
                    constraint: db.constraint().unwrap_or("unknown").to_owned(),
                    message: db.message().to_owned(),
                },
                _ if db.code().as_deref() == Some(UNDEFINED_TABLE) => {
                    Self::SchemaNotMigrated(db.message().to_owned())
                }
                _ => Self::ExecutionFailed(sqlx::Error::Database(db)),
            },
            other => Self::ExecutionFailed(other),
        }
    }

    /// The conflict reported when a borrower with the same SSN already exists.
    pub fn duplicate_ssn() -> Self {
        Self::ConstraintViolation {
            constraint: BORROWER_SSN_CONSTRAINT.to_owned(),
            message: "a borrower with this SSN already exists".to_owned(),
        }
    }

    pub fn is_duplicate_ssn(&self) -> bool {
        matches!(self, Self::ConstraintViolation { constraint, .. } if constraint == BORROWER_SSN_CONSTRAINT)
    }

    /// Human-readable failure string shown to end users of `op`.
    pub fn user_message(&self, op: Operation) -> &'static str {
        match self {
            Self::ConnectionUnavailable(_) | Self::InvalidConfig(_) => "Database connection failed.",
            err if err.is_duplicate_ssn() => "Error: A borrower with this SSN already exists.",
            Self::SchemaNotMigrated(_) => {
                "Error: database schema is out of date; run `library-client migrate` first."
            }
            _ => op.failure_message(),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        Self::from_execution(err)
    }
}
