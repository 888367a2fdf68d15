//! Error types for the data-access layer.

use thiserror::Error;

/// Errors raised while building or executing statements.
#[derive(Error, Debug)]
pub enum DbError {
    /// INSERT or UPDATE without any column values.
    #[error("{0} requires at least one column value")]
    EmptyData(&'static str),

    /// UPDATE or DELETE without a WHERE clause.
    #[error("{0} requires at least one WHERE condition")]
    MissingWhere(&'static str),

    /// Table or column name that is not a plain SQL identifier.
    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    /// `commit`/`rollback` without a preceding `begin`.
    #[error("No active transaction")]
    NoActiveTransaction,

    /// `begin` while a transaction is already open.
    #[error("A transaction is already active")]
    TransactionAlreadyActive,

    /// Error reported by the database driver, unmodified.
    #[error("Database error: {0}")]
    Driver(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A row could not be converted into the requested type.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl DbError {
    /// True for errors raised before any SQL reached the database.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            DbError::EmptyData(_) | DbError::MissingWhere(_) | DbError::InvalidIdentifier(_)
        )
    }
}

/// Result type alias for data-access operations.
pub type DbResult<T> = Result<T, DbError>;

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Decode(err.to_string())
    }
}
