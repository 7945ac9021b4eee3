use thiserror::Error;

/// Errors raised by the database handle.
///
/// Every failure surfaces to the caller as-is; nothing is retried.
#[derive(Debug, Error)]
pub enum DbError {
    /// Missing or malformed connection settings. Raised before any I/O.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The driver failed to open the connection.
    #[error("Could not construct database connection: {message}")]
    Connection { code: i32, message: String },
    /// The driver rejected a prepared or executed statement.
    #[error("{0}")]
    Query(String),
    /// The driver refused to begin, commit or roll back a transaction.
    #[error("transaction error: {0}")]
    Transaction(String),
    /// An operation needed a statement and none was available.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// A storage timestamp was not in `YYYY-MM-DD HH:MM:SS` form.
    #[error("invalid storage timestamp {input:?}: {reason}")]
    Parse { input: String, reason: String },
}

impl DbError {
    /// Driver result code carried by a connection failure.
    pub fn code(&self) -> Option<i32> {
        match self {
            DbError::Connection { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DbError>;
