//! Error type shared by the Hanja crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// SQLite primary result codes for busy/locked databases
const SQLITE_BUSY: &str = "5";
const SQLITE_LOCKED: &str = "6";

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite / sqlx failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Batch file, report or JSON column could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unreadable config file or a value outside its domain
    #[error("Configuration error: {0}")]
    Config(String),

    /// No dictionary entry (or other resource) under the given key
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied an unusable value (element name, page, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Corrupt stored value or exhausted retries
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// SQLite reported SQLITE_BUSY / SQLITE_LOCKED
    ///
    /// Falls back to the message text for errors that carry no result code.
    pub fn is_lock_contention(&self) -> bool {
        let Error::Database(err) = self else {
            return false;
        };

        if let Some(code) = err.as_database_error().and_then(|db| db.code()) {
            let primary = code.parse::<i64>().map(|c| (c & 0xff).to_string());
            if let Ok(primary) = primary {
                return primary == SQLITE_BUSY || primary == SQLITE_LOCKED;
            }
        }

        let message = err.to_string();
        message.contains("database is locked") || message.contains("database table is locked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_contention_detected_from_message() {
        let err = Error::Database(sqlx::Error::Protocol("database is locked".to_string()));
        assert!(err.is_lock_contention());

        let err = Error::Database(sqlx::Error::RowNotFound);
        assert!(!err.is_lock_contention());

        assert!(!Error::Internal("database is locked".to_string()).is_lock_contention());
    }
}
