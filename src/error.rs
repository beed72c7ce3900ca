//! Error type shared by every storage operation.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors returned by the storage, its resolvers and its configuration.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No key resolver is registered for the key's type.
    #[error("no key resolver found for key type {type_name}")]
    UnknownKeyType { type_name: &'static str },
    /// No value resolver is registered for the value's type.
    #[error("no value resolver found for value type {type_name}")]
    UnknownValueType { type_name: &'static str },
    /// A stored key could not be turned back into its typed form.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },
    /// The SQLite driver reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A value could not be encoded or decoded as JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The configuration could not be read, parsed or validated.
    #[error("configuration error: {message}")]
    Config { message: String },
    /// The storage has been shut down.
    #[error("storage is closed")]
    Closed,
    /// The blocking worker running the operation failed.
    #[error("storage worker failed: {message}")]
    Worker { message: String },
}

impl StorageError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_key(key: &str, reason: impl ToString) -> Self {
        Self::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_key_type_names_the_type() {
        let err = StorageError::UnknownKeyType {
            type_name: "alloc::string::String",
        };
        assert_eq!(
            err.to_string(),
            "no key resolver found for key type alloc::string::String"
        );
    }

    #[test]
    fn sqlite_errors_convert() {
        let err: StorageError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StorageError::Sqlite(_)));
    }
}
