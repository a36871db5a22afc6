//! Error handling for the Harmony sync backend
//!
//! Every store, sink and gate operation reports failures through
//! [`SyncError`]. Malformed lines surface as `Decode` only at the codec
//! boundary; scanners swallow them and keep going.

use thiserror::Error;

/// Main error type for the sync backend
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Malformed record line: expected {expected} fields, found {found}")]
    Decode {
        line: String,
        expected: usize,
        found: usize,
    },

    #[error("Resource not found: {resource} - {id}")]
    NotFound { resource: String, id: String },

    #[error("Storage unavailable: {path}")]
    StorageUnavailable { path: String },

    #[error("Storage operation failed: {operation}")]
    Storage {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid field {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Mutex lock failed: {resource}")]
    MutexPoisoned { resource: String },
}

/// Type alias for Result with SyncError
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// Create a decode error for a line with the wrong arity
    pub fn decode(line: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::Decode {
            line: line.into(),
            expected,
            found,
        }
    }

    /// Create a not found error
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a storage unavailable error
    pub fn storage_unavailable(path: impl AsRef<std::path::Path>) -> Self {
        Self::StorageUnavailable {
            path: path.as_ref().display().to_string(),
        }
    }

    /// Create a storage (write) error
    pub fn storage(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Storage {
            operation: operation.into(),
            source,
        }
    }

    /// Create an invalid field error
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Helper trait for safe mutex operations
///
/// Returns a `MutexPoisoned` error naming the guarded resource instead of
/// panicking on a poisoned lock.
pub trait SafeLock<T: ?Sized> {
    fn safe_lock(&self, resource: &str) -> SyncResult<std::sync::MutexGuard<'_, T>>;
}

impl<T: ?Sized> SafeLock<T> for std::sync::Mutex<T> {
    fn safe_lock(&self, resource: &str) -> SyncResult<std::sync::MutexGuard<'_, T>> {
        self.lock().map_err(|_| SyncError::MutexPoisoned {
            resource: resource.to_string(),
        })
    }
}

/// Convert from serde_json errors
impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::serialization("json_operation", err)
    }
}

/// Convert from figment errors
impl From<figment::Error> for SyncError {
    fn from(err: figment::Error) -> Self {
        SyncError::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = SyncError::invalid_field("username", "contains '|'");
        assert!(err.to_string().contains("Invalid field username"));

        let err = SyncError::decode("a|b", 4, 2);
        assert!(err.to_string().contains("expected 4 fields, found 2"));
    }

    #[test]
    fn test_error_chaining() {
        use std::error::Error;

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err = SyncError::storage("rewriting user file", io_err);

        assert!(err.source().is_some());
        assert!(err.to_string().contains("Storage operation failed"));
    }

    #[test]
    fn test_poisoned_lock_is_reported() {
        let lock = std::sync::Arc::new(std::sync::Mutex::new(()));
        let poisoner = lock.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        match lock.safe_lock("user_file") {
            Err(SyncError::MutexPoisoned { resource }) => assert_eq!(resource, "user_file"),
            other => panic!("unexpected: {other:?}"),
        };
    }
}
