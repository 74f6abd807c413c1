//! Error taxonomy shared by every catalog backend.

use thiserror::Error;

/// Errors produced by catalog operations.
///
/// `Conflict` is raised by backends when a category insert loses a
/// uniqueness race. Callers inside this workspace resolve it as a lookup;
/// it never reaches the facade's callers.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Bad or missing input. Detected before any mutation.
    #[error("invalid {field}: {reason}")]
    Validation {
        field: &'static str,
        reason: &'static str,
    },

    /// No item with this id exists.
    #[error("item not found: {0}")]
    NotFound(i64),

    /// A category with this name was created concurrently.
    #[error("category already exists: {0}")]
    Conflict(String),

    /// The operation's cancellation signal fired before it committed.
    #[error("operation cancelled")]
    Cancelled,

    /// I/O, database, or serialization failure in the backing store.
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),
}

impl CatalogError {
    pub fn validation(field: &'static str, reason: &'static str) -> Self {
        Self::Validation { field, reason }
    }

    pub fn storage(err: impl Into<anyhow::Error>) -> Self {
        Self::Storage(err.into())
    }

    /// True for failures the caller cannot fix by changing its input.
    pub fn is_fault(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Conflict(_))
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        Self::storage(err)
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        Self::storage(err)
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = CatalogError::validation("category", "must not be empty");
        assert_eq!(err.to_string(), "invalid category: must not be empty");
        assert!(!err.is_fault());
    }

    #[test]
    fn test_io_errors_become_storage_faults() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: CatalogError = io.into();
        assert!(matches!(err, CatalogError::Storage(_)));
        assert!(err.is_fault());
        assert!(err.to_string().contains("read-only"));
    }
}
