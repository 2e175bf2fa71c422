//! Storage error types for the consent repository layer.

use std::fmt;

use consent_store_core::ConsentError;

/// Errors that can occur during repository operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested consent was not found.
    #[error("Consent not found: {id}")]
    NotFound {
        /// The ID of the consent that was not found.
        id: String,
    },

    /// Attempted to insert a consent whose ID is already taken.
    #[error("Consent already exists: {id}")]
    AlreadyExists {
        /// The conflicting ID.
        id: String,
    },

    /// A conditional update was applied against a stale version.
    #[error("Version conflict on consent {id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// The ID of the consent being updated.
        id: String,
        /// The version the caller read.
        expected: u64,
        /// The version currently stored.
        actual: u64,
    },

    /// A live consent already holds this idempotency key for the client.
    #[error(
        "Idempotency key '{idempotency_key}' of client '{owning_client_id}' is held by consent {existing_id}"
    )]
    IdempotencyKeyConflict {
        /// The client that owns both requests.
        owning_client_id: String,
        /// The duplicated key.
        idempotency_key: String,
        /// The consent currently holding the key.
        existing_id: String,
    },

    /// The record cannot be stored as given.
    #[error("Invalid record: {message}")]
    InvalidRecord {
        /// Description of why the record is invalid.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(id: impl Into<String>) -> Self {
        Self::AlreadyExists { id: id.into() }
    }

    /// Creates a new `VersionConflict` error.
    #[must_use]
    pub fn version_conflict(id: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::VersionConflict {
            id: id.into(),
            expected,
            actual,
        }
    }

    /// Creates a new `IdempotencyKeyConflict` error.
    #[must_use]
    pub fn idempotency_key_conflict(
        owning_client_id: impl Into<String>,
        idempotency_key: impl Into<String>,
        existing_id: impl Into<String>,
    ) -> Self {
        Self::IdempotencyKeyConflict {
            owning_client_id: owning_client_id.into(),
            idempotency_key: idempotency_key.into(),
            existing_id: existing_id.into(),
        }
    }

    /// Creates a new `InvalidRecord` error.
    #[must_use]
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a version conflict error.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// Returns `true` if this is an idempotency key conflict.
    #[must_use]
    pub fn is_idempotency_key_conflict(&self) -> bool {
        matches!(self, Self::IdempotencyKeyConflict { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::AlreadyExists { .. }
            | Self::VersionConflict { .. }
            | Self::IdempotencyKeyConflict { .. } => ErrorCategory::Conflict,
            Self::InvalidRecord { .. } => ErrorCategory::Validation,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

impl From<StorageError> for ConsentError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound { id } => ConsentError::not_found(id),
            StorageError::VersionConflict { id, .. } => ConsentError::concurrent_modification(id),
            StorageError::InvalidRecord { message } => ConsentError::validation(message),
            other => ConsentError::storage(other.to_string()),
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Record not found.
    NotFound,
    /// Conflict (version, id or idempotency key).
    Conflict,
    /// Validation error.
    Validation,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Conflict => write!(f, "conflict"),
            Self::Validation => write!(f, "validation"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::not_found("c-1");
        assert_eq!(err.to_string(), "Consent not found: c-1");

        let err = StorageError::version_conflict("c-1", 1, 2);
        assert_eq!(
            err.to_string(),
            "Version conflict on consent c-1: expected 1, found 2"
        );

        let err = StorageError::idempotency_key_conflict("tpp-a", "k1", "c-7");
        assert!(err.to_string().contains("c-7"));
    }

    #[test]
    fn test_error_predicates() {
        let err = StorageError::not_found("c-1");
        assert!(err.is_not_found());
        assert!(!err.is_version_conflict());

        let err = StorageError::version_conflict("c-1", 1, 2);
        assert!(err.is_version_conflict());
        assert!(!err.is_idempotency_key_conflict());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            StorageError::not_found("c").category(),
            ErrorCategory::NotFound
        );
        assert_eq!(
            StorageError::already_exists("c").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::idempotency_key_conflict("a", "k", "c").category(),
            ErrorCategory::Conflict
        );
        assert_eq!(
            StorageError::invalid_record("bad").category(),
            ErrorCategory::Validation
        );
    }

    #[test]
    fn test_conversion_into_consent_error() {
        let err: ConsentError = StorageError::not_found("c-1").into();
        assert!(err.is_not_found());

        let err: ConsentError = StorageError::version_conflict("c-1", 3, 4).into();
        assert!(matches!(err, ConsentError::ConcurrentModification { ref id } if id == "c-1"));

        let err: ConsentError = StorageError::internal("disk full").into();
        assert!(matches!(err, ConsentError::Storage(ref msg) if msg.contains("disk full")));
    }
}
