use thiserror::Error;

use crate::status::ConsentStatus;

/// Errors surfaced by consent lifecycle operations
#[derive(Debug, Error)]
pub enum ConsentError {
    #[error("Consent not found: {id}")]
    NotFound { id: String },

    #[error("Client '{client_id}' is not permitted to access consent {id}")]
    InvalidPermissions { id: String, client_id: String },

    #[error("Invalid state transition for consent {id}: {from} -> {to}")]
    InvalidStateTransition {
        id: String,
        from: ConsentStatus,
        to: ConsentStatus,
    },

    #[error(
        "Idempotency key '{idempotency_key}' was already used for consent {existing_id} with a different request"
    )]
    IdempotencyError {
        existing_id: String,
        idempotency_key: String,
    },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Consent {id} was modified concurrently")]
    ConcurrentModification { id: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ConsentError {
    /// Create a new NotFound error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a new InvalidPermissions error
    pub fn invalid_permissions(id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self::InvalidPermissions {
            id: id.into(),
            client_id: client_id.into(),
        }
    }

    /// Create a new InvalidStateTransition error
    pub fn invalid_state_transition(
        id: impl Into<String>,
        from: ConsentStatus,
        to: ConsentStatus,
    ) -> Self {
        Self::InvalidStateTransition {
            id: id.into(),
            from,
            to,
        }
    }

    /// Create a new IdempotencyError carrying the id of the original consent
    pub fn idempotency(existing_id: impl Into<String>, idempotency_key: impl Into<String>) -> Self {
        Self::IdempotencyError {
            existing_id: existing_id.into(),
            idempotency_key: idempotency_key.into(),
        }
    }

    /// Create a new Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn concurrent_modification(id: impl Into<String>) -> Self {
        Self::ConcurrentModification { id: id.into() }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_invalid_permissions(&self) -> bool {
        matches!(self, Self::InvalidPermissions { .. })
    }

    pub fn is_invalid_state_transition(&self) -> bool {
        matches!(self, Self::InvalidStateTransition { .. })
    }

    pub fn is_idempotency_error(&self) -> bool {
        matches!(self, Self::IdempotencyError { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error was caused by the caller (4xx category)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }

    /// Suggested HTTP status for the REST layer that renders this error
    pub fn status_code(&self) -> u16 {
        match self.category() {
            ErrorCategory::NotFound => 404,
            ErrorCategory::Forbidden => 403,
            ErrorCategory::Validation | ErrorCategory::StateTransition => 400,
            ErrorCategory::Idempotency | ErrorCategory::Conflict => 409,
            ErrorCategory::Storage => 500,
        }
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::InvalidPermissions { .. } => ErrorCategory::Forbidden,
            Self::InvalidStateTransition { .. } => ErrorCategory::StateTransition,
            Self::IdempotencyError { .. } => ErrorCategory::Idempotency,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::ConcurrentModification { .. } => ErrorCategory::Conflict,
            Self::Storage(_) => ErrorCategory::Storage,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    NotFound,
    Forbidden,
    StateTransition,
    Idempotency,
    Validation,
    Conflict,
    Storage,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::StateTransition => write!(f, "state_transition"),
            Self::Idempotency => write!(f, "idempotency"),
            Self::Validation => write!(f, "validation"),
            Self::Conflict => write!(f, "conflict"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

/// Convenience result type for consent operations
pub type Result<T> = std::result::Result<T, ConsentError>;
