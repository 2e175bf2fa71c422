//! In-memory consent storage backend.
//!
//! This crate provides an in-memory implementation of the `ConsentRepository`
//! trait from `consent-store-storage`, using papaya lock-free HashMap for
//! concurrent access and a dashmap-backed unique index for idempotency keys.
//!
//! # Example
//!
//! ```ignore
//! use consent_store_db_memory::InMemoryConsentRepository;
//! use consent_store_storage::ConsentRepository;
//!
//! let repo = InMemoryConsentRepository::<serde_json::Value, NoExtension>::new();
//! let stored = repo.save(record).await?;
//! assert_eq!(stored.version, 1);
//! ```

pub mod factory;
pub mod storage;

// Re-export the repository trait for convenience
pub use consent_store_storage::{ConsentRepository, DynRepository, StorageError};

pub use factory::{StorageBackend, StorageConfig, StorageOptions, create_repository};
pub use storage::{IdempotencyIndexKey, InMemoryConsentRepository};
