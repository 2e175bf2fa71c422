//! # consent-store-storage
//!
//! Storage abstraction layer for the consent store.
//!
//! This crate defines the repository contract that all storage backends must
//! implement. It does not contain any implementations; those are provided by
//! separate crates such as `consent-store-db-memory`.
//!
//! ## Overview
//!
//! The main trait is [`ConsentRepository`], which defines:
//! - inserts and version-checked updates (`save`)
//! - lookup by id and by `(owning client, idempotency key)`
//! - hard deletes
//!
//! ## Storage Backends
//!
//! ```ignore
//! use async_trait::async_trait;
//! use consent_store_storage::{ConsentRepository, StorageError};
//!
//! struct MyRepository {
//!     // ...
//! }
//!
//! #[async_trait]
//! impl<P: ConsentPayload, E: ConsentExtension> ConsentRepository<P, E> for MyRepository {
//!     async fn save(&self, record: ConsentRecord<P, E>) -> Result<ConsentRecord<P, E>, StorageError> {
//!         // Implementation
//!     }
//!     // ... other methods
//! }
//! ```

mod error;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use traits::ConsentRepository;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shareable repository trait object.
pub type DynRepository<P, E> = std::sync::Arc<dyn ConsentRepository<P, E>>;
