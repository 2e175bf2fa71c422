//! Repository trait for consent persistence.

use async_trait::async_trait;
use time::OffsetDateTime;

use consent_store_core::{ConsentExtension, ConsentPayload, ConsentRecord};

use crate::error::StorageError;

/// The persistence contract the lifecycle engine consumes.
///
/// One repository holds the records of a single consent category. It does
/// not interpret statuses; it only guarantees the write semantics below.
/// Implementations must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use consent_store_storage::{ConsentRepository, StorageError};
///
/// async fn load(repo: &dyn ConsentRepository<Value, NoExtension>, id: &str)
///     -> Result<ConsentRecord<Value>, StorageError>
/// {
///     repo.find_by_id(id).await?.ok_or_else(|| StorageError::not_found(id))
/// }
/// ```
#[async_trait]
pub trait ConsentRepository<P, E>: Send + Sync
where
    P: ConsentPayload,
    E: ConsentExtension,
{
    /// Persists a record and returns the stored copy with its new version.
    ///
    /// A record with `version == 0` is inserted. Any other record replaces the
    /// stored one only if the stored version still equals `record.version`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` when inserting over a taken id.
    /// Returns `StorageError::IdempotencyKeyConflict` when inserting a record
    /// whose idempotency window collides with a live one of the same client.
    /// Returns `StorageError::NotFound` when updating a record that is gone.
    /// Returns `StorageError::VersionConflict` when the stored version moved on.
    async fn save(&self, record: ConsentRecord<P, E>) -> Result<ConsentRecord<P, E>, StorageError>;

    /// Reads a record by id. Returns `None` if it does not exist.
    async fn find_by_id(&self, id: &str) -> Result<Option<ConsentRecord<P, E>>, StorageError>;

    /// Finds the record of `owning_client_id` holding `idempotency_key`
    /// whose expiry lies after `now`. Expired keys never match.
    async fn find_by_owner_and_idempotency_key(
        &self,
        owning_client_id: &str,
        idempotency_key: &str,
        now: OffsetDateTime,
    ) -> Result<Option<ConsentRecord<P, E>>, StorageError>;

    /// Hard-deletes a record. Returns `false` if it did not exist.
    async fn delete_by_id(&self, id: &str) -> Result<bool, StorageError>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize, StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
