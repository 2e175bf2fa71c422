use crate::factory::StorageOptions;
use async_trait::async_trait;
use consent_store_core::{ConsentExtension, ConsentPayload, ConsentRecord};
use consent_store_storage::{ConsentRepository, StorageError, StorageResult};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use papaya::{Compute, HashMap as PapayaHashMap, Operation};
use std::sync::Arc;
use time::OffsetDateTime;

/// Unique key of the idempotency index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyIndexKey {
    pub owning_client_id: String,
    pub idempotency_key: String,
}

impl IdempotencyIndexKey {
    pub fn new(owning_client_id: impl Into<String>, idempotency_key: impl Into<String>) -> Self {
        Self {
            owning_client_id: owning_client_id.into(),
            idempotency_key: idempotency_key.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    consent_id: String,
    expires_at: OffsetDateTime,
}

/// In-memory consent repository using papaya lock-free HashMap.
///
/// This repository provides:
/// - Lock-free concurrent reads via papaya::HashMap
/// - Version-checked updates (compare-and-swap on `ConsentRecord::version`)
/// - A unique `(owning client, idempotency key)` index whose entry lock makes
///   check-then-insert atomic for duplicate creation races
#[derive(Debug)]
pub struct InMemoryConsentRepository<P, E> {
    /// Records keyed by consent id
    pub(crate) data: Arc<PapayaHashMap<String, ConsentRecord<P, E>>>,
    /// Live idempotency keys -> holding consent
    idempotency: DashMap<IdempotencyIndexKey, IndexEntry>,
    /// Storage configuration options
    _options: StorageOptions,
}

impl<P, E> InMemoryConsentRepository<P, E>
where
    P: ConsentPayload,
    E: ConsentExtension,
{
    /// Creates a new in-memory repository with default options.
    pub fn new() -> Self {
        Self::with_options(StorageOptions::default())
    }

    /// Creates a new in-memory repository with the given options.
    pub fn with_options(options: StorageOptions) -> Self {
        let (data, idempotency) = match options.preallocate_items {
            Some(capacity) => (
                PapayaHashMap::with_capacity(capacity),
                DashMap::with_capacity(capacity),
            ),
            None => (PapayaHashMap::new(), DashMap::new()),
        };
        Self {
            data: Arc::new(data),
            idempotency,
            _options: options,
        }
    }

    fn insert_record(&self, record: ConsentRecord<P, E>) -> StorageResult<()> {
        let guard = self.data.pin();
        let id = record.id.clone();
        match guard.try_insert(id.clone(), record) {
            Ok(_) => Ok(()),
            Err(_) => Err(StorageError::already_exists(id)),
        }
    }

    fn insert(&self, mut record: ConsentRecord<P, E>) -> StorageResult<ConsentRecord<P, E>> {
        record.version = 1;
        let window = record
            .extension
            .idempotency_window()
            .map(|w| (w.key.to_string(), w.expires_at));

        let Some((idempotency_key, expires_at)) = window else {
            self.insert_record(record.clone())?;
            return Ok(record);
        };

        let index_key = IdempotencyIndexKey::new(&record.owning_client_id, &idempotency_key);
        let index_entry = IndexEntry {
            consent_id: record.id.clone(),
            expires_at,
        };

        // The entry guard holds the shard lock until the record is stored,
        // so concurrent inserts for the same key are serialised here.
        match self.idempotency.entry(index_key) {
            Entry::Occupied(mut occupied) => {
                let held = occupied.get();
                let still_stored = self.data.pin().contains_key(&held.consent_id);
                if still_stored && held.expires_at > record.created_at {
                    tracing::debug!(
                        consent_id = %held.consent_id,
                        idempotency_key = %idempotency_key,
                        "idempotency key already held"
                    );
                    return Err(StorageError::idempotency_key_conflict(
                        &record.owning_client_id,
                        &idempotency_key,
                        &held.consent_id,
                    ));
                }
                self.insert_record(record.clone())?;
                tracing::debug!(
                    previous = %occupied.get().consent_id,
                    consent_id = %record.id,
                    "reassigning expired idempotency key"
                );
                occupied.insert(index_entry);
            }
            Entry::Vacant(vacant) => {
                self.insert_record(record.clone())?;
                vacant.insert(index_entry);
            }
        }
        Ok(record)
    }

    fn update(&self, mut record: ConsentRecord<P, E>) -> StorageResult<ConsentRecord<P, E>> {
        let expected = record.version;
        record.version = expected + 1;
        let guard = self.data.pin();
        let result = guard.compute(record.id.clone(), |entry| match entry {
            None => Operation::Abort(StorageError::not_found(&record.id)),
            Some((_, stored)) if stored.version != expected => Operation::Abort(
                StorageError::version_conflict(&record.id, expected, stored.version),
            ),
            Some(_) => Operation::Insert(record.clone()),
        });
        match result {
            Compute::Updated { .. } => Ok(record),
            Compute::Aborted(err) => Err(err),
            Compute::Inserted(..) | Compute::Removed(..) => Err(StorageError::internal(format!(
                "unexpected compute outcome while updating consent {}",
                record.id
            ))),
        }
    }
}

impl<P, E> Default for InMemoryConsentRepository<P, E>
where
    P: ConsentPayload,
    E: ConsentExtension,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<P, E> ConsentRepository<P, E> for InMemoryConsentRepository<P, E>
where
    P: ConsentPayload,
    E: ConsentExtension,
{
    async fn save(&self, record: ConsentRecord<P, E>) -> StorageResult<ConsentRecord<P, E>> {
        if record.id.is_empty() {
            return Err(StorageError::invalid_record(
                "consent id must be assigned before saving",
            ));
        }
        if record.is_persisted() {
            self.update(record)
        } else {
            self.insert(record)
        }
    }

    async fn find_by_id(&self, id: &str) -> StorageResult<Option<ConsentRecord<P, E>>> {
        let guard = self.data.pin();
        Ok(guard.get(id).cloned())
    }

    async fn find_by_owner_and_idempotency_key(
        &self,
        owning_client_id: &str,
        idempotency_key: &str,
        now: OffsetDateTime,
    ) -> StorageResult<Option<ConsentRecord<P, E>>> {
        let index_key = IdempotencyIndexKey::new(owning_client_id, idempotency_key);
        let consent_id = match self.idempotency.get(&index_key) {
            Some(entry) if entry.expires_at > now => entry.consent_id.clone(),
            _ => return Ok(None),
        };
        let guard = self.data.pin();
        Ok(guard.get(&consent_id).cloned())
    }

    async fn delete_by_id(&self, id: &str) -> StorageResult<bool> {
        let guard = self.data.pin();
        let Some(removed) = guard.remove(id) else {
            return Ok(false);
        };
        if let Some(window) = removed.extension.idempotency_window() {
            let index_key = IdempotencyIndexKey::new(&removed.owning_client_id, window.key);
            self.idempotency
                .remove_if(&index_key, |_, entry| entry.consent_id == id);
        }
        Ok(true)
    }

    async fn count(&self) -> StorageResult<usize> {
        Ok(self.data.pin().len())
    }

    fn backend_name(&self) -> &'static str {
        "in-memory-papaya"
    }
}
