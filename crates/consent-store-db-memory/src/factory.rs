use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::InMemoryConsentRepository;
use consent_store_core::{ConsentExtension, ConsentPayload};
use consent_store_storage::DynRepository;

/// Supported storage backend types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageBackend {
    /// In-memory storage implemented on top of papaya::HashMap
    #[default]
    #[serde(rename = "in_memory")]
    InMemoryPapaya,
}

/// Storage-specific configuration options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    /// Optional preallocation hint (initial capacity of the record map and
    /// the idempotency index).
    pub preallocate_items: Option<usize>,
}

/// Factory configuration to construct a repository instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub options: StorageOptions,
}

/// Create a repository for one consent category based on the provided
/// configuration.
///
/// For now, only the in-memory papaya backend is supported.
pub fn create_repository<P, E>(config: &StorageConfig) -> DynRepository<P, E>
where
    P: ConsentPayload,
    E: ConsentExtension,
{
    match config.backend {
        StorageBackend::InMemoryPapaya => Arc::new(InMemoryConsentRepository::<P, E>::with_options(
            config.options.clone(),
        )),
    }
}
