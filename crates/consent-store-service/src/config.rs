use consent_store_core::{ApiVersion, ConsentCategory};
use consent_store_db_memory::StorageConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::lifecycle::OwnershipPolicy;

/// Longest accepted `idempotency.default_ttl`.
pub const MAX_IDEMPOTENCY_TTL: Duration = Duration::from_secs(366 * 24 * 3600);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Idempotent payment creation settings
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    /// How ownership mismatches are reported
    #[serde(default)]
    pub ownership: OwnershipConfig,
    /// Which (category, version) services are built at startup
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// The configuration sources could not be read or merged.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl AppConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - The logging level is unknown
    /// - An idempotency limit is zero, or the TTL exceeds [`MAX_IDEMPOTENCY_TTL`]
    /// - A version list is empty or holds an unparsable version
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(ConfigError::InvalidValue(format!(
                "logging.level must be one of {valid_levels:?}"
            )));
        }
        // Idempotency validation
        if self.idempotency.default_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "idempotency.default_ttl must be > 0".into(),
            ));
        }
        if self.idempotency.default_ttl > MAX_IDEMPOTENCY_TTL {
            return Err(ConfigError::InvalidValue(
                "idempotency.default_ttl must be at most 366 days".into(),
            ));
        }
        if self.idempotency.max_key_length == 0 {
            return Err(ConfigError::InvalidValue(
                "idempotency.max_key_length must be > 0".into(),
            ));
        }
        if self.idempotency.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "idempotency.max_attempts must be > 0".into(),
            ));
        }
        // Registry validation
        self.registry.default_versions()?;
        for category in self.registry.categories.keys() {
            self.registry.versions_for(*category)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdempotencyConfig {
    /// Window used when the caller does not supply `idempotencyKeyExpiry`.
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Longest accepted idempotency key.
    pub max_key_length: usize,

    /// Upper bound on lookup-then-insert rounds for one creation request.
    pub max_attempts: u32,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(24 * 3600), // 24 hours
            max_key_length: 40,
            max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OwnershipConfig {
    pub mismatch: OwnershipPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// API versions enabled for every category unless overridden.
    pub versions: Vec<String>,
    /// Per-category overrides keyed by category, e.g. `domestic_payment`.
    pub categories: BTreeMap<ConsentCategory, CategoryConfig>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            versions: vec!["v3.1.8".into(), "v3.1.9".into(), "v3.1.10".into()],
            categories: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryConfig {
    pub enabled: bool,
    /// Replaces `registry.versions` for this category.
    pub versions: Option<Vec<String>>,
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            versions: None,
        }
    }
}

impl RegistryConfig {
    pub fn default_versions(&self) -> Result<Vec<ApiVersion>, ConfigError> {
        parse_versions("registry.versions", &self.versions)
    }

    pub fn is_enabled(&self, category: ConsentCategory) -> bool {
        self.categories
            .get(&category)
            .is_none_or(|overrides| overrides.enabled)
    }

    /// Versions to register for `category`; empty when it is disabled.
    pub fn versions_for(&self, category: ConsentCategory) -> Result<Vec<ApiVersion>, ConfigError> {
        match self.categories.get(&category) {
            Some(overrides) if !overrides.enabled => Ok(Vec::new()),
            Some(CategoryConfig {
                versions: Some(versions),
                ..
            }) => parse_versions(
                &format!("registry.categories.{}.versions", category.as_str()),
                versions,
            ),
            _ => self.default_versions(),
        }
    }
}

fn parse_versions(field: &str, raw: &[String]) -> Result<Vec<ApiVersion>, ConfigError> {
    if raw.is_empty() {
        return Err(ConfigError::InvalidValue(format!(
            "{field} must list at least one version"
        )));
    }
    let mut versions = raw
        .iter()
        .map(|v| {
            v.parse::<ApiVersion>()
                .map_err(|e| ConfigError::InvalidValue(format!("{field}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    versions.sort();
    versions.dedup();
    Ok(versions)
}

pub mod loader {
    use super::{AppConfig, ConfigError};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_FILE: &str = "consent-store.toml";
    pub const ENV_PREFIX: &str = "CONSENT_STORE";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
        let mut builder = Config::builder();
        let file = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if file.exists() {
            builder = builder.add_source(File::from(file));
        }
        // Environment variable overrides, e.g., CONSENT_STORE__LOGGING__LEVEL=debug
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| ConfigError::Load(format!("config build error: {e}")))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::Load(format!("config deserialize error: {e}")))?;
        merged.validate()?;
        Ok(merged)
    }
}
