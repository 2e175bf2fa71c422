use std::{env, fs, time::Duration};

use consent_store_core::{ApiVersion, ConsentCategory};
use consent_store_db_memory::StorageBackend;
use consent_store_service::{ConfigError, OwnershipPolicy, ServiceRegistry, config::loader::load_config};

#[test]
fn config_parsing_and_env_overrides_and_validation() {
    // Create a temporary TOML configuration file
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("consent-store.toml");

    let toml_content = r#"
[logging]
level = "debug"

[storage]
backend = "in_memory"

[storage.options]
preallocate_items = 128

[idempotency]
default_ttl = "2h"
max_key_length = 32
max_attempts = 5

[ownership]
mismatch = "not_found"

[registry]
versions = ["v3.1.9", "v3.1.10"]

[registry.categories.file_payment]
enabled = false

[registry.categories.domestic_vrp]
versions = ["v3.1.10"]
"#;
    fs::write(&path, toml_content).expect("write toml");

    // 1) Valid config parses
    let cfg = load_config(path.to_str()).expect("should parse config");
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.storage.backend, StorageBackend::InMemoryPapaya);
    assert_eq!(cfg.storage.options.preallocate_items, Some(128));
    assert_eq!(cfg.idempotency.default_ttl, Duration::from_secs(2 * 3600));
    assert_eq!(cfg.idempotency.max_key_length, 32);
    assert_eq!(cfg.idempotency.max_attempts, 5);
    assert_eq!(cfg.ownership.mismatch, OwnershipPolicy::NotFound);
    assert!(!cfg.registry.is_enabled(ConsentCategory::FilePayment));

    let registry = ServiceRegistry::from_config(&cfg).expect("registry builds");
    // 10 enabled categories, VRP limited to one version
    assert_eq!(registry.len(), 9 * 2 + 1);
    assert!(
        registry
            .get(ConsentCategory::FilePayment, ApiVersion::new(3, 1, 10))
            .unwrap_err()
            .is_not_found()
    );

    // 2) Env override should win over file
    unsafe {
        env::set_var("CONSENT_STORE__IDEMPOTENCY__MAX_ATTEMPTS", "7");
    }
    let cfg_env = load_config(path.to_str()).expect("should parse config with env overrides");
    assert_eq!(cfg_env.idempotency.max_attempts, 7);
    // cleanup env var
    unsafe {
        env::remove_var("CONSENT_STORE__IDEMPOTENCY__MAX_ATTEMPTS");
    }

    // 3) Invalid config (bad version string) should error
    let invalid_path = dir.path().join("invalid.toml");
    let invalid_toml = r#"
[registry]
versions = ["3.1"]
"#;
    fs::write(&invalid_path, invalid_toml).expect("write invalid toml");
    let err = load_config(invalid_path.to_str()).expect_err("expected validation error");
    assert!(matches!(err, ConfigError::InvalidValue(_)));
    assert!(err.to_string().contains("registry.versions"));
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("absent.toml");

    let cfg = load_config(path.to_str()).expect("defaults are valid");
    assert_eq!(cfg.ownership.mismatch, OwnershipPolicy::InvalidPermissions);
    assert_eq!(cfg.idempotency.max_key_length, 40);
    assert_eq!(cfg.registry.versions.len(), 3);
}

#[test]
fn unknown_ownership_policy_is_a_load_error() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("bad-policy.toml");
    fs::write(&path, "[ownership]\nmismatch = \"forbidden\"\n").expect("write toml");

    let err = load_config(path.to_str()).expect_err("expected deserialize error");
    assert!(matches!(err, ConfigError::Load(_)));
}
