use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ConsentError, Result};

const MAX_ID_LENGTH: usize = 128;

/// Zero-argument function producing a fresh, unique consent id.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn default_id_generator() -> IdGenerator {
    Arc::new(generate_id)
}

/// Deterministic ids (`<prefix>-1`, `<prefix>-2`, ...).
pub fn sequential_id_generator(prefix: impl Into<String>) -> IdGenerator {
    let prefix = prefix.into();
    let counter = AtomicU64::new(1);
    Arc::new(move || format!("{prefix}-{}", counter.fetch_add(1, Ordering::SeqCst)))
}

/// Checks a caller-supplied identifier (consent id, client id, resource owner id).
pub fn validate_id(field: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(ConsentError::validation(format!("{field} must not be empty")));
    }
    if id.chars().count() > MAX_ID_LENGTH {
        return Err(ConsentError::validation(format!(
            "{field} must be at most {MAX_ID_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_is_uuid() {
        let id = generate_id();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
        assert_ne!(id, generate_id());
    }

    #[test]
    fn test_sequential_generator() {
        let next = sequential_id_generator("aac");
        assert_eq!(next(), "aac-1");
        assert_eq!(next(), "aac-2");
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("consentId", "abc").is_ok());
        assert!(validate_id("consentId", "").unwrap_err().is_validation());
        assert!(validate_id("consentId", "   ").is_err());
        assert!(validate_id("consentId", &"x".repeat(129)).is_err());
        // Multi-byte characters count once each.
        assert!(validate_id("consentId", &"é".repeat(128)).is_ok());
        assert!(validate_id("consentId", &"é".repeat(129)).is_err());
        let err = validate_id("owningClientId", "").unwrap_err();
        assert!(err.to_string().contains("owningClientId"));
    }
}
