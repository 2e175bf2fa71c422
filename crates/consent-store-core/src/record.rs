use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use time::OffsetDateTime;

use crate::status::ConsentStatus;

/// A stored consent.
///
/// `P` is the category payload, opaque to the lifecycle engine; `E` carries
/// the category-specific fields set at creation or authorisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRecord<P, E = NoExtension> {
    pub id: String,
    pub owning_client_id: String,
    pub status: ConsentStatus,
    pub payload: P,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resource_owner_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub status_updated_at: OffsetDateTime,
    pub extension: E,
    /// Concurrency token maintained by the repository; 0 until first stored.
    #[serde(default)]
    pub version: u64,
}

impl<P, E> ConsentRecord<P, E> {
    pub fn is_owned_by(&self, client_id: &str) -> bool {
        self.owning_client_id == client_id
    }

    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }
}

/// Input to consent creation. Id, status and timestamps are always assigned
/// by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct NewConsent<P, E = NoExtension> {
    pub owning_client_id: String,
    pub payload: P,
    pub extension: E,
}

impl<P, E: Default> NewConsent<P, E> {
    pub fn new(owning_client_id: impl Into<String>, payload: P) -> Self {
        Self {
            owning_client_id: owning_client_id.into(),
            payload,
            extension: E::default(),
        }
    }
}

impl<P, E> NewConsent<P, E> {
    pub fn with_extension(owning_client_id: impl Into<String>, payload: P, extension: E) -> Self {
        Self {
            owning_client_id: owning_client_id.into(),
            payload,
            extension,
        }
    }
}

/// Bound satisfied by every payload type the engine can store.
///
/// Payload equality is structural and drives idempotent replay detection.
pub trait ConsentPayload: Clone + PartialEq + Debug + Send + Sync + 'static {}

impl<T> ConsentPayload for T where T: Clone + PartialEq + Debug + Send + Sync + 'static {}

/// An idempotency key together with the instant it stops deduplicating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencyWindow<'a> {
    pub key: &'a str,
    pub expires_at: OffsetDateTime,
}

impl IdempotencyWindow<'_> {
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

/// Category-specific record fields.
pub trait ConsentExtension: Clone + Debug + Send + Sync + 'static {
    /// Idempotency window the repository must keep unique per owning client.
    fn idempotency_window(&self) -> Option<IdempotencyWindow<'_>> {
        None
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoExtension;

impl ConsentExtension for NoExtension {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAccessExtension {
    #[serde(default)]
    pub authorised_account_ids: Vec<String>,
}

impl ConsentExtension for AccountAccessExtension {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtorAccountExtension {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub authorised_debtor_account_id: Option<String>,
}

impl ConsentExtension for DebtorAccountExtension {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentExtension {
    pub idempotency_key: String,
    #[serde(with = "time::serde::rfc3339")]
    pub idempotency_key_expiry: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub authorised_debtor_account_id: Option<String>,
    #[serde(default)]
    pub charges: Vec<Charge>,
}

impl ConsentExtension for PaymentExtension {
    fn idempotency_window(&self) -> Option<IdempotencyWindow<'_>> {
        Some(IdempotencyWindow {
            key: &self.idempotency_key,
            expires_at: self.idempotency_key_expiry,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charge {
    pub charge_bearer: String,
    #[serde(rename = "type")]
    pub charge_type: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Amount {
    pub amount: String,
    pub currency: String,
}

impl Amount {
    pub fn new(amount: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            amount: amount.into(),
            currency: currency.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn sample_record() -> ConsentRecord<serde_json::Value, PaymentExtension> {
        let created = datetime!(2024-03-01 10:00:00 UTC);
        ConsentRecord {
            id: "pdc-1".into(),
            owning_client_id: "tpp-a".into(),
            status: ConsentStatus::AwaitingAuthorisation,
            payload: json!({"initiation": {"amount": "10.00"}}),
            resource_owner_id: None,
            created_at: created,
            status_updated_at: created,
            extension: PaymentExtension {
                idempotency_key: "k1".into(),
                idempotency_key_expiry: datetime!(2024-03-02 10:00:00 UTC),
                authorised_debtor_account_id: None,
                charges: vec![Charge {
                    charge_bearer: "BorneByDebtor".into(),
                    charge_type: "UK.OBIE.CHAPSOut".into(),
                    amount: Amount::new("0.50", "GBP"),
                }],
            },
            version: 1,
        }
    }

    #[test]
    fn test_record_serializes_camel_case_rfc3339() {
        let value = serde_json::to_value(sample_record()).unwrap();
        assert_eq!(value["owningClientId"], "tpp-a");
        assert_eq!(value["status"], "AwaitingAuthorisation");
        assert_eq!(value["createdAt"], "2024-03-01T10:00:00Z");
        assert_eq!(value["extension"]["idempotencyKey"], "k1");
        assert_eq!(value["extension"]["charges"][0]["type"], "UK.OBIE.CHAPSOut");
        assert_eq!(value["extension"]["charges"][0]["amount"]["Currency"], "GBP");
        assert!(value.get("resourceOwnerId").is_none());
    }

    #[test]
    fn test_ownership_check() {
        let record = sample_record();
        assert!(record.is_owned_by("tpp-a"));
        assert!(!record.is_owned_by("tpp-b"));
        assert!(!record.is_owned_by(""));
    }

    #[test]
    fn test_payment_extension_exposes_idempotency_window() {
        let record = sample_record();
        let window = record.extension.idempotency_window().unwrap();
        assert_eq!(window.key, "k1");
        assert!(window.is_live_at(datetime!(2024-03-02 09:59:59 UTC)));
        assert!(!window.is_live_at(datetime!(2024-03-02 10:00:00 UTC)));
    }

    #[test]
    fn test_long_lived_extensions_have_no_idempotency_window() {
        assert!(NoExtension.idempotency_window().is_none());
        assert!(AccountAccessExtension::default().idempotency_window().is_none());
        assert!(DebtorAccountExtension::default().idempotency_window().is_none());
    }

    #[test]
    fn test_new_consent_defaults_extension() {
        let new: NewConsent<serde_json::Value, AccountAccessExtension> =
            NewConsent::new("tpp-a", json!({"permissions": ["ReadAccountsBasic"]}));
        assert!(new.extension.authorised_account_ids.is_empty());
        assert_eq!(new.owning_client_id, "tpp-a");
    }
}
