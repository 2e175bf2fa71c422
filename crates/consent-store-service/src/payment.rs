//! Short-lived payment consents.
//!
//! Creation is idempotent per `(owning client, idempotency key)` while the
//! key's window is open: a retried request with the same payload replays the
//! stored consent, a different payload is refused with `IdempotencyError`.
//! The repository enforces key uniqueness on insert, so a lost race is
//! resolved by looking the winner up again.

use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use consent_store_core::{
    Charge, ConsentCategory, ConsentError, ConsentPayload, ConsentRecord, NewConsent,
    PaymentExtension, Result, StateModel, validate_id,
};
use consent_store_storage::{DynRepository, StorageError};

use crate::args::PaymentAuthoriseArgs;
use crate::config::IdempotencyConfig;
use crate::lifecycle::{ConsentService, ServiceContext};

pub type PaymentRecord<P> = ConsentRecord<P, PaymentExtension>;

/// Creation request for a payment consent.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaymentConsent<P> {
    pub owning_client_id: String,
    pub payload: P,
    pub idempotency_key: String,
    /// End of the deduplication window; the configured default TTL applies
    /// when absent.
    pub idempotency_key_expiry: Option<OffsetDateTime>,
    pub charges: Vec<Charge>,
}

impl<P> NewPaymentConsent<P> {
    pub fn new(
        owning_client_id: impl Into<String>,
        idempotency_key: impl Into<String>,
        payload: P,
    ) -> Self {
        Self {
            owning_client_id: owning_client_id.into(),
            payload,
            idempotency_key: idempotency_key.into(),
            idempotency_key_expiry: None,
            charges: Vec::new(),
        }
    }

    pub fn with_expiry(mut self, expiry: OffsetDateTime) -> Self {
        self.idempotency_key_expiry = Some(expiry);
        self
    }

    pub fn with_charges(mut self, charges: Vec<Charge>) -> Self {
        self.charges = charges;
        self
    }
}

/// Idempotency limits resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdempotencySettings {
    pub default_ttl: time::Duration,
    pub max_key_length: usize,
    pub max_attempts: u32,
}

impl Default for IdempotencySettings {
    fn default() -> Self {
        Self::from(&IdempotencyConfig::default())
    }
}

impl From<&IdempotencyConfig> for IdempotencySettings {
    fn from(config: &IdempotencyConfig) -> Self {
        Self {
            default_ttl: time::Duration::try_from(config.default_ttl)
                .unwrap_or(time::Duration::DAY),
            max_key_length: config.max_key_length,
            max_attempts: config.max_attempts.max(1),
        }
    }
}

/// Lifecycle service for payment consents.
///
/// Wraps the generic engine with idempotent creation and consumption. Payment
/// consents are never deleted; they end in `Rejected` or `Consumed`.
#[derive(Debug, Clone)]
pub struct PaymentConsentService<P>
where
    P: ConsentPayload,
{
    inner: ConsentService<P, PaymentExtension, PaymentAuthoriseArgs>,
    settings: IdempotencySettings,
}

impl<P> PaymentConsentService<P>
where
    P: ConsentPayload,
{
    pub fn new(
        category: ConsentCategory,
        repository: DynRepository<P, PaymentExtension>,
        context: ServiceContext,
        settings: IdempotencySettings,
    ) -> Self {
        Self {
            inner: ConsentService::with_context(category, repository, context),
            settings,
        }
    }

    pub fn category(&self) -> ConsentCategory {
        self.inner.category()
    }

    pub fn state_model(&self) -> &'static StateModel {
        self.inner.state_model()
    }

    pub fn repository(&self) -> &DynRepository<P, PaymentExtension> {
        self.inner.repository()
    }

    pub fn settings(&self) -> &IdempotencySettings {
        &self.settings
    }

    /// Creates a payment consent, or replays the live consent already
    /// created with the same idempotency key and payload.
    ///
    /// # Errors
    ///
    /// Returns `ConsentError::IdempotencyError` if the key is held by a live
    /// consent with a different payload, and `ConsentError::Validation` for
    /// a blank client id, a blank or oversized key, or an expiry (supplied
    /// or derived from the default TTL) that is not in the future.
    #[instrument(
        skip(self, new),
        fields(
            category = %self.category(),
            client_id = %new.owning_client_id,
            idempotency_key = %new.idempotency_key
        )
    )]
    pub async fn create_consent(&self, new: NewPaymentConsent<P>) -> Result<PaymentRecord<P>> {
        self.validate_new(&new)?;
        let now = self.inner.now();
        let expiry = match new.idempotency_key_expiry {
            Some(expiry) if expiry <= now => {
                return Err(ConsentError::validation(
                    "idempotencyKeyExpiry must be after the creation time",
                ));
            }
            Some(expiry) => expiry,
            None => match now.checked_add(self.settings.default_ttl) {
                Some(expiry) if expiry > now => expiry,
                _ => {
                    return Err(ConsentError::validation(
                        "idempotency default TTL does not yield an expiry after the creation time",
                    ));
                }
            },
        };

        let mut last_holder = None;
        for attempt in 1..=self.settings.max_attempts {
            if let Some(existing) = self
                .repository()
                .find_by_owner_and_idempotency_key(&new.owning_client_id, &new.idempotency_key, now)
                .await?
            {
                return self.replay(existing, &new.payload, &new.idempotency_key);
            }

            let extension = PaymentExtension {
                idempotency_key: new.idempotency_key.clone(),
                idempotency_key_expiry: expiry,
                authorised_debtor_account_id: None,
                charges: new.charges.clone(),
            };
            let candidate =
                NewConsent::with_extension(&new.owning_client_id, new.payload.clone(), extension);
            match self.inner.insert(candidate, now).await {
                Ok(stored) => {
                    debug!(consent_id = %stored.id, %expiry, "payment consent created");
                    return Ok(stored);
                }
                Err(StorageError::IdempotencyKeyConflict { existing_id, .. }) => {
                    debug!(attempt, existing_id = %existing_id, "lost idempotent create race");
                    last_holder = Some(existing_id);
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(
            attempts = self.settings.max_attempts,
            "idempotent create did not settle"
        );
        Err(ConsentError::concurrent_modification(
            last_holder.unwrap_or_default(),
        ))
    }

    fn validate_new(&self, new: &NewPaymentConsent<P>) -> Result<()> {
        validate_id("owningClientId", &new.owning_client_id)?;
        if new.idempotency_key.trim().is_empty() {
            return Err(ConsentError::validation("idempotencyKey must not be empty"));
        }
        if new.idempotency_key.chars().count() > self.settings.max_key_length {
            return Err(ConsentError::validation(format!(
                "idempotencyKey must be at most {} characters",
                self.settings.max_key_length
            )));
        }
        Ok(())
    }

    fn replay(
        &self,
        existing: PaymentRecord<P>,
        payload: &P,
        idempotency_key: &str,
    ) -> Result<PaymentRecord<P>> {
        if existing.payload == *payload {
            debug!(consent_id = %existing.id, "replaying idempotent create");
            Ok(existing)
        } else {
            warn!(
                consent_id = %existing.id,
                "idempotency key reused with a different payload"
            );
            Err(ConsentError::idempotency(existing.id, idempotency_key))
        }
    }

    /// The live consent holding `idempotency_key` for `client_id`, if any.
    pub async fn find_by_idempotency_key(
        &self,
        client_id: &str,
        idempotency_key: &str,
    ) -> Result<Option<PaymentRecord<P>>> {
        validate_id("owningClientId", client_id)?;
        if idempotency_key.trim().is_empty() {
            return Err(ConsentError::validation("idempotencyKey must not be empty"));
        }
        Ok(self
            .repository()
            .find_by_owner_and_idempotency_key(client_id, idempotency_key, self.inner.now())
            .await?)
    }

    pub async fn get_consent(&self, id: &str, client_id: &str) -> Result<PaymentRecord<P>> {
        self.inner.get_consent(id, client_id).await
    }

    pub async fn authorise_consent(&self, args: PaymentAuthoriseArgs) -> Result<PaymentRecord<P>> {
        self.inner.authorise_consent(args).await
    }

    pub async fn reject_consent(
        &self,
        id: &str,
        client_id: &str,
        resource_owner_id: &str,
    ) -> Result<PaymentRecord<P>> {
        self.inner
            .reject_consent(id, client_id, resource_owner_id)
            .await
    }

    /// Marks an authorised payment consent as used by its payment.
    #[instrument(skip(self), fields(category = %self.category()))]
    pub async fn consume_consent(&self, id: &str, client_id: &str) -> Result<PaymentRecord<P>> {
        let consumed = self.state_model().consumed_status().ok_or_else(|| {
            ConsentError::validation(format!("{} consents cannot be consumed", self.category()))
        })?;
        self.inner.transition_to(id, client_id, consumed).await
    }

    pub fn can_transition_to_authorised_state(&self, record: &PaymentRecord<P>) -> bool {
        self.inner.can_transition_to_authorised_state(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_store_core::{Clock, ConsentStatus, ManualClock, sequential_id_generator};
    use consent_store_db_memory::InMemoryConsentRepository;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use time::Duration;
    use time::macros::datetime;

    use crate::lifecycle::OwnershipPolicy;

    fn service(clock: Arc<ManualClock>) -> PaymentConsentService<Value> {
        PaymentConsentService::new(
            ConsentCategory::DomesticPayment,
            Arc::new(InMemoryConsentRepository::<Value, PaymentExtension>::new()),
            ServiceContext::new(
                clock,
                sequential_id_generator("pdc"),
                OwnershipPolicy::InvalidPermissions,
            ),
            IdempotencySettings::default(),
        )
    }

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(datetime!(2024-06-01 09:00:00 UTC)))
    }

    fn payload(amount: &str) -> Value {
        json!({"instructedAmount": {"Amount": amount, "Currency": "GBP"}})
    }

    #[tokio::test]
    async fn test_default_expiry_uses_ttl() {
        let clock = clock();
        let service = service(clock.clone());
        let created = service
            .create_consent(NewPaymentConsent::new("tpp-a", "k1", payload("10.00")))
            .await
            .unwrap();
        assert_eq!(
            created.extension.idempotency_key_expiry,
            clock.now() + Duration::hours(24)
        );
        assert_eq!(created.status, ConsentStatus::AwaitingAuthorisation);
    }

    #[tokio::test]
    async fn test_replay_returns_same_record() {
        let service = service(clock());
        let first = service
            .create_consent(NewPaymentConsent::new("tpp-a", "k1", payload("10.00")))
            .await
            .unwrap();
        let second = service
            .create_consent(NewPaymentConsent::new("tpp-a", "k1", payload("10.00")))
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(service.repository().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_payload_mismatch_is_idempotency_error() {
        let service = service(clock());
        let first = service
            .create_consent(NewPaymentConsent::new("tpp-a", "k1", payload("10.00")))
            .await
            .unwrap();
        let err = service
            .create_consent(NewPaymentConsent::new("tpp-a", "k1", payload("99.00")))
            .await
            .unwrap_err();
        match err {
            ConsentError::IdempotencyError { existing_id, .. } => assert_eq!(existing_id, first.id),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(service.repository().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_key_validation() {
        let service = service(clock());
        let err = service
            .create_consent(NewPaymentConsent::new("tpp-a", "", payload("1.00")))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let long_key = "k".repeat(41);
        let err = service
            .create_consent(NewPaymentConsent::new("tpp-a", long_key, payload("1.00")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("at most 40"));
    }

    #[tokio::test]
    async fn test_past_expiry_is_rejected() {
        let clock = clock();
        let service = service(clock.clone());
        let err = service
            .create_consent(
                NewPaymentConsent::new("tpp-a", "k1", payload("1.00")).with_expiry(clock.now()),
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_unusable_default_ttl_is_validation_error() {
        for default_ttl in [Duration::MAX, Duration::ZERO, Duration::seconds(-1)] {
            let service = PaymentConsentService::new(
                ConsentCategory::DomesticPayment,
                Arc::new(InMemoryConsentRepository::<Value, PaymentExtension>::new()),
                ServiceContext::new(
                    clock(),
                    sequential_id_generator("pdc"),
                    OwnershipPolicy::InvalidPermissions,
                ),
                IdempotencySettings {
                    default_ttl,
                    ..IdempotencySettings::default()
                },
            );
            let err = service
                .create_consent(NewPaymentConsent::new("tpp-a", "k1", payload("1.00")))
                .await
                .unwrap_err();
            assert!(err.is_validation(), "ttl {default_ttl}: {err:?}");
            assert_eq!(service.repository().count().await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn test_consume_requires_authorisation() {
        let service = service(clock());
        let created = service
            .create_consent(NewPaymentConsent::new("tpp-a", "k1", payload("1.00")))
            .await
            .unwrap();
        let err = service.consume_consent(&created.id, "tpp-a").await.unwrap_err();
        assert!(err.is_invalid_state_transition());
    }

    #[tokio::test]
    async fn test_find_by_idempotency_key() {
        let clock = clock();
        let service = service(clock.clone());
        let created = service
            .create_consent(NewPaymentConsent::new("tpp-a", "k1", payload("1.00")))
            .await
            .unwrap();

        let found = service.find_by_idempotency_key("tpp-a", "k1").await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(created.id));
        assert!(service.find_by_idempotency_key("tpp-b", "k1").await.unwrap().is_none());

        clock.advance(Duration::hours(25));
        assert!(service.find_by_idempotency_key("tpp-a", "k1").await.unwrap().is_none());
    }

    #[test]
    fn test_settings_from_config() {
        let config = IdempotencyConfig {
            default_ttl: std::time::Duration::from_secs(600),
            max_key_length: 16,
            max_attempts: 0,
        };
        let settings = IdempotencySettings::from(&config);
        assert_eq!(settings.default_ttl, Duration::minutes(10));
        assert_eq!(settings.max_key_length, 16);
        assert_eq!(settings.max_attempts, 1);
    }
}
