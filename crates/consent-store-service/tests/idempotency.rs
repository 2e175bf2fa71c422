use std::sync::Arc;

use consent_store_core::{
    Amount, ApiVersion, Charge, Clock, ConsentCategory, ConsentError, ManualClock,
    sequential_id_generator,
};
use consent_store_service::{
    AppConfig, NewPaymentConsent, OwnershipPolicy, PaymentService, ServiceContext,
    ServiceRegistry,
};
use serde_json::{Value, json};
use time::Duration;
use time::macros::datetime;

fn payments(clock: Arc<ManualClock>) -> Arc<PaymentService> {
    let context = ServiceContext::new(
        clock,
        sequential_id_generator("pay"),
        OwnershipPolicy::InvalidPermissions,
    );
    ServiceRegistry::from_config_with_context(&AppConfig::default(), context)
        .expect("default config builds")
        .payment(ConsentCategory::DomesticStandingOrder, ApiVersion::new(3, 1, 9))
        .expect("standing orders are registered")
}

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(datetime!(2024-08-15 14:00:00 UTC)))
}

fn standing_order(frequency: &str) -> Value {
    json!({
        "frequency": frequency,
        "firstPaymentAmount": {"Amount": "100.00", "Currency": "GBP"}
    })
}

#[tokio::test]
async fn repeated_creates_resolve_to_one_record() {
    let service = payments(clock());
    let request = NewPaymentConsent::new("tpp-a", "retry-1", standing_order("EvryDay"))
        .with_charges(vec![Charge {
            charge_bearer: "BorneByDebtor".into(),
            charge_type: "UK.OBIE.CHAPSOut".into(),
            amount: Amount::new("0.25", "GBP"),
        }]);

    let first = service.create_consent(request.clone()).await.unwrap();
    for _ in 0..5 {
        let again = service.create_consent(request.clone()).await.unwrap();
        assert_eq!(again.id, first.id);
        assert_eq!(again, first);
    }
    assert_eq!(service.repository().count().await.unwrap(), 1);
    assert_eq!(first.extension.charges.len(), 1);
}

#[tokio::test]
async fn different_payload_reports_original_id() {
    let service = payments(clock());
    let first = service
        .create_consent(NewPaymentConsent::new("tpp-a", "k1", standing_order("EvryDay")))
        .await
        .unwrap();

    let err = service
        .create_consent(NewPaymentConsent::new("tpp-a", "k1", standing_order("EvryWorkgDay")))
        .await
        .unwrap_err();
    assert!(err.is_idempotency_error());
    assert_eq!(err.status_code(), 409);
    match err {
        ConsentError::IdempotencyError {
            existing_id,
            idempotency_key,
        } => {
            assert_eq!(existing_id, first.id);
            assert_eq!(idempotency_key, "k1");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn keys_are_scoped_to_the_owning_client() {
    let service = payments(clock());
    let a = service
        .create_consent(NewPaymentConsent::new("tpp-a", "shared", standing_order("EvryDay")))
        .await
        .unwrap();
    let b = service
        .create_consent(NewPaymentConsent::new("tpp-b", "shared", standing_order("EvryDay")))
        .await
        .unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(service.repository().count().await.unwrap(), 2);
}

#[tokio::test]
async fn expired_key_starts_a_fresh_consent() {
    let clock = clock();
    let service = payments(clock.clone());
    let expiry = clock.now() + Duration::hours(1);
    let first = service
        .create_consent(
            NewPaymentConsent::new("tpp-a", "k1", standing_order("EvryDay")).with_expiry(expiry),
        )
        .await
        .unwrap();

    clock.set(expiry);
    // A different payload is no conflict once the window has closed.
    let second = service
        .create_consent(NewPaymentConsent::new("tpp-a", "k1", standing_order("EvryWorkgDay")))
        .await
        .unwrap();
    assert_ne!(second.id, first.id);
    assert_eq!(service.repository().count().await.unwrap(), 2);

    let live = service.find_by_idempotency_key("tpp-a", "k1").await.unwrap();
    assert_eq!(live.map(|r| r.id), Some(second.id));
    // Expired consents stay readable.
    assert!(service.get_consent(&first.id, "tpp-a").await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicate_creates_store_one_record() {
    let service = payments(clock());

    let mut handles = Vec::new();
    for _ in 0..12 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .create_consent(NewPaymentConsent::new(
                    "tpp-a",
                    "race",
                    standing_order("EvryDay"),
                ))
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(service.repository().count().await.unwrap(), 1);
}
