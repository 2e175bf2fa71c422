//! # consent-store-service
//!
//! Consent lifecycle services for the consent store.
//!
//! - [`ConsentService`]: the generic engine (create, get, authorise, reject,
//!   revoke, delete) driven by a category's `StateModel`.
//! - [`PaymentConsentService`]: payment consents with idempotent creation and
//!   consumption.
//! - [`ServiceRegistry`]: one service per enabled `(category, version)` pair,
//!   built from [`AppConfig`] at startup.
//!
//! ```ignore
//! use consent_store_service::{ServiceRegistry, config::loader::load_config, observability};
//!
//! let config = load_config(None)?;
//! observability::init_from_config(&config.logging);
//! let registry = ServiceRegistry::from_config(&config)?;
//! let payments = registry.payment(ConsentCategory::DomesticPayment, "v3.1.10".parse()?)?;
//! ```

pub mod args;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod payment;
pub mod registry;

pub use args::{
    AccountAccessAuthoriseArgs, AuthoriseArgs, AuthoriseConsentArgs, DebtorAccountAuthoriseArgs,
    PaymentAuthoriseArgs,
};
pub use config::{AppConfig, ConfigError};
pub use lifecycle::{ConsentService, OwnershipPolicy, ServiceContext};
pub use payment::{IdempotencySettings, NewPaymentConsent, PaymentConsentService, PaymentRecord};
pub use registry::{
    AccountAccessService, CustomerInfoService, FundsConfirmationService, PaymentService,
    RegisteredService, ServiceRegistry, VrpService,
};
