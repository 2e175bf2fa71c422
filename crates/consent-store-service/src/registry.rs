//! Versioned service registry.
//!
//! Built once at startup from [`AppConfig`]: one service per enabled
//! `(category, version)` pair, addressable by [`ServiceKey`] or by its stable
//! name (`domestic-payment-consents/v3.1.10`). All versions of a category
//! share that category's repository. The registry is read-only afterwards.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use consent_store_core::{
    AccountAccessExtension, ApiVersion, ConsentCategory, ConsentError, ConsentFamily,
    DebtorAccountExtension, NoExtension, PaymentExtension, Result, ServiceKey, SystemClock,
    default_id_generator,
};
use consent_store_db_memory::create_repository;

use crate::args::{AccountAccessAuthoriseArgs, AuthoriseConsentArgs, DebtorAccountAuthoriseArgs};
use crate::config::{AppConfig, ConfigError};
use crate::lifecycle::{ConsentService, ServiceContext};
use crate::payment::{IdempotencySettings, PaymentConsentService};

pub type AccountAccessService =
    ConsentService<Value, AccountAccessExtension, AccountAccessAuthoriseArgs>;
pub type CustomerInfoService = ConsentService<Value, NoExtension, AuthoriseConsentArgs>;
pub type FundsConfirmationService =
    ConsentService<Value, DebtorAccountExtension, DebtorAccountAuthoriseArgs>;
pub type VrpService = ConsentService<Value, DebtorAccountExtension, DebtorAccountAuthoriseArgs>;
pub type PaymentService = PaymentConsentService<Value>;

/// A service bound to one `(category, version)` pair.
#[derive(Debug, Clone)]
pub enum RegisteredService {
    AccountAccess(Arc<AccountAccessService>),
    CustomerInfo(Arc<CustomerInfoService>),
    FundsConfirmation(Arc<FundsConfirmationService>),
    Vrp(Arc<VrpService>),
    Payment(Arc<PaymentService>),
}

impl RegisteredService {
    pub fn family(&self) -> ConsentFamily {
        match self {
            Self::AccountAccess(_) => ConsentFamily::AccountAccess,
            Self::CustomerInfo(_) => ConsentFamily::CustomerInfo,
            Self::FundsConfirmation(_) => ConsentFamily::FundsConfirmation,
            Self::Vrp(_) => ConsentFamily::Vrp,
            Self::Payment(_) => ConsentFamily::Payment,
        }
    }

    pub fn category(&self) -> ConsentCategory {
        match self {
            Self::AccountAccess(s) => s.category(),
            Self::CustomerInfo(s) => s.category(),
            Self::FundsConfirmation(s) => s.category(),
            Self::Vrp(s) => s.category(),
            Self::Payment(s) => s.category(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    services: BTreeMap<ServiceKey, RegisteredService>,
}

impl ServiceRegistry {
    /// Builds the registry with the system clock and uuid ids.
    pub fn from_config(config: &AppConfig) -> std::result::Result<Self, ConfigError> {
        let context = ServiceContext::new(
            Arc::new(SystemClock),
            default_id_generator(),
            config.ownership.mismatch,
        );
        Self::from_config_with_context(config, context)
    }

    /// Validates `config`, then builds every enabled service around `context`.
    pub fn from_config_with_context(
        config: &AppConfig,
        context: ServiceContext,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let settings = IdempotencySettings::from(&config.idempotency);
        let mut services = BTreeMap::new();

        for category in ConsentCategory::ALL {
            let versions: Vec<ApiVersion> = config
                .registry
                .versions_for(category)?
                .into_iter()
                .filter(|version| {
                    let available = category.is_available_in(version);
                    if !available {
                        debug!(%category, %version, "category not defined in version, skipping");
                    }
                    available
                })
                .collect();
            if versions.is_empty() {
                continue;
            }

            let storage = &config.storage;
            let ctx = context.clone();
            let build: Box<dyn Fn() -> RegisteredService> = match category.family() {
                ConsentFamily::AccountAccess => {
                    let repo = create_repository::<Value, AccountAccessExtension>(storage);
                    Box::new(move || {
                        RegisteredService::AccountAccess(Arc::new(ConsentService::with_context(
                            category,
                            Arc::clone(&repo),
                            ctx.clone(),
                        )))
                    })
                }
                ConsentFamily::CustomerInfo => {
                    let repo = create_repository::<Value, NoExtension>(storage);
                    Box::new(move || {
                        RegisteredService::CustomerInfo(Arc::new(ConsentService::with_context(
                            category,
                            Arc::clone(&repo),
                            ctx.clone(),
                        )))
                    })
                }
                ConsentFamily::FundsConfirmation => {
                    let repo = create_repository::<Value, DebtorAccountExtension>(storage);
                    Box::new(move || {
                        RegisteredService::FundsConfirmation(Arc::new(
                            ConsentService::with_context(category, Arc::clone(&repo), ctx.clone()),
                        ))
                    })
                }
                ConsentFamily::Vrp => {
                    let repo = create_repository::<Value, DebtorAccountExtension>(storage);
                    Box::new(move || {
                        RegisteredService::Vrp(Arc::new(ConsentService::with_context(
                            category,
                            Arc::clone(&repo),
                            ctx.clone(),
                        )))
                    })
                }
                ConsentFamily::Payment => {
                    let repo = create_repository::<Value, PaymentExtension>(storage);
                    Box::new(move || {
                        RegisteredService::Payment(Arc::new(PaymentConsentService::new(
                            category,
                            Arc::clone(&repo),
                            ctx.clone(),
                            settings,
                        )))
                    })
                }
            };

            for version in versions {
                let key = ServiceKey::new(category, version);
                debug!(service = %key, "registering consent service");
                services.insert(key, build());
            }
        }

        info!(
            services = services.len(),
            backend = ?config.storage.backend,
            "consent service registry built"
        );
        Ok(Self { services })
    }

    pub fn get(&self, category: ConsentCategory, version: ApiVersion) -> Result<&RegisteredService> {
        let key = ServiceKey::new(category, version);
        self.services
            .get(&key)
            .ok_or_else(|| ConsentError::not_found(key.name()))
    }

    /// Looks a service up by its stable name, e.g. `account-access-consents/v3.1.9`.
    pub fn get_by_name(&self, name: &str) -> Option<&RegisteredService> {
        self.services
            .iter()
            .find(|(key, _)| key.name() == name)
            .map(|(_, service)| service)
    }

    pub fn payment(&self, category: ConsentCategory, version: ApiVersion) -> Result<Arc<PaymentService>> {
        match self.get(category, version)? {
            RegisteredService::Payment(service) => Ok(Arc::clone(service)),
            other => Err(family_mismatch(category, version, other, ConsentFamily::Payment)),
        }
    }

    pub fn account_access(&self, version: ApiVersion) -> Result<Arc<AccountAccessService>> {
        let category = ConsentCategory::AccountAccess;
        match self.get(category, version)? {
            RegisteredService::AccountAccess(service) => Ok(Arc::clone(service)),
            other => Err(family_mismatch(category, version, other, ConsentFamily::AccountAccess)),
        }
    }

    pub fn customer_info(&self, version: ApiVersion) -> Result<Arc<CustomerInfoService>> {
        let category = ConsentCategory::CustomerInfo;
        match self.get(category, version)? {
            RegisteredService::CustomerInfo(service) => Ok(Arc::clone(service)),
            other => Err(family_mismatch(category, version, other, ConsentFamily::CustomerInfo)),
        }
    }

    pub fn funds_confirmation(&self, version: ApiVersion) -> Result<Arc<FundsConfirmationService>> {
        let category = ConsentCategory::FundsConfirmation;
        match self.get(category, version)? {
            RegisteredService::FundsConfirmation(service) => Ok(Arc::clone(service)),
            other => Err(family_mismatch(
                category,
                version,
                other,
                ConsentFamily::FundsConfirmation,
            )),
        }
    }

    pub fn vrp(&self, version: ApiVersion) -> Result<Arc<VrpService>> {
        let category = ConsentCategory::DomesticVrp;
        match self.get(category, version)? {
            RegisteredService::Vrp(service) => Ok(Arc::clone(service)),
            other => Err(family_mismatch(category, version, other, ConsentFamily::Vrp)),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &ServiceKey> {
        self.services.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ServiceKey, &RegisteredService)> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

fn family_mismatch(
    category: ConsentCategory,
    version: ApiVersion,
    found: &RegisteredService,
    wanted: ConsentFamily,
) -> ConsentError {
    ConsentError::validation(format!(
        "{} is a {:?} service, not {:?}",
        ServiceKey::new(category, version),
        found.family(),
        wanted
    ))
}
