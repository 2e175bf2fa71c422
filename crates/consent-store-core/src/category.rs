use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConsentError, Result};
use crate::state_model::{REAUTHORISABLE, REVOCABLE, SINGLE_USE_PAYMENT, StateModel};

/// Consent subtypes handled by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentCategory {
    AccountAccess,
    CustomerInfo,
    FundsConfirmation,
    DomesticVrp,
    DomesticPayment,
    DomesticScheduledPayment,
    DomesticStandingOrder,
    InternationalPayment,
    InternationalScheduledPayment,
    InternationalStandingOrder,
    FilePayment,
}

/// Groups categories that share a record shape and service type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsentFamily {
    AccountAccess,
    CustomerInfo,
    FundsConfirmation,
    Vrp,
    Payment,
}

impl ConsentCategory {
    pub const ALL: [ConsentCategory; 11] = [
        ConsentCategory::AccountAccess,
        ConsentCategory::CustomerInfo,
        ConsentCategory::FundsConfirmation,
        ConsentCategory::DomesticVrp,
        ConsentCategory::DomesticPayment,
        ConsentCategory::DomesticScheduledPayment,
        ConsentCategory::DomesticStandingOrder,
        ConsentCategory::InternationalPayment,
        ConsentCategory::InternationalScheduledPayment,
        ConsentCategory::InternationalStandingOrder,
        ConsentCategory::FilePayment,
    ];

    /// Configuration key, e.g. `domestic_payment`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AccountAccess => "account_access",
            Self::CustomerInfo => "customer_info",
            Self::FundsConfirmation => "funds_confirmation",
            Self::DomesticVrp => "domestic_vrp",
            Self::DomesticPayment => "domestic_payment",
            Self::DomesticScheduledPayment => "domestic_scheduled_payment",
            Self::DomesticStandingOrder => "domestic_standing_order",
            Self::InternationalPayment => "international_payment",
            Self::InternationalScheduledPayment => "international_scheduled_payment",
            Self::InternationalStandingOrder => "international_standing_order",
            Self::FilePayment => "file_payment",
        }
    }

    /// Resource-style name used in service names, e.g. `domestic-payment-consents`.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::AccountAccess => "account-access-consents",
            Self::CustomerInfo => "customer-info-consents",
            Self::FundsConfirmation => "funds-confirmation-consents",
            Self::DomesticVrp => "domestic-vrp-consents",
            Self::DomesticPayment => "domestic-payment-consents",
            Self::DomesticScheduledPayment => "domestic-scheduled-payment-consents",
            Self::DomesticStandingOrder => "domestic-standing-order-consents",
            Self::InternationalPayment => "international-payment-consents",
            Self::InternationalScheduledPayment => "international-scheduled-payment-consents",
            Self::InternationalStandingOrder => "international-standing-order-consents",
            Self::FilePayment => "file-payment-consents",
        }
    }

    pub fn family(&self) -> ConsentFamily {
        match self {
            Self::AccountAccess => ConsentFamily::AccountAccess,
            Self::CustomerInfo => ConsentFamily::CustomerInfo,
            Self::FundsConfirmation => ConsentFamily::FundsConfirmation,
            Self::DomesticVrp => ConsentFamily::Vrp,
            Self::DomesticPayment
            | Self::DomesticScheduledPayment
            | Self::DomesticStandingOrder
            | Self::InternationalPayment
            | Self::InternationalScheduledPayment
            | Self::InternationalStandingOrder
            | Self::FilePayment => ConsentFamily::Payment,
        }
    }

    pub fn state_model(&self) -> &'static StateModel {
        match self.family() {
            ConsentFamily::Payment => &SINGLE_USE_PAYMENT,
            ConsentFamily::FundsConfirmation => &REVOCABLE,
            ConsentFamily::AccountAccess | ConsentFamily::CustomerInfo | ConsentFamily::Vrp => {
                &REAUTHORISABLE
            }
        }
    }

    pub fn is_payment(&self) -> bool {
        self.family() == ConsentFamily::Payment
    }

    /// Long-lived categories may be hard deleted; payment consents are kept
    /// until they reach a terminal status.
    pub fn supports_delete(&self) -> bool {
        !self.is_payment()
    }

    /// First API version that defines this category.
    pub fn min_version(&self) -> ApiVersion {
        match self {
            Self::DomesticVrp => ApiVersion::new(3, 1, 8),
            _ => ApiVersion::new(3, 1, 0),
        }
    }

    pub fn is_available_in(&self, version: &ApiVersion) -> bool {
        *version >= self.min_version()
    }
}

impl fmt::Display for ConsentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentCategory {
    type Err = ConsentError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| ConsentError::validation(format!("Unknown consent category '{s}'")))
    }
}

/// Regulatory API version, written `v<major>.<minor>.<patch>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl ApiVersion {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ApiVersion {
    type Err = ConsentError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || ConsentError::validation(format!("Invalid API version '{s}'"));
        let trimmed = s.strip_prefix('v').unwrap_or(s);
        let parts = trimmed
            .split('.')
            .map(|part| part.parse::<u16>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>>>()?;
        match parts.as_slice() {
            [major, minor, patch] => Ok(Self::new(*major, *minor, *patch)),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for ApiVersion {
    type Error = ConsentError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ApiVersion> for String {
    fn from(version: ApiVersion) -> Self {
        version.to_string()
    }
}

/// Address of one service instance in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceKey {
    pub category: ConsentCategory,
    pub version: ApiVersion,
}

impl ServiceKey {
    pub fn new(category: ConsentCategory, version: ApiVersion) -> Self {
        Self { category, version }
    }

    /// Stable name, e.g. `domestic-payment-consents/v3.1.10`.
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category.slug(), self.version)
    }
}
