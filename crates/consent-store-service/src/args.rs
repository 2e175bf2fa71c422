//! Authorisation arguments.
//!
//! Each consent family authorises with the same three identifiers plus
//! whatever the customer selected during authorisation. The selection is
//! written onto the record extension by [`AuthoriseArgs::apply`].

use std::fmt::Debug;

use consent_store_core::{
    AccountAccessExtension, DebtorAccountExtension, NoExtension, PaymentExtension, Result,
    validate_id,
};

/// Arguments accepted by `ConsentService::authorise_consent` for records
/// with extension `E`.
pub trait AuthoriseArgs<E>: Debug + Send + Sync {
    fn consent_id(&self) -> &str;

    fn client_id(&self) -> &str;

    fn resource_owner_id(&self) -> &str;

    /// Structural checks run before the record is loaded.
    fn validate(&self) -> Result<()> {
        validate_common(self.consent_id(), self.client_id(), self.resource_owner_id())
    }

    /// Writes the authorisation-time fields onto the record extension.
    fn apply(&self, extension: &mut E);
}

pub(crate) fn validate_common(consent_id: &str, client_id: &str, resource_owner_id: &str) -> Result<()> {
    validate_id("consentId", consent_id)?;
    validate_id("owningClientId", client_id)?;
    validate_id("resourceOwnerId", resource_owner_id)
}

/// Authorisation without category-specific fields (customer info).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoriseConsentArgs {
    pub consent_id: String,
    pub client_id: String,
    pub resource_owner_id: String,
}

impl AuthoriseConsentArgs {
    pub fn new(
        consent_id: impl Into<String>,
        client_id: impl Into<String>,
        resource_owner_id: impl Into<String>,
    ) -> Self {
        Self {
            consent_id: consent_id.into(),
            client_id: client_id.into(),
            resource_owner_id: resource_owner_id.into(),
        }
    }
}

impl AuthoriseArgs<NoExtension> for AuthoriseConsentArgs {
    fn consent_id(&self) -> &str {
        &self.consent_id
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn resource_owner_id(&self) -> &str {
        &self.resource_owner_id
    }

    fn apply(&self, _extension: &mut NoExtension) {}
}

/// Account access authorisation records the accounts the customer shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountAccessAuthoriseArgs {
    pub consent_id: String,
    pub client_id: String,
    pub resource_owner_id: String,
    pub authorised_account_ids: Vec<String>,
}

impl AccountAccessAuthoriseArgs {
    pub fn new(
        consent_id: impl Into<String>,
        client_id: impl Into<String>,
        resource_owner_id: impl Into<String>,
        authorised_account_ids: Vec<String>,
    ) -> Self {
        Self {
            consent_id: consent_id.into(),
            client_id: client_id.into(),
            resource_owner_id: resource_owner_id.into(),
            authorised_account_ids,
        }
    }
}

impl AuthoriseArgs<AccountAccessExtension> for AccountAccessAuthoriseArgs {
    fn consent_id(&self) -> &str {
        &self.consent_id
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn resource_owner_id(&self) -> &str {
        &self.resource_owner_id
    }

    fn validate(&self) -> Result<()> {
        validate_common(&self.consent_id, &self.client_id, &self.resource_owner_id)?;
        if self.authorised_account_ids.is_empty() {
            return Err(consent_store_core::ConsentError::validation(
                "authorisedAccountIds must contain at least one account",
            ));
        }
        self.authorised_account_ids
            .iter()
            .try_for_each(|account| validate_id("authorisedAccountIds", account))
    }

    fn apply(&self, extension: &mut AccountAccessExtension) {
        extension.authorised_account_ids = self.authorised_account_ids.clone();
    }
}

/// Authorisation that binds a debtor account: funds confirmation, VRP and
/// every payment category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebtorAccountAuthoriseArgs {
    pub consent_id: String,
    pub client_id: String,
    pub resource_owner_id: String,
    pub authorised_debtor_account_id: String,
}

pub type PaymentAuthoriseArgs = DebtorAccountAuthoriseArgs;

impl DebtorAccountAuthoriseArgs {
    pub fn new(
        consent_id: impl Into<String>,
        client_id: impl Into<String>,
        resource_owner_id: impl Into<String>,
        authorised_debtor_account_id: impl Into<String>,
    ) -> Self {
        Self {
            consent_id: consent_id.into(),
            client_id: client_id.into(),
            resource_owner_id: resource_owner_id.into(),
            authorised_debtor_account_id: authorised_debtor_account_id.into(),
        }
    }

    fn validate_debtor(&self) -> Result<()> {
        validate_common(&self.consent_id, &self.client_id, &self.resource_owner_id)?;
        validate_id("authorisedDebtorAccountId", &self.authorised_debtor_account_id)
    }
}

impl AuthoriseArgs<DebtorAccountExtension> for DebtorAccountAuthoriseArgs {
    fn consent_id(&self) -> &str {
        &self.consent_id
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn resource_owner_id(&self) -> &str {
        &self.resource_owner_id
    }

    fn validate(&self) -> Result<()> {
        self.validate_debtor()
    }

    fn apply(&self, extension: &mut DebtorAccountExtension) {
        extension.authorised_debtor_account_id = Some(self.authorised_debtor_account_id.clone());
    }
}

impl AuthoriseArgs<PaymentExtension> for DebtorAccountAuthoriseArgs {
    fn consent_id(&self) -> &str {
        &self.consent_id
    }

    fn client_id(&self) -> &str {
        &self.client_id
    }

    fn resource_owner_id(&self) -> &str {
        &self.resource_owner_id
    }

    fn validate(&self) -> Result<()> {
        self.validate_debtor()
    }

    fn apply(&self, extension: &mut PaymentExtension) {
        extension.authorised_debtor_account_id = Some(self.authorised_debtor_account_id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_common_validation() {
        let args = AuthoriseConsentArgs::new("c-1", "tpp-a", "psu-1");
        assert!(AuthoriseArgs::<NoExtension>::validate(&args).is_ok());

        let args = AuthoriseConsentArgs::new("c-1", "tpp-a", " ");
        let err = AuthoriseArgs::<NoExtension>::validate(&args).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("resourceOwnerId"));
    }

    #[test]
    fn test_account_access_requires_accounts() {
        let args = AccountAccessAuthoriseArgs::new("c-1", "tpp-a", "psu-1", Vec::new());
        let err = args.validate().unwrap_err();
        assert!(err.to_string().contains("authorisedAccountIds"));

        let args =
            AccountAccessAuthoriseArgs::new("c-1", "tpp-a", "psu-1", vec!["acc-1".into(), "".into()]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_account_access_apply_replaces_accounts() {
        let mut extension = AccountAccessExtension {
            authorised_account_ids: vec!["old".into()],
        };
        let args = AccountAccessAuthoriseArgs::new(
            "c-1",
            "tpp-a",
            "psu-1",
            vec!["acc-1".into(), "acc-2".into()],
        );
        args.apply(&mut extension);
        assert_eq!(extension.authorised_account_ids, vec!["acc-1", "acc-2"]);
    }

    #[test]
    fn test_debtor_account_apply() {
        let args = DebtorAccountAuthoriseArgs::new("c-1", "tpp-a", "psu-1", "acc-9");

        let mut funds = DebtorAccountExtension::default();
        args.apply(&mut funds);
        assert_eq!(funds.authorised_debtor_account_id.as_deref(), Some("acc-9"));

        let mut payment = PaymentExtension {
            idempotency_key: "k1".into(),
            idempotency_key_expiry: datetime!(2024-01-02 00:00:00 UTC),
            authorised_debtor_account_id: None,
            charges: Vec::new(),
        };
        args.apply(&mut payment);
        assert_eq!(payment.authorised_debtor_account_id.as_deref(), Some("acc-9"));
        assert_eq!(payment.idempotency_key, "k1");
    }

    #[test]
    fn test_debtor_account_is_required() {
        let args = DebtorAccountAuthoriseArgs::new("c-1", "tpp-a", "psu-1", "");
        assert!(AuthoriseArgs::<DebtorAccountExtension>::validate(&args).is_err());
        assert!(AuthoriseArgs::<PaymentExtension>::validate(&args).is_err());
    }
}
