//! Generic consent lifecycle engine.
//!
//! [`ConsentService`] owns no per-request state: a state model, a repository
//! handle, a clock and an id generator. Every category and API version is
//! served by one instance of it, either directly (long-lived consents) or
//! wrapped by [`crate::payment::PaymentConsentService`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use consent_store_core::{
    ConsentCategory, ConsentError, ConsentExtension, ConsentPayload, ConsentRecord,
    ConsentStatus, DynClock, IdGenerator, NewConsent, Result, StateModel, SystemClock,
    default_id_generator, validate_id,
};
use consent_store_storage::{DynRepository, StorageError};

use crate::args::AuthoriseArgs;

/// How a request against another client's consent is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipPolicy {
    /// Report `InvalidPermissions` (403).
    #[default]
    InvalidPermissions,
    /// Report `NotFound` (404), hiding that the consent exists.
    NotFound,
}

impl OwnershipPolicy {
    pub fn mismatch_error(&self, id: &str, client_id: &str) -> ConsentError {
        match self {
            Self::InvalidPermissions => ConsentError::invalid_permissions(id, client_id),
            Self::NotFound => ConsentError::not_found(id),
        }
    }
}

/// Collaborators shared by every service built from one configuration.
#[derive(Clone)]
pub struct ServiceContext {
    pub clock: DynClock,
    pub id_generator: IdGenerator,
    pub ownership: OwnershipPolicy,
}

impl ServiceContext {
    pub fn new(clock: DynClock, id_generator: IdGenerator, ownership: OwnershipPolicy) -> Self {
        Self {
            clock,
            id_generator,
            ownership,
        }
    }
}

impl Default for ServiceContext {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            id_generator: default_id_generator(),
            ownership: OwnershipPolicy::default(),
        }
    }
}

impl fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContext")
            .field("clock", &self.clock)
            .field("ownership", &self.ownership)
            .finish_non_exhaustive()
    }
}

/// Lifecycle operations for one consent category.
///
/// `P` is the payload, `E` the record extension and `A` the authorisation
/// argument type whose [`AuthoriseArgs::apply`] hook sets the
/// category-specific fields.
pub struct ConsentService<P, E, A>
where
    P: ConsentPayload,
    E: ConsentExtension,
{
    category: ConsentCategory,
    model: &'static StateModel,
    repository: DynRepository<P, E>,
    context: ServiceContext,
    _args: PhantomData<fn(A)>,
}

impl<P, E, A> Clone for ConsentService<P, E, A>
where
    P: ConsentPayload,
    E: ConsentExtension,
{
    fn clone(&self) -> Self {
        Self {
            category: self.category,
            model: self.model,
            repository: Arc::clone(&self.repository),
            context: self.context.clone(),
            _args: PhantomData,
        }
    }
}

impl<P, E, A> fmt::Debug for ConsentService<P, E, A>
where
    P: ConsentPayload,
    E: ConsentExtension,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsentService")
            .field("category", &self.category)
            .field("model", &self.model.name())
            .field("backend", &self.repository.backend_name())
            .finish()
    }
}

impl<P, E, A> ConsentService<P, E, A>
where
    P: ConsentPayload,
    E: ConsentExtension,
    A: AuthoriseArgs<E>,
{
    /// Creates a service bound to the category's state model.
    pub fn new(category: ConsentCategory, repository: DynRepository<P, E>) -> Self {
        Self::with_context(category, repository, ServiceContext::default())
    }

    pub fn with_context(
        category: ConsentCategory,
        repository: DynRepository<P, E>,
        context: ServiceContext,
    ) -> Self {
        Self {
            category,
            model: category.state_model(),
            repository,
            context,
            _args: PhantomData,
        }
    }

    pub fn category(&self) -> ConsentCategory {
        self.category
    }

    pub fn state_model(&self) -> &'static StateModel {
        self.model
    }

    pub fn repository(&self) -> &DynRepository<P, E> {
        &self.repository
    }

    pub(crate) fn now(&self) -> OffsetDateTime {
        self.context.clock.now()
    }

    /// Creates a consent in the model's initial status.
    ///
    /// # Errors
    ///
    /// Returns `ConsentError::Validation` if the owning client id is blank.
    #[instrument(skip(self, new), fields(category = %self.category, client_id = %new.owning_client_id))]
    pub async fn create_consent(&self, new: NewConsent<P, E>) -> Result<ConsentRecord<P, E>> {
        validate_id("owningClientId", &new.owning_client_id)?;
        let stored = self.insert(new, self.now()).await?;
        debug!(consent_id = %stored.id, "consent created");
        Ok(stored)
    }

    /// Builds and inserts a fresh record, surfacing raw storage errors so the
    /// payment flow can react to idempotency key conflicts.
    pub(crate) async fn insert(
        &self,
        new: NewConsent<P, E>,
        now: OffsetDateTime,
    ) -> std::result::Result<ConsentRecord<P, E>, StorageError> {
        let record = ConsentRecord {
            id: (self.context.id_generator)(),
            owning_client_id: new.owning_client_id,
            status: self.model.initial_status(),
            payload: new.payload,
            resource_owner_id: None,
            created_at: now,
            status_updated_at: now,
            extension: new.extension,
            version: 0,
        };
        self.repository.save(record).await
    }

    /// Reads a consent owned by `client_id`.
    #[instrument(skip(self), fields(category = %self.category))]
    pub async fn get_consent(&self, id: &str, client_id: &str) -> Result<ConsentRecord<P, E>> {
        validate_id("consentId", id)?;
        validate_id("owningClientId", client_id)?;
        self.load_owned(id, client_id).await
    }

    /// Moves the consent to the authorised status, recording the resource
    /// owner and the category-specific selection carried by `args`.
    #[instrument(
        skip(self, args),
        fields(
            category = %self.category,
            consent_id = %args.consent_id(),
            client_id = %args.client_id()
        )
    )]
    pub async fn authorise_consent(&self, args: A) -> Result<ConsentRecord<P, E>> {
        args.validate()?;
        let record = self.load_owned(args.consent_id(), args.client_id()).await?;
        self.transition(
            record,
            self.model.authorised_status(),
            Some(args.resource_owner_id()),
            |extension| args.apply(extension),
        )
        .await
    }

    #[instrument(skip(self), fields(category = %self.category))]
    pub async fn reject_consent(
        &self,
        id: &str,
        client_id: &str,
        resource_owner_id: &str,
    ) -> Result<ConsentRecord<P, E>> {
        crate::args::validate_common(id, client_id, resource_owner_id)?;
        let record = self.load_owned(id, client_id).await?;
        self.transition(
            record,
            self.model.rejected_status(),
            Some(resource_owner_id),
            |_| {},
        )
        .await
    }

    /// Withdraws an authorised consent. The resource owner is kept.
    ///
    /// # Errors
    ///
    /// Returns `ConsentError::InvalidStateTransition` unless the consent is
    /// currently authorised and the model allows leaving that status.
    #[instrument(skip(self), fields(category = %self.category))]
    pub async fn revoke_consent(&self, id: &str, client_id: &str) -> Result<ConsentRecord<P, E>> {
        validate_id("consentId", id)?;
        validate_id("owningClientId", client_id)?;
        let record = self.load_owned(id, client_id).await?;
        let revoked = self.model.revoked_status();
        if record.status != self.model.authorised_status() {
            warn!(consent_id = %id, from = %record.status, "revoke rejected: consent is not authorised");
            return Err(ConsentError::invalid_state_transition(id, record.status, revoked));
        }
        self.transition(record, revoked, None, |_| {}).await
    }

    /// Hard-deletes a long-lived consent.
    #[instrument(skip(self), fields(category = %self.category))]
    pub async fn delete_consent(&self, id: &str, client_id: &str) -> Result<()> {
        if !self.category.supports_delete() {
            return Err(ConsentError::validation(format!(
                "{} consents cannot be deleted",
                self.category
            )));
        }
        validate_id("consentId", id)?;
        validate_id("owningClientId", client_id)?;
        self.load_owned(id, client_id).await?;
        if !self.repository.delete_by_id(id).await? {
            return Err(ConsentError::not_found(id));
        }
        debug!(consent_id = %id, "consent deleted");
        Ok(())
    }

    /// Whether the consent may still be presented to a customer for
    /// authorisation.
    pub fn can_transition_to_authorised_state(&self, record: &ConsentRecord<P, E>) -> bool {
        self.model
            .can_transition(record.status, self.model.authorised_status())
    }

    pub(crate) async fn transition_to(
        &self,
        id: &str,
        client_id: &str,
        to: ConsentStatus,
    ) -> Result<ConsentRecord<P, E>> {
        validate_id("consentId", id)?;
        validate_id("owningClientId", client_id)?;
        let record = self.load_owned(id, client_id).await?;
        self.transition(record, to, None, |_| {}).await
    }

    pub(crate) async fn load_owned(&self, id: &str, client_id: &str) -> Result<ConsentRecord<P, E>> {
        let Some(record) = self.repository.find_by_id(id).await? else {
            debug!(consent_id = %id, "consent not found");
            return Err(ConsentError::not_found(id));
        };
        if !record.is_owned_by(client_id) {
            warn!(
                consent_id = %id,
                client_id = %client_id,
                "consent requested by a client that does not own it"
            );
            return Err(self.context.ownership.mismatch_error(id, client_id));
        }
        Ok(record)
    }

    async fn transition<F>(
        &self,
        mut record: ConsentRecord<P, E>,
        to: ConsentStatus,
        resource_owner_id: Option<&str>,
        apply: F,
    ) -> Result<ConsentRecord<P, E>>
    where
        F: FnOnce(&mut E),
    {
        let from = record.status;
        if let Err(err) = self.model.check_transition(&record.id, from, to) {
            warn!(consent_id = %record.id, %from, %to, "invalid state transition");
            return Err(err);
        }

        record.status = to;
        record.status_updated_at = self.now().max(record.status_updated_at);
        if let Some(owner) = resource_owner_id {
            record.resource_owner_id = Some(owner.to_string());
        }
        apply(&mut record.extension);

        let stored = self.repository.save(record).await.map_err(|err| {
            if err.is_version_conflict() {
                warn!(%err, "lost update detected");
            }
            ConsentError::from(err)
        })?;
        debug!(consent_id = %stored.id, %from, %to, "consent status updated");
        Ok(stored)
    }
}
