//! Declarative status graphs for each consent category.
//!
//! A [`StateModel`] is an immutable lookup table: it names the initial status,
//! the statuses callers test outcomes against, and the directed edges between
//! statuses. Models live in statics and are shared freely across threads.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ConsentError, Result};
use crate::status::ConsentStatus;

use ConsentStatus::{AwaitingAuthorisation, Authorised, Consumed, Rejected, Revoked};

type TransitionTable = &'static [(ConsentStatus, &'static [ConsentStatus])];

#[derive(Debug, PartialEq, Eq)]
pub struct StateModel {
    name: &'static str,
    initial: ConsentStatus,
    authorised: ConsentStatus,
    rejected: ConsentStatus,
    revoked: ConsentStatus,
    consumed: Option<ConsentStatus>,
    transitions: TransitionTable,
}

/// Single-use payment consents: authorised once, then consumed by the payment.
pub static SINGLE_USE_PAYMENT: StateModel = StateModel {
    name: "single-use-payment",
    initial: AwaitingAuthorisation,
    authorised: Authorised,
    rejected: Rejected,
    // Unreachable from Authorised: a payment consent cannot be revoked.
    revoked: Rejected,
    consumed: Some(Consumed),
    transitions: &[
        (AwaitingAuthorisation, &[Authorised, Rejected]),
        (Authorised, &[Consumed]),
    ],
};

/// Long-lived consents that support re-consent and revocation to `Rejected`.
pub static REAUTHORISABLE: StateModel = StateModel {
    name: "reauthorisable",
    initial: AwaitingAuthorisation,
    authorised: Authorised,
    rejected: Rejected,
    revoked: Rejected,
    consumed: None,
    transitions: &[
        (AwaitingAuthorisation, &[Authorised, Rejected]),
        (Authorised, &[Authorised, Rejected]),
    ],
};

/// Long-lived consents that end in a dedicated `Revoked` status.
pub static REVOCABLE: StateModel = StateModel {
    name: "revocable",
    initial: AwaitingAuthorisation,
    authorised: Authorised,
    rejected: Rejected,
    revoked: Revoked,
    consumed: None,
    transitions: &[
        (AwaitingAuthorisation, &[Authorised, Rejected]),
        (Authorised, &[Authorised, Revoked]),
    ],
};

impl StateModel {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn initial_status(&self) -> ConsentStatus {
        self.initial
    }

    pub fn authorised_status(&self) -> ConsentStatus {
        self.authorised
    }

    pub fn rejected_status(&self) -> ConsentStatus {
        self.rejected
    }

    pub fn revoked_status(&self) -> ConsentStatus {
        self.revoked
    }

    /// Status a consent ends in once used, for models that are consumable.
    pub fn consumed_status(&self) -> Option<ConsentStatus> {
        self.consumed
    }

    /// Every status that can appear on a record governed by this model.
    pub fn states(&self) -> BTreeSet<ConsentStatus> {
        let mut states = BTreeSet::from([self.initial, self.authorised, self.rejected, self.revoked]);
        states.extend(self.consumed);
        for (from, targets) in self.transitions {
            states.insert(*from);
            states.extend(targets.iter().copied());
        }
        states
    }

    /// Maps each status to the statuses directly reachable from it.
    ///
    /// Terminal statuses map to an empty set.
    pub fn valid_transitions(&self) -> BTreeMap<ConsentStatus, BTreeSet<ConsentStatus>> {
        self.states()
            .into_iter()
            .map(|status| (status, self.targets(status).iter().copied().collect()))
            .collect()
    }

    fn targets(&self, from: ConsentStatus) -> &'static [ConsentStatus] {
        self.transitions
            .iter()
            .find(|(status, _)| *status == from)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    pub fn contains(&self, status: ConsentStatus) -> bool {
        self.states().contains(&status)
    }

    pub fn can_transition(&self, from: ConsentStatus, to: ConsentStatus) -> bool {
        self.targets(from).contains(&to)
    }

    pub fn is_terminal(&self, status: ConsentStatus) -> bool {
        self.targets(status).is_empty()
    }

    /// Whether an authorised consent may be authorised again.
    pub fn allows_reauthorisation(&self) -> bool {
        self.can_transition(self.authorised, self.authorised)
    }

    /// Fails with `InvalidStateTransition` unless `from -> to` is an edge.
    ///
    /// A same-status request passes only when the model declares the self-loop.
    pub fn check_transition(&self, id: &str, from: ConsentStatus, to: ConsentStatus) -> Result<()> {
        if self.can_transition(from, to) {
            Ok(())
        } else {
            Err(ConsentError::invalid_state_transition(id, from, to))
        }
    }
}
