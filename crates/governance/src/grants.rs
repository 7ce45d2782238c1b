//! Research grants
//!
//! A grant is a pre-approved allocation that its recipient claims from the
//! treasury before it expires. Funds are not reserved when a grant is
//! created, so a grant can become unclaimable if the treasury is drained in
//! the meantime; [`GrantBook::outstanding`] reports that exposure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use rdao_core::{Amount, Identity, Timestamp, DAY};

use crate::{GovernanceError, GovernanceResult};

/// Grant identifier. Zero is never assigned.
pub type GrantId = u64;

/// A claimable allocation from the treasury
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub id: GrantId,
    pub recipient: Identity,
    pub amount: Amount,
    pub title: String,
    pub description: String,
    pub approval_time: Timestamp,
    pub expiration_time: Timestamp,
    pub claimed: bool,
    pub claimed_at: Option<Timestamp>,
}

impl Grant {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expiration_time
    }

    /// Unclaimed and still claimable
    pub fn is_outstanding(&self, now: Timestamp) -> bool {
        !self.claimed && !self.is_expired(now)
    }
}

/// Caller-supplied fields of a new grant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGrant {
    pub recipient: Identity,
    pub amount: Amount,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub duration_days: u64,
}

impl NewGrant {
    pub fn new(recipient: Identity, amount: Amount, title: impl Into<String>, duration_days: u64) -> Self {
        Self {
            recipient,
            amount,
            title: title.into(),
            description: String::new(),
            duration_days,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn validate(&self) -> GovernanceResult<()> {
        if self.amount == 0 {
            return Err(GovernanceError::invalid_input("grant amount must be greater than zero"));
        }
        if !self.recipient.is_valid() {
            return Err(GovernanceError::invalid_input(format!(
                "invalid grant recipient {:?}",
                self.recipient.as_str()
            )));
        }
        if self.duration_days == 0 {
            return Err(GovernanceError::invalid_input("grant duration must be at least one day"));
        }
        Ok(())
    }
}

/// Grant table
#[derive(Debug, Clone, Default)]
pub struct GrantBook {
    grants: BTreeMap<GrantId, Grant>,
    last_id: GrantId,
}

impl GrantBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a new unclaimed grant
    pub fn insert(&mut self, new: NewGrant, now: Timestamp) -> GovernanceResult<GrantId> {
        new.validate()?;
        let expiration_time = new
            .duration_days
            .checked_mul(DAY)
            .and_then(|secs| now.checked_add(secs))
            .ok_or_else(|| GovernanceError::invalid_input("grant duration overflows the clock"))?;
        let id = self
            .last_id
            .checked_add(1)
            .ok_or_else(|| GovernanceError::invalid_state("grant ids exhausted"))?;

        let grant = Grant {
            id,
            recipient: new.recipient,
            amount: new.amount,
            title: new.title,
            description: new.description,
            approval_time: now,
            expiration_time,
            claimed: false,
            claimed_at: None,
        };
        self.grants.insert(id, grant);
        self.last_id = id;
        debug!(grant_id = id, expiration_time, "Stored grant");
        Ok(id)
    }

    pub fn get(&self, id: GrantId) -> GovernanceResult<&Grant> {
        self.grants
            .get(&id)
            .ok_or_else(|| GovernanceError::NotFound(format!("grant {}", id)))
    }

    /// Check that `claimant` may claim grant `id` at `now`
    pub fn check_claim(&self, id: GrantId, claimant: &Identity, now: Timestamp) -> GovernanceResult<&Grant> {
        let grant = self.get(id)?;
        if &grant.recipient != claimant {
            return Err(GovernanceError::unauthorized(format!(
                "{} is not the recipient of grant {}",
                claimant, id
            )));
        }
        if grant.claimed {
            return Err(GovernanceError::AlreadyProcessed(format!("grant {} was already claimed", id)));
        }
        if grant.is_expired(now) {
            return Err(GovernanceError::timing(format!(
                "grant {} expired at {}",
                id, grant.expiration_time
            )));
        }
        Ok(grant)
    }

    /// Flip the claimed flag. Only call once the payout has gone through.
    pub fn mark_claimed(&mut self, id: GrantId, now: Timestamp) -> GovernanceResult<&Grant> {
        let grant = self
            .grants
            .get_mut(&id)
            .ok_or_else(|| GovernanceError::NotFound(format!("grant {}", id)))?;
        if grant.claimed {
            return Err(GovernanceError::AlreadyProcessed(format!("grant {} was already claimed", id)));
        }
        grant.claimed = true;
        grant.claimed_at = Some(now);
        Ok(grant)
    }

    /// All grants in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &Grant> {
        self.grants.values()
    }

    pub fn for_recipient<'a>(&'a self, recipient: &'a Identity) -> impl Iterator<Item = &'a Grant> + 'a {
        self.grants.values().filter(move |grant| &grant.recipient == recipient)
    }

    /// Sum of grants that could still be claimed
    pub fn outstanding(&self, now: Timestamp) -> Amount {
        self.grants
            .values()
            .filter(|grant| grant.is_outstanding(now))
            .fold(0, |total: Amount, grant| total.saturating_add(grant.amount))
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}
