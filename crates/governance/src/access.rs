//! Access guard
//!
//! Role membership and the system-wide halt flag. The guard only answers
//! questions and records changes; the engine decides who may change it.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use rdao_core::Identity;

use crate::{GovernanceError, GovernanceResult};

/// Roles an identity can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// May manage roles, pause the system, move treasury funds, create grants
    /// and change governance parameters
    Admin,
    /// Core team / research committee membership
    CoreTeam,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Admin, Role::CoreTeam];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::CoreTeam => write!(f, "core-team"),
        }
    }
}

/// Role table plus halt flag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGuard {
    assignments: BTreeSet<(Identity, Role)>,
    halted: bool,
}

impl AccessGuard {
    /// Create a guard where `bootstrap` holds every role
    pub fn new(bootstrap: Identity) -> Self {
        let assignments = Role::ALL
            .iter()
            .map(|role| (bootstrap.clone(), *role))
            .collect();
        Self {
            assignments,
            halted: false,
        }
    }

    pub fn check_role(&self, identity: &Identity, role: Role) -> bool {
        // BTreeSet lookups need an owned key
        self.assignments.contains(&(identity.clone(), role))
    }

    pub fn require_role(&self, identity: &Identity, role: Role) -> GovernanceResult<()> {
        if !self.check_role(identity, role) {
            return Err(GovernanceError::unauthorized(format!(
                "{} does not hold the {} role",
                identity, role
            )));
        }
        Ok(())
    }

    pub fn require_not_halted(&self) -> GovernanceResult<()> {
        if self.halted {
            return Err(GovernanceError::Halted("the system is paused".to_string()));
        }
        Ok(())
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Identities holding `role`, in identity order
    pub fn members(&self, role: Role) -> Vec<Identity> {
        self.assignments
            .iter()
            .filter(|(_, r)| *r == role)
            .map(|(identity, _)| identity.clone())
            .collect()
    }

    /// Give `role` to `identity`. Returns false if it already held it.
    pub fn grant_role(&mut self, identity: &Identity, role: Role) -> GovernanceResult<bool> {
        if !identity.is_valid() {
            return Err(GovernanceError::invalid_input(format!(
                "cannot grant {} to invalid identity {:?}",
                role,
                identity.as_str()
            )));
        }
        Ok(self.assignments.insert((identity.clone(), role)))
    }

    /// Take `role` away from `identity`. Returns false if it did not hold it.
    ///
    /// The last admin cannot be removed, otherwise nobody could ever unpause
    /// the system or grant roles again.
    pub fn revoke_role(&mut self, identity: &Identity, role: Role) -> GovernanceResult<bool> {
        if !self.check_role(identity, role) {
            return Ok(false);
        }
        if role == Role::Admin && self.members(Role::Admin).len() == 1 {
            return Err(GovernanceError::invalid_input(format!(
                "{} is the last admin",
                identity
            )));
        }
        Ok(self.assignments.remove(&(identity.clone(), role)))
    }

    pub fn pause(&mut self) -> GovernanceResult<()> {
        if self.halted {
            return Err(GovernanceError::invalid_state("the system is already paused"));
        }
        self.halted = true;
        Ok(())
    }

    pub fn unpause(&mut self) -> GovernanceResult<()> {
        if !self.halted {
            return Err(GovernanceError::invalid_state("the system is not paused"));
        }
        self.halted = false;
        Ok(())
    }
}
