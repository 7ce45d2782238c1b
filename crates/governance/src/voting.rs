//! Vote records and tallying
//!
//! Votes are weighted by the voter's token balance at the moment they vote.
//! A proposal passes when the total weight reaches quorum and the share of
//! non-abstain weight voting for it reaches the approval threshold.

use std::fmt;

use serde::{Deserialize, Serialize};

use rdao_core::{Amount, Identity, Timestamp};

use crate::proposals::ProposalId;
use crate::{GovernanceError, GovernanceResult};

/// The choice a voter makes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    For,
    Against,
    Abstain,
}

impl fmt::Display for VoteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteKind::For => write!(f, "for"),
            VoteKind::Against => write!(f, "against"),
            VoteKind::Abstain => write!(f, "abstain"),
        }
    }
}

/// A stored vote. Never modified once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    pub proposal_id: ProposalId,
    pub voter: Identity,
    pub kind: VoteKind,
    pub weight: Amount,
    pub cast_at: Timestamp,
}

/// Accumulated vote weight per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub for_votes: Amount,
    pub against_votes: Amount,
    pub abstain_votes: Amount,
}

/// Outcome of comparing a tally with the thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Total weight below quorum
    QuorumNotMet,
    /// Quorum met, but every vote abstained
    NoDecisiveVotes,
    /// Approval share reached the threshold
    Approved { approval_pct: u8 },
    /// Approval share fell short of the threshold
    Rejected { approval_pct: u8 },
}

impl Decision {
    pub fn passed(&self) -> bool {
        matches!(self, Decision::Approved { .. })
    }
}

/// A tally together with the decision finalizing would make right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyReport {
    pub tally: VoteTally,
    pub quorum_threshold: Amount,
    pub approval_threshold: u8,
    pub decision: Decision,
}

impl VoteTally {
    /// Add `weight` to the bucket for `kind`
    pub fn add(&mut self, kind: VoteKind, weight: Amount) -> GovernanceResult<()> {
        let bucket = match kind {
            VoteKind::For => &mut self.for_votes,
            VoteKind::Against => &mut self.against_votes,
            VoteKind::Abstain => &mut self.abstain_votes,
        };
        *bucket = bucket
            .checked_add(weight)
            .ok_or_else(|| GovernanceError::invalid_input(format!("{} tally overflow", kind)))?;
        Ok(())
    }

    /// Weight across all three kinds
    pub fn total(&self) -> Amount {
        self.for_votes
            .saturating_add(self.against_votes)
            .saturating_add(self.abstain_votes)
    }

    /// Weight that voted for or against
    pub fn decisive(&self) -> Amount {
        self.for_votes.saturating_add(self.against_votes)
    }

    /// `for * 100 / (for + against)`, rounded down. `None` when nobody voted
    /// for or against.
    pub fn approval_pct(&self) -> Option<u8> {
        let decisive = self.decisive();
        if decisive == 0 {
            return None;
        }
        let pct = match self.for_votes.checked_mul(100) {
            Some(scaled) => scaled / decisive,
            // Only reachable with astronomically large weights
            None => self.for_votes / (decisive / 100),
        };
        Some(pct.min(100) as u8)
    }

    pub fn decide(&self, quorum_threshold: Amount, approval_threshold: u8) -> Decision {
        if self.total() < quorum_threshold {
            return Decision::QuorumNotMet;
        }
        match self.approval_pct() {
            None => Decision::NoDecisiveVotes,
            Some(approval_pct) if approval_pct >= approval_threshold => {
                Decision::Approved { approval_pct }
            }
            Some(approval_pct) => Decision::Rejected { approval_pct },
        }
    }
}
