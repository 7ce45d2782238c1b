//! Audit events
//!
//! Every committed mutation appends one or more events. Records are never
//! changed or removed once appended, and sequence numbers start at 1.

use serde::{Deserialize, Serialize};

use rdao_core::{Amount, Identity, Timestamp};

use crate::access::Role;
use crate::execution::EffectTarget;
use crate::grants::GrantId;
use crate::parameters::GovernanceParams;
use crate::proposals::{ProposalId, ProposalStatus, ProposalType};
use crate::voting::{VoteKind, VoteTally};

/// Something that happened to the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovernanceEvent {
    ProposalCreated {
        proposal_id: ProposalId,
        proposer: Identity,
        title: String,
        proposal_type: ProposalType,
        start_time: Timestamp,
        end_time: Timestamp,
    },
    VoteCast {
        proposal_id: ProposalId,
        voter: Identity,
        kind: VoteKind,
        weight: Amount,
    },
    ProposalStatusChanged {
        proposal_id: ProposalId,
        actor: Identity,
        from: ProposalStatus,
        to: ProposalStatus,
        tally: VoteTally,
        execution_time: Option<Timestamp>,
    },
    ProposalExecuted {
        proposal_id: ProposalId,
        executor: Identity,
        effect_target: Option<EffectTarget>,
    },
    Deposited {
        from: Identity,
        amount: Amount,
        balance: Amount,
    },
    Withdrawn {
        actor: Identity,
        to: Identity,
        amount: Amount,
        balance: Amount,
    },
    GrantCreated {
        grant_id: GrantId,
        actor: Identity,
        recipient: Identity,
        amount: Amount,
        expiration_time: Timestamp,
    },
    GrantClaimed {
        grant_id: GrantId,
        recipient: Identity,
        amount: Amount,
        balance: Amount,
    },
    ParametersUpdated {
        actor: Identity,
        params: GovernanceParams,
    },
    RoleGranted {
        actor: Identity,
        account: Identity,
        role: Role,
    },
    RoleRevoked {
        actor: Identity,
        account: Identity,
        role: Role,
    },
    Paused {
        actor: Identity,
    },
    Unpaused {
        actor: Identity,
    },
}

impl GovernanceEvent {
    /// Short name of the event kind
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProposalCreated { .. } => "ProposalCreated",
            Self::VoteCast { .. } => "VoteCast",
            Self::ProposalStatusChanged { .. } => "ProposalStatusChanged",
            Self::ProposalExecuted { .. } => "ProposalExecuted",
            Self::Deposited { .. } => "Deposited",
            Self::Withdrawn { .. } => "Withdrawn",
            Self::GrantCreated { .. } => "GrantCreated",
            Self::GrantClaimed { .. } => "GrantClaimed",
            Self::ParametersUpdated { .. } => "ParametersUpdated",
            Self::RoleGranted { .. } => "RoleGranted",
            Self::RoleRevoked { .. } => "RoleRevoked",
            Self::Paused { .. } => "Paused",
            Self::Unpaused { .. } => "Unpaused",
        }
    }
}

/// An event with its position in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub event: GovernanceEvent,
}

/// Append-only event log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, timestamp: Timestamp, event: GovernanceEvent) -> u64 {
        let sequence = self.records.len() as u64 + 1;
        self.records.push(EventRecord {
            sequence,
            timestamp,
            event,
        });
        sequence
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records with a sequence number greater than `sequence`
    pub fn since(&self, sequence: u64) -> &[EventRecord] {
        let start = usize::try_from(sequence)
            .unwrap_or(usize::MAX)
            .min(self.records.len());
        &self.records[start..]
    }

    pub fn last_sequence(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.records)
    }
}
