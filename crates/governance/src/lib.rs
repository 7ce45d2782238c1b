//! Governance engine for the research DAO
//!
//! This crate provides proposal creation, token-weighted voting, quorum and
//! approval tallying, delayed execution, research grants and the access
//! guard that gates all of them. [`GovernanceEngine`] composes the pieces
//! behind a single writer lock.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rdao_core::CoreError;
use rdao_ledger::{LedgerError, OracleError};

pub mod access;
pub mod events;
pub mod execution;
pub mod grants;
pub mod manager;
pub mod parameters;
pub mod proposals;
pub mod voting;

// Re-exports
pub use access::{AccessGuard, Role};
pub use events::{EventLog, EventRecord, GovernanceEvent};
pub use execution::{
    EffectCall, EffectError, EffectHandler, EffectRegistry, EffectTarget, LoggingEffectHandler,
    ProposalEffect,
};
pub use grants::{Grant, GrantBook, GrantId, NewGrant};
pub use manager::GovernanceEngine;
pub use parameters::{GovernanceParams, ParameterStore};
pub use proposals::{NewProposal, Proposal, ProposalBook, ProposalId, ProposalStatus, ProposalType};
pub use voting::{Decision, TallyReport, VoteKind, VoteRecord, VoteTally};

/// Error types for governance operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GovernanceError {
    /// Malformed arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown proposal or grant id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing role, not the owner, or not enough stake or weight
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The system-wide halt flag is set
    #[error("Halted: {0}")]
    Halted(String),

    /// Operation not valid for the current status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Called too early or too late
    #[error("Timing violation: {0}")]
    TimingViolation(String),

    /// Duplicate vote or claim
    #[error("Already processed: {0}")]
    AlreadyProcessed(String),

    /// Treasury shortfall
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// The token ledger reported a failure
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// A proposal effect reported a failure
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Fieldless mirror of [`GovernanceError`] for matching on the failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Unauthorized,
    Halted,
    InvalidState,
    TimingViolation,
    AlreadyProcessed,
    InsufficientFunds,
    TransferFailed,
    ExecutionFailed,
}

impl GovernanceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Halted(_) => ErrorKind::Halted,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::TimingViolation(_) => ErrorKind::TimingViolation,
            Self::AlreadyProcessed(_) => ErrorKind::AlreadyProcessed,
            Self::InsufficientFunds(_) => ErrorKind::InsufficientFunds,
            Self::TransferFailed(_) => ErrorKind::TransferFailed,
            Self::ExecutionFailed(_) => ErrorKind::ExecutionFailed,
        }
    }

    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub(crate) fn timing(msg: impl Into<String>) -> Self {
        Self::TimingViolation(msg.into())
    }

    pub(crate) fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
}

impl From<LedgerError> for GovernanceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidAmount(_) | LedgerError::InvalidAccount(_) | LedgerError::Overflow(_) => {
                Self::InvalidInput(err.to_string())
            }
            LedgerError::InsufficientFunds { .. } => Self::InsufficientFunds(err.to_string()),
            LedgerError::TransferFailed(inner) => Self::TransferFailed(inner.to_string()),
        }
    }
}

impl From<OracleError> for GovernanceError {
    fn from(err: OracleError) -> Self {
        Self::TransferFailed(err.to_string())
    }
}

impl From<CoreError> for GovernanceError {
    fn from(err: CoreError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Result type for governance operations
pub type GovernanceResult<T> = Result<T, GovernanceError>;
