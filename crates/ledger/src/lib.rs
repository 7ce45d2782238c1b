//! Treasury ledger for the research DAO
//!
//! This crate tracks the pooled treasury balance and defines the narrow
//! interface through which the external fungible-token ledger is consumed.
//! Every balance change is staged locally and only committed once the token
//! ledger has accepted the matching transfer.

use thiserror::Error;

use rdao_core::Amount;

pub mod memory;
pub mod oracle;
pub mod treasury;

// Re-exports
pub use memory::InMemoryTokenLedger;
pub use oracle::{OracleError, OracleResult, TokenOracle};
pub use treasury::Treasury;

/// Error types for treasury operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Zero or otherwise unusable amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Malformed source or destination account
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// Treasury balance too small
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { requested: Amount, available: Amount },

    /// Running totals would overflow
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// The token ledger refused or failed the transfer
    #[error("Transfer failed: {0}")]
    TransferFailed(#[from] OracleError),
}

/// Result type for treasury operations
pub type LedgerResult<T> = Result<T, LedgerError>;
