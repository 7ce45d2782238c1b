//! Token balance oracle
//!
//! The fungible-token ledger lives outside this system. The treasury and the
//! governance engine only ever query balances and move tokens into or out of
//! the treasury account through [`TokenOracle`].

use async_trait::async_trait;
use thiserror::Error;

use rdao_core::{Amount, Identity};

/// Failures reported by the token ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Insufficient token balance for {account}: requested {requested}, available {available}")]
    InsufficientBalance {
        account: Identity,
        requested: Amount,
        available: Amount,
    },

    #[error("Transfer rejected: {0}")]
    Rejected(String),

    #[error("Token ledger unavailable: {0}")]
    Unavailable(String),
}

/// Result type for token ledger calls
pub type OracleResult<T> = Result<T, OracleError>;

/// Balance queries and treasury transfers on the external token ledger
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenOracle: Send + Sync {
    /// Current token balance of `account`, used as voting weight
    async fn balance_of(&self, account: &Identity) -> OracleResult<Amount>;

    /// Move `amount` from `from` into the treasury account
    async fn transfer_in(&self, from: &Identity, amount: Amount) -> OracleResult<()>;

    /// Move `amount` from the treasury account to `to`
    async fn transfer_out(&self, to: &Identity, amount: Amount) -> OracleResult<()>;
}
