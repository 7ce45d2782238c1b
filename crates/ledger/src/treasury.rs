//! Treasury accounting
//!
//! The treasury is a single non-negative balance plus the running totals it
//! was built from, so that
//! `balance == total_deposited - total_withdrawn - total_claimed`
//! can be checked at any time.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use rdao_core::{Amount, Identity};

use crate::oracle::TokenOracle;
use crate::{LedgerError, LedgerResult};

/// Why funds leave the treasury
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outflow {
    /// Administrative withdrawal
    Withdrawal,
    /// Payout of a claimed grant
    GrantClaim,
}

/// The pooled balance available for withdrawals and grants
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    balance: Amount,
    total_deposited: Amount,
    total_withdrawn: Amount,
    total_claimed: Amount,
}

impl Treasury {
    /// Create an empty treasury
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn total_deposited(&self) -> Amount {
        self.total_deposited
    }

    pub fn total_withdrawn(&self) -> Amount {
        self.total_withdrawn
    }

    pub fn total_claimed(&self) -> Amount {
        self.total_claimed
    }

    /// Check the accounting identity
    pub fn is_consistent(&self) -> bool {
        self.total_deposited
            .checked_sub(self.total_withdrawn)
            .and_then(|rest| rest.checked_sub(self.total_claimed))
            == Some(self.balance)
    }

    /// Fail with `InsufficientFunds` unless `amount` is covered by the balance
    pub fn ensure_available(&self, amount: Amount) -> LedgerResult<()> {
        if amount > self.balance {
            return Err(LedgerError::InsufficientFunds {
                requested: amount,
                available: self.balance,
            });
        }
        Ok(())
    }

    /// Pull `amount` from `from` into the treasury.
    ///
    /// The balance only changes if the token ledger accepts the transfer.
    pub async fn deposit(
        &mut self,
        oracle: &dyn TokenOracle,
        from: &Identity,
        amount: Amount,
    ) -> LedgerResult<Amount> {
        validate_amount(amount)?;
        validate_account(from)?;
        let staged = self.credited(amount)?;

        if let Err(e) = oracle.transfer_in(from, amount).await {
            warn!(from = %from, amount, error = %e, "Treasury deposit rejected by token ledger");
            return Err(e.into());
        }

        *self = staged;
        info!(from = %from, amount, balance = self.balance, "Treasury deposit");
        Ok(self.balance)
    }

    /// Send `amount` to `to` as an administrative withdrawal
    pub async fn withdraw(
        &mut self,
        oracle: &dyn TokenOracle,
        to: &Identity,
        amount: Amount,
    ) -> LedgerResult<Amount> {
        self.pay_out(oracle, to, amount, Outflow::Withdrawal).await
    }

    /// Send `amount` to `to` as a grant payout
    pub async fn disburse_grant(
        &mut self,
        oracle: &dyn TokenOracle,
        to: &Identity,
        amount: Amount,
    ) -> LedgerResult<Amount> {
        self.pay_out(oracle, to, amount, Outflow::GrantClaim).await
    }

    async fn pay_out(
        &mut self,
        oracle: &dyn TokenOracle,
        to: &Identity,
        amount: Amount,
        kind: Outflow,
    ) -> LedgerResult<Amount> {
        validate_amount(amount)?;
        validate_account(to)?;
        let staged = self.debited(amount, kind)?;

        if let Err(e) = oracle.transfer_out(to, amount).await {
            warn!(to = %to, amount, ?kind, error = %e, "Treasury payout rejected by token ledger");
            return Err(e.into());
        }

        *self = staged;
        info!(to = %to, amount, ?kind, balance = self.balance, "Treasury payout");
        Ok(self.balance)
    }

    fn credited(&self, amount: Amount) -> LedgerResult<Self> {
        let mut next = *self;
        next.balance = next
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow("treasury balance".to_string()))?;
        next.total_deposited = next
            .total_deposited
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow("total deposited".to_string()))?;
        Ok(next)
    }

    fn debited(&self, amount: Amount, kind: Outflow) -> LedgerResult<Self> {
        self.ensure_available(amount)?;
        let mut next = *self;
        next.balance -= amount;
        let total = match kind {
            Outflow::Withdrawal => &mut next.total_withdrawn,
            Outflow::GrantClaim => &mut next.total_claimed,
        };
        *total = total
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow(format!("{:?} total", kind)))?;
        debug!(amount, ?kind, remaining = next.balance, "Staged treasury debit");
        Ok(next)
    }
}

fn validate_amount(amount: Amount) -> LedgerResult<()> {
    if amount == 0 {
        return Err(LedgerError::InvalidAmount("amount must be greater than zero".to_string()));
    }
    Ok(())
}

fn validate_account(account: &Identity) -> LedgerResult<()> {
    if !account.is_valid() {
        return Err(LedgerError::InvalidAccount(format!("{:?}", account.as_str())));
    }
    Ok(())
}
