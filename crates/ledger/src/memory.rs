//! In-memory token ledger
//!
//! A reference [`TokenOracle`] holding balances in a map. It backs the
//! scenario runner and the test suites, and can be told to refuse every
//! transfer to exercise the treasury's rollback paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::debug;

use rdao_core::{Amount, Identity};

use crate::oracle::{OracleError, OracleResult, TokenOracle};

/// A memory-based token ledger with a dedicated treasury account
#[derive(Debug)]
pub struct InMemoryTokenLedger {
    treasury_account: Identity,
    balances: RwLock<HashMap<Identity, Amount>>,
    fail_transfers: AtomicBool,
}

impl InMemoryTokenLedger {
    /// Create an empty ledger whose treasury funds live in `treasury_account`
    pub fn new(treasury_account: Identity) -> Self {
        Self {
            treasury_account,
            balances: RwLock::new(HashMap::new()),
            fail_transfers: AtomicBool::new(false),
        }
    }

    pub fn treasury_account(&self) -> &Identity {
        &self.treasury_account
    }

    /// Create `amount` new tokens in `account`
    pub fn mint(&self, account: &Identity, amount: Amount) -> OracleResult<Amount> {
        let mut balances = self.write()?;
        let balance = balances.entry(account.clone()).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| OracleError::Rejected(format!("mint overflows balance of {}", account)))?;
        debug!(account = %account, amount, "Minted tokens");
        Ok(*balance)
    }

    /// Current balance of `account`
    pub fn balance(&self, account: &Identity) -> OracleResult<Amount> {
        Ok(self.read()?.get(account).copied().unwrap_or(0))
    }

    /// Move tokens between two holders
    pub fn transfer(&self, from: &Identity, to: &Identity, amount: Amount) -> OracleResult<()> {
        self.move_tokens(from, to, amount)
    }

    /// Make every subsequent transfer fail (or succeed again)
    pub fn set_fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    fn move_tokens(&self, from: &Identity, to: &Identity, amount: Amount) -> OracleResult<()> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(OracleError::Unavailable("transfers are disabled".to_string()));
        }

        let mut balances = self.write()?;
        let available = balances.get(from).copied().unwrap_or(0);
        if available < amount {
            return Err(OracleError::InsufficientBalance {
                account: from.clone(),
                requested: amount,
                available,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = balances
            .get(to)
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or_else(|| OracleError::Rejected(format!("transfer overflows balance of {}", to)))?;

        balances.insert(from.clone(), available - amount);
        balances.insert(to.clone(), credited);
        debug!(from = %from, to = %to, amount, "Moved tokens");
        Ok(())
    }

    fn read(&self) -> OracleResult<std::sync::RwLockReadGuard<'_, HashMap<Identity, Amount>>> {
        self.balances
            .read()
            .map_err(|_| OracleError::Unavailable("balance table lock poisoned".to_string()))
    }

    fn write(&self) -> OracleResult<std::sync::RwLockWriteGuard<'_, HashMap<Identity, Amount>>> {
        self.balances
            .write()
            .map_err(|_| OracleError::Unavailable("balance table lock poisoned".to_string()))
    }
}

#[async_trait]
impl TokenOracle for InMemoryTokenLedger {
    async fn balance_of(&self, account: &Identity) -> OracleResult<Amount> {
        self.balance(account)
    }

    async fn transfer_in(&self, from: &Identity, amount: Amount) -> OracleResult<()> {
        self.move_tokens(from, &self.treasury_account, amount)
    }

    async fn transfer_out(&self, to: &Identity, amount: Amount) -> OracleResult<()> {
        self.move_tokens(&self.treasury_account, to, amount)
    }
}
