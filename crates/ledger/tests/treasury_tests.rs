//! Tests for treasury accounting against the in-memory token ledger
//!
//! These tests drive deposits, withdrawals and grant payouts through a real
//! token ledger and check that the treasury never drifts from it.

use proptest::prelude::*;

use rdao_core::{Amount, Identity};
use rdao_ledger::{InMemoryTokenLedger, LedgerError, Treasury};

#[derive(Debug, Clone)]
enum Op {
    Deposit(Amount),
    Withdraw(Amount),
    Claim(Amount),
    Outage(bool),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u128..5_000).prop_map(Op::Deposit),
        3 => (0u128..5_000).prop_map(Op::Withdraw),
        3 => (0u128..5_000).prop_map(Op::Claim),
        1 => any::<bool>().prop_map(Op::Outage),
    ]
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime")
}

proptest! {
    #[test]
    fn treasury_matches_token_ledger(ops in proptest::collection::vec(op_strategy(), 1..60)) {
        let rt = runtime();
        rt.block_on(async {
            let tokens = InMemoryTokenLedger::new(Identity::new("treasury"));
            let funder = Identity::new("funder");
            let lab = Identity::new("lab");
            tokens.mint(&funder, 1_000_000).unwrap();

            let mut treasury = Treasury::new();
            let (mut deposited, mut withdrawn, mut claimed) = (0u128, 0u128, 0u128);

            for op in ops {
                match op {
                    Op::Deposit(amount) => {
                        if treasury.deposit(&tokens, &funder, amount).await.is_ok() {
                            deposited += amount;
                        }
                    }
                    Op::Withdraw(amount) => {
                        if treasury.withdraw(&tokens, &funder, amount).await.is_ok() {
                            withdrawn += amount;
                        }
                    }
                    Op::Claim(amount) => {
                        if treasury.disburse_grant(&tokens, &lab, amount).await.is_ok() {
                            claimed += amount;
                        }
                    }
                    Op::Outage(down) => tokens.set_fail_transfers(down),
                }

                prop_assert!(treasury.is_consistent());
                prop_assert_eq!(treasury.balance(), deposited - withdrawn - claimed);
                prop_assert_eq!(
                    treasury.balance(),
                    tokens.balance(&Identity::new("treasury")).unwrap()
                );
            }
            Ok(())
        })?;
    }
}

#[test_log::test(tokio::test)]
async fn test_outage_does_not_move_funds() {
    let tokens = InMemoryTokenLedger::new(Identity::new("treasury"));
    let funder = Identity::new("funder");
    tokens.mint(&funder, 500).unwrap();

    let mut treasury = Treasury::new();
    treasury.deposit(&tokens, &funder, 300).await.unwrap();

    tokens.set_fail_transfers(true);
    let result = treasury.withdraw(&tokens, &funder, 100).await;
    assert!(matches!(result, Err(LedgerError::TransferFailed(_))));
    assert_eq!(treasury.balance(), 300);
    assert_eq!(tokens.balance(&funder).unwrap(), 200);
}

#[tokio::test]
async fn test_deposit_beyond_holder_balance_is_a_transfer_failure() {
    let tokens = InMemoryTokenLedger::new(Identity::new("treasury"));
    let funder = Identity::new("funder");
    tokens.mint(&funder, 50).unwrap();

    let mut treasury = Treasury::new();
    let result = treasury.deposit(&tokens, &funder, 51).await;
    assert!(matches!(result, Err(LedgerError::TransferFailed(_))));
    assert_eq!(treasury, Treasury::new());
}
