//! Treasury, grant and access-guard tests through the engine

use std::sync::Arc;

use proptest::prelude::*;

use rdao_config::DaoConfig;
use rdao_core::{Amount, Identity, ManualClock, DAY};
use rdao_governance::{ErrorKind, GovernanceEngine, GovernanceEvent, GovernanceParams, NewGrant, Role};
use rdao_ledger::InMemoryTokenLedger;

const START: u64 = 1_700_000_000;

fn admin() -> Identity {
    Identity::new("admin")
}

fn id(name: &str) -> Identity {
    Identity::new(name)
}

fn setup() -> (GovernanceEngine, Arc<InMemoryTokenLedger>, Arc<ManualClock>) {
    let tokens = Arc::new(InMemoryTokenLedger::new(id("treasury")));
    let clock = Arc::new(ManualClock::new(START));
    let engine = GovernanceEngine::new(admin(), GovernanceParams::default(), tokens.clone(), clock.clone())
        .expect("engine");
    (engine, tokens, clock)
}

#[tokio::test]
async fn test_deposit_and_withdraw() {
    let (engine, tokens, _clock) = setup();
    let donor = id("donor");
    tokens.mint(&donor, 10_000).unwrap();

    assert_eq!(engine.deposit(&donor, 4_000).await.unwrap(), 4_000);
    assert_eq!(tokens.balance(&donor).unwrap(), 6_000);

    let err = engine.deposit(&donor, 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = engine.withdraw(&donor, &donor, 100).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let err = engine.withdraw(&admin(), &id("ops"), 4_001).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    let err = engine.withdraw(&admin(), &id(""), 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert_eq!(engine.withdraw(&admin(), &id("ops"), 1_500).await.unwrap(), 2_500);
    assert_eq!(tokens.balance(&id("ops")).unwrap(), 1_500);

    let treasury = engine.treasury().await;
    assert_eq!(treasury.total_deposited(), 4_000);
    assert_eq!(treasury.total_withdrawn(), 1_500);
    assert!(treasury.is_consistent());
}

#[tokio::test]
async fn test_deposit_beyond_token_balance() {
    let (engine, tokens, _clock) = setup();
    let donor = id("donor");
    tokens.mint(&donor, 100).unwrap();

    let err = engine.deposit(&donor, 101).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransferFailed);
    assert_eq!(engine.treasury_balance().await, 0);
}

#[test_log::test(tokio::test)]
async fn test_failed_withdrawal_is_atomic() {
    let (engine, tokens, _clock) = setup();
    let donor = id("donor");
    tokens.mint(&donor, 1_000).unwrap();
    engine.deposit(&donor, 1_000).await.unwrap();
    let before = engine.events().await.len();

    tokens.set_fail_transfers(true);
    let err = engine.withdraw(&admin(), &id("ops"), 500).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransferFailed);
    assert_eq!(engine.treasury_balance().await, 1_000);
    assert_eq!(engine.events().await.len(), before);
}

#[tokio::test]
async fn test_grant_creation_rules() {
    let (engine, tokens, _clock) = setup();
    let donor = id("donor");
    tokens.mint(&donor, 1_000).unwrap();
    engine.deposit(&donor, 1_000).await.unwrap();

    let err = engine
        .create_grant(&donor, NewGrant::new(id("lab"), 10, "t", 30))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let err = engine
        .create_grant(&admin(), NewGrant::new(id("lab"), 1_001, "t", 30))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);

    for grant in [
        NewGrant::new(id("lab"), 0, "t", 30),
        NewGrant::new(id(""), 10, "t", 30),
        NewGrant::new(id("lab"), 10, "t", 0),
    ] {
        let err = engine.create_grant(&admin(), grant).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    let grant_id = engine
        .create_grant(&admin(), NewGrant::new(id("lab"), 1_000, "t", 30).with_description("d"))
        .await
        .unwrap();
    let grant = engine.grant(grant_id).await.unwrap();
    assert_eq!(grant.approval_time, START);
    assert_eq!(grant.expiration_time, START + 30 * DAY);
    assert!(!grant.claimed);
    // Nothing is reserved
    assert_eq!(engine.treasury_balance().await, 1_000);
}

#[tokio::test]
async fn test_claim_rules() {
    let (engine, tokens, clock) = setup();
    let donor = id("donor");
    let lab = id("lab");
    tokens.mint(&donor, 1_000).unwrap();
    engine.deposit(&donor, 1_000).await.unwrap();
    let grant_id = engine
        .create_grant(&admin(), NewGrant::new(lab.clone(), 300, "t", 1))
        .await
        .unwrap();

    let err = engine.claim_grant(&id("mallory"), grant_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    let err = engine.claim_grant(&lab, grant_id + 1).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    clock.advance(DAY + 1);
    let err = engine.claim_grant(&lab, grant_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TimingViolation);
    assert_eq!(engine.treasury_balance().await, 1_000);
    assert_eq!(engine.outstanding_commitments().await, 0);
}

#[tokio::test]
async fn test_unescrowed_grant_can_become_unclaimable() {
    let (engine, tokens, _clock) = setup();
    let donor = id("donor");
    let lab = id("lab");
    tokens.mint(&donor, 1_000).unwrap();
    engine.deposit(&donor, 1_000).await.unwrap();

    let grant_id = engine
        .create_grant(&admin(), NewGrant::new(lab.clone(), 800, "t", 30))
        .await
        .unwrap();
    engine.withdraw(&admin(), &id("ops"), 500).await.unwrap();
    assert!(engine.outstanding_commitments().await > engine.treasury_balance().await);

    let err = engine.claim_grant(&lab, grant_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert!(!engine.grant(grant_id).await.unwrap().claimed);

    // Topping the treasury up makes it claimable again
    tokens.mint(&donor, 300).unwrap();
    engine.deposit(&donor, 300).await.unwrap();
    engine.claim_grant(&lab, grant_id).await.unwrap();
    assert_eq!(engine.treasury_balance().await, 0);
}

#[tokio::test]
async fn test_failed_claim_transfer_keeps_grant_unclaimed() {
    let (engine, tokens, _clock) = setup();
    let donor = id("donor");
    let lab = id("lab");
    tokens.mint(&donor, 1_000).unwrap();
    engine.deposit(&donor, 1_000).await.unwrap();
    let grant_id = engine
        .create_grant(&admin(), NewGrant::new(lab.clone(), 400, "t", 30))
        .await
        .unwrap();

    tokens.set_fail_transfers(true);
    let err = engine.claim_grant(&lab, grant_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransferFailed);
    assert!(!engine.grant(grant_id).await.unwrap().claimed);
    assert_eq!(engine.treasury_balance().await, 1_000);

    tokens.set_fail_transfers(false);
    engine.claim_grant(&lab, grant_id).await.unwrap();
    let grant = engine.grant(grant_id).await.unwrap();
    assert!(grant.claimed);
    assert_eq!(grant.claimed_at, Some(START));
    assert_eq!(engine.grants_for(&lab).await.len(), 1);

    let claimed: Vec<Amount> = engine
        .events()
        .await
        .into_iter()
        .filter_map(|record| match record.event {
            GovernanceEvent::GrantClaimed { amount, .. } => Some(amount),
            _ => None,
        })
        .collect();
    assert_eq!(claimed, vec![400]);
}

#[tokio::test]
async fn test_role_management() {
    let (engine, _tokens, _clock) = setup();
    let lab = id("lab");

    let err = engine.grant_role(&lab, &lab, Role::Admin).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    assert!(engine.grant_role(&admin(), &lab, Role::CoreTeam).await.unwrap());
    assert!(!engine.grant_role(&admin(), &lab, Role::CoreTeam).await.unwrap());
    assert!(engine.has_role(&lab, Role::CoreTeam).await);
    assert!(!engine.has_role(&lab, Role::Admin).await);

    let err = engine.revoke_role(&admin(), &admin(), Role::Admin).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    assert!(engine.revoke_role(&admin(), &lab, Role::CoreTeam).await.unwrap());
    assert_eq!(engine.role_members(Role::CoreTeam).await, vec![admin()]);

    let err = engine.unpause(&admin()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    engine.pause(&admin()).await.unwrap();
    let err = engine.pause(&admin()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(engine.is_paused().await);
}

#[tokio::test]
async fn test_engine_from_config() {
    let tokens = Arc::new(InMemoryTokenLedger::new(id("treasury")));
    let clock = Arc::new(ManualClock::new(START));
    let mut config = DaoConfig::with_admin("council");
    config.governance.quorum_threshold = 42;
    config.governance.execution_grace_period_secs = Some(DAY);

    let engine = GovernanceEngine::from_config(&config, tokens.clone(), clock.clone()).unwrap();
    let params = engine.parameters().await;
    assert_eq!(params.quorum_threshold, 42);
    assert_eq!(params.execution_grace_period, Some(DAY));
    assert!(engine.has_role(&id("council"), Role::Admin).await);

    config.governance.approval_threshold_pct = 0;
    assert!(GovernanceEngine::from_config(&config, tokens, clock).is_err());
}

#[derive(Debug, Clone)]
enum Op {
    Deposit(Amount),
    Withdraw(Amount),
    Grant(Amount),
    Claim(u64),
    Advance(u64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u128..3_000).prop_map(Op::Deposit),
        2 => (0u128..3_000).prop_map(Op::Withdraw),
        2 => (0u128..3_000).prop_map(Op::Grant),
        3 => (1u64..8).prop_map(Op::Claim),
        1 => (0u64..3).prop_map(|days| Op::Advance(days * DAY)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn treasury_never_drifts(ops in proptest::collection::vec(op_strategy(), 1..50)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let (engine, tokens, clock) = setup();
            let donor = id("donor");
            let lab = id("lab");
            tokens.mint(&donor, 1_000_000).unwrap();
            let mut claimed_ids = Vec::new();

            for op in ops {
                match op {
                    Op::Deposit(amount) => { let _ = engine.deposit(&donor, amount).await; }
                    Op::Withdraw(amount) => { let _ = engine.withdraw(&admin(), &donor, amount).await; }
                    Op::Grant(amount) => {
                        let _ = engine.create_grant(&admin(), NewGrant::new(lab.clone(), amount, "g", 2)).await;
                    }
                    Op::Claim(grant_id) => match engine.claim_grant(&lab, grant_id).await {
                        Ok(_) => {
                            prop_assert!(!claimed_ids.contains(&grant_id));
                            claimed_ids.push(grant_id);
                        }
                        Err(e) if claimed_ids.contains(&grant_id) => {
                            prop_assert_eq!(e.kind(), ErrorKind::AlreadyProcessed);
                        }
                        Err(_) => {}
                    },
                    Op::Advance(secs) => { clock.advance(secs); }
                }

                let treasury = engine.treasury().await;
                prop_assert!(treasury.is_consistent());
                prop_assert_eq!(treasury.balance(), tokens.balance(&id("treasury")).unwrap());
                let claimed: Amount = engine
                    .grants()
                    .await
                    .iter()
                    .filter(|grant| grant.claimed)
                    .map(|grant| grant.amount)
                    .sum();
                prop_assert_eq!(treasury.total_claimed(), claimed);
            }
            Ok(())
        })?;
    }
}
