//! Governance engine
//!
//! [`GovernanceEngine`] is the single writer over all governance state. Each
//! operation takes the state lock for its whole duration, including awaited
//! token-ledger and effect calls, and either commits every change it makes
//! or none of them.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use rdao_config::DaoConfig;
use rdao_core::validation::validate_non_empty;
use rdao_core::{Amount, Clock, Identity, Timestamp};
use rdao_ledger::{TokenOracle, Treasury};

use crate::access::{AccessGuard, Role};
use crate::events::{EventLog, EventRecord, GovernanceEvent};
use crate::execution::{EffectCall, EffectHandler, EffectRegistry, EffectTarget};
use crate::grants::{Grant, GrantBook, GrantId, NewGrant};
use crate::parameters::{GovernanceParams, ParameterStore};
use crate::proposals::{NewProposal, Proposal, ProposalBook, ProposalId, ProposalStatus};
use crate::voting::{TallyReport, VoteKind, VoteRecord};
use crate::{GovernanceError, GovernanceResult};

/// Everything the engine owns, behind one lock
#[derive(Debug)]
struct EngineState {
    guard: AccessGuard,
    params: ParameterStore,
    proposals: ProposalBook,
    grants: GrantBook,
    treasury: Treasury,
    events: EventLog,
}

impl EngineState {
    fn emit(&mut self, now: Timestamp, event: GovernanceEvent) {
        let name = event.name();
        let sequence = self.events.append(now, event);
        debug!(sequence, event = name, "Appended event");
    }

    fn status_changed(
        &mut self,
        now: Timestamp,
        actor: &Identity,
        proposal_id: ProposalId,
        from: ProposalStatus,
    ) -> GovernanceResult<()> {
        let proposal = self.proposals.get(proposal_id)?;
        let event = GovernanceEvent::ProposalStatusChanged {
            proposal_id,
            actor: actor.clone(),
            from,
            to: proposal.status,
            tally: proposal.tally,
            execution_time: proposal.execution_time,
        };
        self.emit(now, event);
        Ok(())
    }
}

/// Proposal, voting, treasury and grant engine
pub struct GovernanceEngine {
    /// All mutable governance state
    state: Mutex<EngineState>,
    /// Handlers for proposal effects
    effects: RwLock<EffectRegistry>,
    /// External token ledger
    oracle: Arc<dyn TokenOracle>,
    /// Source of the current time
    clock: Arc<dyn Clock>,
}

impl GovernanceEngine {
    /// Create an engine where `bootstrap_admin` holds every role
    pub fn new(
        bootstrap_admin: Identity,
        params: GovernanceParams,
        oracle: Arc<dyn TokenOracle>,
        clock: Arc<dyn Clock>,
    ) -> GovernanceResult<Self> {
        if !bootstrap_admin.is_valid() {
            return Err(GovernanceError::invalid_input(format!(
                "invalid bootstrap admin {:?}",
                bootstrap_admin.as_str()
            )));
        }
        let params = ParameterStore::new(params)?;
        info!(admin = %bootstrap_admin, params = ?params.current(), "Governance engine initialized");

        Ok(Self {
            state: Mutex::new(EngineState {
                guard: AccessGuard::new(bootstrap_admin),
                params,
                proposals: ProposalBook::new(),
                grants: GrantBook::new(),
                treasury: Treasury::new(),
                events: EventLog::new(),
            }),
            effects: RwLock::new(EffectRegistry::new()),
            oracle,
            clock,
        })
    }

    /// Create an engine from loaded configuration
    pub fn from_config(
        config: &DaoConfig,
        oracle: Arc<dyn TokenOracle>,
        clock: Arc<dyn Clock>,
    ) -> GovernanceResult<Self> {
        config
            .validate()
            .map_err(|e| GovernanceError::InvalidInput(e.to_string()))?;
        Self::new(
            config.bootstrap_identity(),
            GovernanceParams::from_settings(&config.governance),
            oracle,
            clock,
        )
    }

    /// Register the handler proposals with an effect on `target` will invoke
    pub async fn register_effect_handler(&self, target: EffectTarget, handler: Arc<dyn EffectHandler>) {
        self.effects.write().await.register(target, handler);
    }

    pub async fn effect_targets(&self) -> Vec<EffectTarget> {
        self.effects.read().await.targets()
    }

    fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // ---- Access guard ----

    /// Give `role` to `account`. Admin only; allowed while paused.
    pub async fn grant_role(&self, caller: &Identity, account: &Identity, role: Role) -> GovernanceResult<bool> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_role(caller, Role::Admin)?;
        let now = self.now();

        let granted = state.guard.grant_role(account, role)?;
        if granted {
            info!(actor = %caller, account = %account, %role, "Role granted");
            state.emit(
                now,
                GovernanceEvent::RoleGranted {
                    actor: caller.clone(),
                    account: account.clone(),
                    role,
                },
            );
        }
        Ok(granted)
    }

    /// Take `role` from `account`. Admin only; allowed while paused.
    pub async fn revoke_role(&self, caller: &Identity, account: &Identity, role: Role) -> GovernanceResult<bool> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_role(caller, Role::Admin)?;
        let now = self.now();

        let revoked = state.guard.revoke_role(account, role)?;
        if revoked {
            info!(actor = %caller, account = %account, %role, "Role revoked");
            state.emit(
                now,
                GovernanceEvent::RoleRevoked {
                    actor: caller.clone(),
                    account: account.clone(),
                    role,
                },
            );
        }
        Ok(revoked)
    }

    /// Halt every mutating operation except role management and unpause
    pub async fn pause(&self, caller: &Identity) -> GovernanceResult<()> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_role(caller, Role::Admin)?;
        let now = self.now();

        state.guard.pause()?;
        warn!(actor = %caller, "Governance paused");
        state.emit(now, GovernanceEvent::Paused { actor: caller.clone() });
        Ok(())
    }

    pub async fn unpause(&self, caller: &Identity) -> GovernanceResult<()> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_role(caller, Role::Admin)?;
        let now = self.now();

        state.guard.unpause()?;
        info!(actor = %caller, "Governance unpaused");
        state.emit(now, GovernanceEvent::Unpaused { actor: caller.clone() });
        Ok(())
    }

    pub async fn has_role(&self, account: &Identity, role: Role) -> bool {
        self.state.lock().await.guard.check_role(account, role)
    }

    pub async fn role_members(&self, role: Role) -> Vec<Identity> {
        self.state.lock().await.guard.members(role)
    }

    pub async fn is_paused(&self) -> bool {
        self.state.lock().await.guard.is_halted()
    }

    // ---- Proposals ----

    /// Open a proposal for voting. The caller must hold at least the
    /// minimum proposal stake.
    pub async fn create_proposal(&self, caller: &Identity, proposal: NewProposal) -> GovernanceResult<ProposalId> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_not_halted()?;
        let now = self.now();

        validate_non_empty(&proposal.title, "title")?;
        let params = *state.params.current();
        let balance = self.oracle.balance_of(caller).await?;
        if balance < params.min_proposal_stake {
            return Err(GovernanceError::unauthorized(format!(
                "{} holds {} tokens, proposing requires {}",
                caller, balance, params.min_proposal_stake
            )));
        }

        let title = proposal.title.clone();
        let proposal_type = proposal.proposal_type;
        let proposal_id = state
            .proposals
            .insert(caller.clone(), proposal, now, params.voting_period)?;
        let end_time = state.proposals.get(proposal_id)?.end_time;

        info!(proposal_id, proposer = %caller, end_time, "Proposal created");
        state.emit(
            now,
            GovernanceEvent::ProposalCreated {
                proposal_id,
                proposer: caller.clone(),
                title,
                proposal_type,
                start_time: now,
                end_time,
            },
        );
        Ok(proposal_id)
    }

    /// Vote with the caller's current token balance as weight
    pub async fn cast_vote(&self, caller: &Identity, proposal_id: ProposalId, kind: VoteKind) -> GovernanceResult<VoteRecord> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_not_halted()?;
        let now = self.now();

        state.proposals.ensure_votable(proposal_id, caller, now)?;
        let weight = self.oracle.balance_of(caller).await?;
        if weight == 0 {
            return Err(GovernanceError::unauthorized(format!("{} has no voting weight", caller)));
        }

        let record = VoteRecord {
            proposal_id,
            voter: caller.clone(),
            kind,
            weight,
            cast_at: now,
        };
        state.proposals.record_vote(record.clone())?;

        info!(proposal_id, voter = %caller, %kind, weight, "Vote cast");
        state.emit(
            now,
            GovernanceEvent::VoteCast {
                proposal_id,
                voter: caller.clone(),
                kind,
                weight,
            },
        );
        Ok(record)
    }

    /// Close voting and decide the outcome with the current thresholds
    pub async fn finalize_proposal(&self, caller: &Identity, proposal_id: ProposalId) -> GovernanceResult<ProposalStatus> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_not_halted()?;
        let now = self.now();
        let params = *state.params.current();

        let proposal = state.proposals.get_mut(proposal_id)?;
        proposal.require_status(ProposalStatus::Active)?;
        if now < proposal.end_time {
            return Err(GovernanceError::timing(format!(
                "voting on proposal {} is open until {}",
                proposal_id, proposal.end_time
            )));
        }

        let decision = proposal
            .tally
            .decide(params.quorum_threshold, params.approval_threshold);
        let (next, execution_time) = if decision.passed() {
            let at = now.checked_add(params.execution_delay).ok_or_else(|| {
                GovernanceError::invalid_input("execution delay overflows the clock")
            })?;
            (ProposalStatus::Succeeded, Some(at))
        } else {
            (ProposalStatus::Defeated, None)
        };

        let from = proposal.transition(next)?;
        proposal.execution_time = execution_time;
        info!(
            proposal_id,
            ?decision,
            total = proposal.tally.total(),
            status = %next,
            "Proposal finalized"
        );

        state.status_changed(now, caller, proposal_id, from)?;
        Ok(next)
    }

    /// Carry out a succeeded proposal once its execution delay has passed
    pub async fn execute_proposal(&self, caller: &Identity, proposal_id: ProposalId) -> GovernanceResult<()> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_not_halted()?;
        let now = self.now();
        let params = *state.params.current();

        let proposal = state.proposals.get(proposal_id)?;
        proposal.require_status(ProposalStatus::Succeeded)?;
        let execution_time = proposal.execution_time.ok_or_else(|| {
            GovernanceError::invalid_state(format!("proposal {} has no execution time", proposal_id))
        })?;
        if now < execution_time {
            return Err(GovernanceError::timing(format!(
                "proposal {} is executable from {}",
                proposal_id, execution_time
            )));
        }
        if let Some(deadline) = params.execution_deadline(execution_time) {
            if now > deadline {
                return Err(GovernanceError::timing(format!(
                    "execution window of proposal {} closed at {}",
                    proposal_id, deadline
                )));
            }
        }

        let effect = proposal.effect.clone();
        if let Some(effect) = effect.as_ref().filter(|effect| effect.is_invocable()) {
            let call = EffectCall {
                proposal_id,
                target: effect.target.clone(),
                payload: effect.payload.clone(),
            };
            self.effects.read().await.dispatch(&call).await?;
        }

        let from = state.proposals.get_mut(proposal_id)?.transition(ProposalStatus::Executed)?;
        info!(proposal_id, executor = %caller, "Proposal executed");

        state.emit(
            now,
            GovernanceEvent::ProposalExecuted {
                proposal_id,
                executor: caller.clone(),
                effect_target: effect.map(|effect| effect.target),
            },
        );
        state.status_changed(now, caller, proposal_id, from)?;
        Ok(())
    }

    /// Withdraw an active proposal. Proposer or admin only.
    pub async fn cancel_proposal(&self, caller: &Identity, proposal_id: ProposalId) -> GovernanceResult<()> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_not_halted()?;
        let now = self.now();
        let is_admin = state.guard.check_role(caller, Role::Admin);

        let proposal = state.proposals.get_mut(proposal_id)?;
        proposal.require_status(ProposalStatus::Active)?;
        if &proposal.proposer != caller && !is_admin {
            return Err(GovernanceError::unauthorized(format!(
                "only the proposer or an admin can cancel proposal {}",
                proposal_id
            )));
        }

        let from = proposal.transition(ProposalStatus::Canceled)?;
        info!(proposal_id, actor = %caller, "Proposal canceled");
        state.status_changed(now, caller, proposal_id, from)?;
        Ok(())
    }

    /// Retire a succeeded proposal whose execution window has closed
    pub async fn expire_proposal(&self, caller: &Identity, proposal_id: ProposalId) -> GovernanceResult<()> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_not_halted()?;
        let now = self.now();
        let params = *state.params.current();

        let proposal = state.proposals.get_mut(proposal_id)?;
        proposal.require_status(ProposalStatus::Succeeded)?;
        let deadline = proposal
            .execution_time
            .and_then(|at| params.execution_deadline(at))
            .ok_or_else(|| GovernanceError::invalid_state("no execution grace period is configured"))?;
        if now <= deadline {
            return Err(GovernanceError::timing(format!(
                "proposal {} stays executable until {}",
                proposal_id, deadline
            )));
        }

        let from = proposal.transition(ProposalStatus::Expired)?;
        info!(proposal_id, deadline, "Proposal expired");
        state.status_changed(now, caller, proposal_id, from)?;
        Ok(())
    }

    pub async fn proposal(&self, proposal_id: ProposalId) -> GovernanceResult<Proposal> {
        self.state.lock().await.proposals.get(proposal_id).cloned()
    }

    /// All proposals in ascending id order
    pub async fn proposals(&self) -> Vec<Proposal> {
        self.state.lock().await.proposals.iter().cloned().collect()
    }

    pub async fn proposal_count(&self) -> usize {
        self.state.lock().await.proposals.len()
    }

    pub async fn vote_of(&self, proposal_id: ProposalId, voter: &Identity) -> Option<VoteRecord> {
        self.state.lock().await.proposals.vote_of(proposal_id, voter).cloned()
    }

    pub async fn votes(&self, proposal_id: ProposalId) -> GovernanceResult<Vec<VoteRecord>> {
        let state = self.state.lock().await;
        state.proposals.get(proposal_id)?;
        Ok(state.proposals.votes(proposal_id))
    }

    /// Current tally and the decision finalizing would make right now
    pub async fn tally(&self, proposal_id: ProposalId) -> GovernanceResult<TallyReport> {
        let state = self.state.lock().await;
        let params = state.params.current();
        let tally = state.proposals.get(proposal_id)?.tally;
        Ok(TallyReport {
            tally,
            quorum_threshold: params.quorum_threshold,
            approval_threshold: params.approval_threshold,
            decision: tally.decide(params.quorum_threshold, params.approval_threshold),
        })
    }

    // ---- Treasury ----

    /// Move `amount` of the caller's tokens into the treasury
    pub async fn deposit(&self, caller: &Identity, amount: Amount) -> GovernanceResult<Amount> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_not_halted()?;
        let now = self.now();

        let balance = state
            .treasury
            .deposit(self.oracle.as_ref(), caller, amount)
            .await?;
        state.emit(
            now,
            GovernanceEvent::Deposited {
                from: caller.clone(),
                amount,
                balance,
            },
        );
        Ok(balance)
    }

    /// Pay `amount` from the treasury to `to`. Admin only.
    pub async fn withdraw(&self, caller: &Identity, to: &Identity, amount: Amount) -> GovernanceResult<Amount> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_not_halted()?;
        state.guard.require_role(caller, Role::Admin)?;
        let now = self.now();

        let balance = state
            .treasury
            .withdraw(self.oracle.as_ref(), to, amount)
            .await?;
        state.emit(
            now,
            GovernanceEvent::Withdrawn {
                actor: caller.clone(),
                to: to.clone(),
                amount,
                balance,
            },
        );
        Ok(balance)
    }

    pub async fn treasury(&self) -> Treasury {
        self.state.lock().await.treasury
    }

    pub async fn treasury_balance(&self) -> Amount {
        self.state.lock().await.treasury.balance()
    }

    // ---- Grants ----

    /// Approve a grant. Admin only. The treasury must cover the amount now,
    /// but nothing is reserved for the later claim.
    pub async fn create_grant(&self, caller: &Identity, grant: NewGrant) -> GovernanceResult<GrantId> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_not_halted()?;
        state.guard.require_role(caller, Role::Admin)?;
        let now = self.now();

        grant.validate()?;
        state.treasury.ensure_available(grant.amount)?;
        let grant_id = state.grants.insert(grant, now)?;

        let stored = state.grants.get(grant_id)?;
        let event = GovernanceEvent::GrantCreated {
            grant_id,
            actor: caller.clone(),
            recipient: stored.recipient.clone(),
            amount: stored.amount,
            expiration_time: stored.expiration_time,
        };
        info!(grant_id, recipient = %stored.recipient, amount = stored.amount, "Grant created");
        state.emit(now, event);
        Ok(grant_id)
    }

    /// Pay out a grant to its recipient
    pub async fn claim_grant(&self, caller: &Identity, grant_id: GrantId) -> GovernanceResult<Amount> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_not_halted()?;
        let now = self.now();

        let amount = state.grants.check_claim(grant_id, caller, now)?.amount;
        let balance = state
            .treasury
            .disburse_grant(self.oracle.as_ref(), caller, amount)
            .await?;
        state.grants.mark_claimed(grant_id, now)?;

        info!(grant_id, recipient = %caller, amount, "Grant claimed");
        state.emit(
            now,
            GovernanceEvent::GrantClaimed {
                grant_id,
                recipient: caller.clone(),
                amount,
                balance,
            },
        );
        Ok(amount)
    }

    pub async fn grant(&self, grant_id: GrantId) -> GovernanceResult<Grant> {
        self.state.lock().await.grants.get(grant_id).cloned()
    }

    pub async fn grants(&self) -> Vec<Grant> {
        self.state.lock().await.grants.iter().cloned().collect()
    }

    pub async fn grants_for(&self, recipient: &Identity) -> Vec<Grant> {
        self.state
            .lock()
            .await
            .grants
            .for_recipient(recipient)
            .cloned()
            .collect()
    }

    /// Total of unclaimed, unexpired grants. May exceed the treasury balance.
    pub async fn outstanding_commitments(&self) -> Amount {
        let now = self.now();
        self.state.lock().await.grants.outstanding(now)
    }

    // ---- Parameters ----

    /// Replace voting period, execution delay, quorum and approval threshold
    pub async fn update_governance_params(
        &self,
        caller: &Identity,
        voting_period: u64,
        execution_delay: u64,
        quorum_threshold: Amount,
        approval_threshold: u8,
    ) -> GovernanceResult<GovernanceParams> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_not_halted()?;
        state.guard.require_role(caller, Role::Admin)?;
        let now = self.now();

        let params = state
            .params
            .update(voting_period, execution_delay, quorum_threshold, approval_threshold)?;
        info!(actor = %caller, ?params, "Governance parameters updated");
        state.emit(
            now,
            GovernanceEvent::ParametersUpdated {
                actor: caller.clone(),
                params,
            },
        );
        Ok(params)
    }

    /// Bound (or unbound) how long succeeded proposals stay executable
    pub async fn set_execution_grace_period(&self, caller: &Identity, grace: Option<u64>) -> GovernanceResult<GovernanceParams> {
        let mut locked = self.state.lock().await;
        let state = &mut *locked;
        state.guard.require_not_halted()?;
        state.guard.require_role(caller, Role::Admin)?;
        let now = self.now();

        let params = state.params.set_execution_grace_period(grace)?;
        info!(actor = %caller, ?grace, "Execution grace period updated");
        state.emit(
            now,
            GovernanceEvent::ParametersUpdated {
                actor: caller.clone(),
                params,
            },
        );
        Ok(params)
    }

    pub async fn parameters(&self) -> GovernanceParams {
        *self.state.lock().await.params.current()
    }

    // ---- Events ----

    pub async fn events(&self) -> Vec<EventRecord> {
        self.state.lock().await.events.records().to_vec()
    }

    /// Events appended after `sequence`
    pub async fn events_since(&self, sequence: u64) -> Vec<EventRecord> {
        self.state.lock().await.events.since(sequence).to_vec()
    }

    /// Snapshot of the whole event log
    pub async fn event_log(&self) -> EventLog {
        self.state.lock().await.events.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use async_trait::async_trait;
    use mockall::mock;
    use rdao_core::{ManualClock, DAY};
    use rdao_ledger::{OracleError, OracleResult};

    mock! {
        Oracle {}

        #[async_trait]
        impl TokenOracle for Oracle {
            async fn balance_of(&self, account: &Identity) -> OracleResult<Amount>;
            async fn transfer_in(&self, from: &Identity, amount: Amount) -> OracleResult<()>;
            async fn transfer_out(&self, to: &Identity, amount: Amount) -> OracleResult<()>;
        }
    }

    fn admin() -> Identity {
        Identity::new("admin")
    }

    fn engine_with(oracle: MockOracle) -> GovernanceEngine {
        GovernanceEngine::new(
            admin(),
            GovernanceParams::default(),
            Arc::new(oracle),
            Arc::new(ManualClock::new(1_000)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_bootstrap_admin() {
        let result = GovernanceEngine::new(
            Identity::new(""),
            GovernanceParams::default(),
            Arc::new(MockOracle::new()),
            Arc::new(ManualClock::new(0)),
        );
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::InvalidInput));
    }

    #[tokio::test]
    async fn test_empty_title_is_rejected_before_the_oracle() {
        let mut oracle = MockOracle::new();
        oracle.expect_balance_of().never();
        let engine = engine_with(oracle);

        let err = engine
            .create_proposal(&admin(), NewProposal::new("   ", "blank"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(engine.proposal_count().await, 0);
    }

    #[tokio::test]
    async fn test_insufficient_stake() {
        let mut oracle = MockOracle::new();
        oracle.expect_balance_of().returning(|_| Ok(999));
        let engine = engine_with(oracle);

        let err = engine
            .create_proposal(&admin(), NewProposal::new("Fund lab", ""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(engine.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_oracle_outage_while_voting() {
        let mut oracle = MockOracle::new();
        let mut calls = 0;
        oracle.expect_balance_of().returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(5_000)
            } else {
                Err(OracleError::Unavailable("node offline".to_string()))
            }
        });
        let engine = engine_with(oracle);
        let id = engine
            .create_proposal(&admin(), NewProposal::new("Fund lab", ""))
            .await
            .unwrap();

        let err = engine.cast_vote(&admin(), id, VoteKind::For).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransferFailed);
        assert!(engine.vote_of(id, &admin()).await.is_none());
        assert_eq!(engine.proposal(id).await.unwrap().tally.total(), 0);
    }

    #[tokio::test]
    async fn test_zero_weight_vote() {
        let mut oracle = MockOracle::new();
        oracle
            .expect_balance_of()
            .returning(|who| Ok(if who.as_str() == "admin" { 1_000 } else { 0 }));
        let engine = engine_with(oracle);
        let id = engine
            .create_proposal(&admin(), NewProposal::new("Fund lab", ""))
            .await
            .unwrap();

        let err = engine
            .cast_vote(&Identity::new("broke"), id, VoteKind::For)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_failed_deposit_emits_nothing() {
        let mut oracle = MockOracle::new();
        oracle
            .expect_transfer_in()
            .returning(|_, _| Err(OracleError::Rejected("allowance".to_string())));
        let engine = engine_with(oracle);

        let err = engine.deposit(&admin(), 10).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransferFailed);
        assert_eq!(engine.treasury_balance().await, 0);
        assert!(engine.events().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_admin_cannot_pause() {
        let engine = engine_with(MockOracle::new());
        let err = engine.pause(&Identity::new("mallory")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(!engine.is_paused().await);
    }

    #[tokio::test]
    async fn test_votes_for_unknown_proposal() {
        let engine = engine_with(MockOracle::new());
        assert_eq!(engine.votes(0).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(engine.tally(3).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(engine.grant(1).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_parameters_start_from_defaults() {
        let engine = engine_with(MockOracle::new());
        let params = engine.parameters().await;
        assert_eq!(params.voting_period, 7 * DAY);
        assert_eq!(params.execution_delay, 2 * DAY);
    }
}
