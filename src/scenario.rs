//! Scenario replay
//!
//! A scenario is a YAML document describing initial token balances and an
//! ordered list of ledger operations. The runner applies each step to a
//! fresh [`GovernanceEngine`] backed by an [`InMemoryTokenLedger`] and a
//! [`ManualClock`], so a replay is fully deterministic.
//!
//! ```yaml
//! start_time: 1700000000
//! balances:
//!   alice: 150000
//! effect_targets: [registry]
//! steps:
//!   - op: create_proposal
//!     caller: alice
//!     title: Fund sequencing run
//!   - op: vote
//!     caller: alice
//!     proposal: 1
//!     kind: for
//!   - op: advance
//!     days: 7
//!   - op: finalize
//!     caller: alice
//!     proposal: 1
//!   - op: execute
//!     caller: alice
//!     proposal: 1
//!     expect_error: TimingViolation
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use rdao_config::DaoConfig;
use rdao_core::{Amount, Clock, Identity, ManualClock, Timestamp, DAY};
use rdao_governance::{
    ErrorKind, EventRecord, GovernanceEngine, GovernanceError, GovernanceResult, LoggingEffectHandler, NewGrant,
    NewProposal, ProposalEffect, ProposalType, Role, VoteKind,
};
use rdao_ledger::InMemoryTokenLedger;

/// Errors raised while loading or replaying a scenario
#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Failed to read scenario: {0}")]
    Io(String),

    #[error("Failed to parse scenario: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Engine setup failed: {0}")]
    Setup(#[from] GovernanceError),

    #[error("Step {index} ({op}) failed: {source}")]
    StepFailed {
        index: usize,
        op: &'static str,
        #[source]
        source: GovernanceError,
    },

    #[error("Step {index} ({op}) expected {expected:?} but succeeded")]
    UnexpectedSuccess {
        index: usize,
        op: &'static str,
        expected: ErrorKind,
    },

    #[error("Step {index} ({op}) expected {expected:?} but failed with {actual:?}: {source}")]
    WrongError {
        index: usize,
        op: &'static str,
        expected: ErrorKind,
        actual: ErrorKind,
        #[source]
        source: GovernanceError,
    },
}

/// Effect attached to a scenario proposal. The payload is taken as UTF-8 text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectSpec {
    pub target: String,
    #[serde(default)]
    pub payload: String,
}

/// One ledger operation. Amounts are whole token units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    /// Move the clock forward
    Advance {
        #[serde(default)]
        days: u64,
        #[serde(default)]
        secs: u64,
    },
    /// Create tokens outside the ledger
    Mint { account: String, amount: u64 },
    CreateProposal {
        caller: String,
        title: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        content_ref: String,
        #[serde(default)]
        proposal_type: ProposalType,
        #[serde(default)]
        effect: Option<EffectSpec>,
    },
    Vote {
        caller: String,
        proposal: u64,
        kind: VoteKind,
    },
    Finalize { caller: String, proposal: u64 },
    Execute { caller: String, proposal: u64 },
    Cancel { caller: String, proposal: u64 },
    Expire { caller: String, proposal: u64 },
    Deposit { caller: String, amount: u64 },
    Withdraw { caller: String, to: String, amount: u64 },
    CreateGrant {
        caller: String,
        recipient: String,
        amount: u64,
        title: String,
        #[serde(default)]
        description: String,
        duration_days: u64,
    },
    ClaimGrant { caller: String, grant: u64 },
    UpdateParams {
        caller: String,
        voting_period: u64,
        execution_delay: u64,
        quorum: u64,
        approval: u8,
    },
    SetGracePeriod {
        caller: String,
        #[serde(default)]
        secs: Option<u64>,
    },
    GrantRole { caller: String, account: String, role: Role },
    RevokeRole { caller: String, account: String, role: Role },
    Pause { caller: String },
    Unpause { caller: String },
}

impl Action {
    /// The `op` tag of this action
    pub fn name(&self) -> &'static str {
        match self {
            Self::Advance { .. } => "advance",
            Self::Mint { .. } => "mint",
            Self::CreateProposal { .. } => "create_proposal",
            Self::Vote { .. } => "vote",
            Self::Finalize { .. } => "finalize",
            Self::Execute { .. } => "execute",
            Self::Cancel { .. } => "cancel",
            Self::Expire { .. } => "expire",
            Self::Deposit { .. } => "deposit",
            Self::Withdraw { .. } => "withdraw",
            Self::CreateGrant { .. } => "create_grant",
            Self::ClaimGrant { .. } => "claim_grant",
            Self::UpdateParams { .. } => "update_params",
            Self::SetGracePeriod { .. } => "set_grace_period",
            Self::GrantRole { .. } => "grant_role",
            Self::RevokeRole { .. } => "revoke_role",
            Self::Pause { .. } => "pause",
            Self::Unpause { .. } => "unpause",
        }
    }
}

/// An action plus the failure it is expected to produce, if any
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect_error: Option<ErrorKind>,
}

/// A replayable sequence of ledger operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Clock reading before the first step
    #[serde(default)]
    pub start_time: Timestamp,
    /// Token balances minted before the first step
    #[serde(default)]
    pub balances: BTreeMap<String, u64>,
    /// Effect targets served by a logging handler
    #[serde(default)]
    pub effect_targets: Vec<String>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| ScenarioError::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&contents)
    }
}

/// What happened to one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub index: usize,
    pub op: String,
    pub at: Timestamp,
    /// Failure class of an expected error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

/// Result of a complete replay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub outcomes: Vec<StepOutcome>,
    pub treasury_balance: Amount,
    pub outstanding_commitments: Amount,
    pub events: Vec<EventRecord>,
}

/// A governance engine wired to an in-memory token ledger and a manual clock
pub struct ScenarioRunner {
    engine: GovernanceEngine,
    tokens: Arc<InMemoryTokenLedger>,
    clock: Arc<ManualClock>,
}

impl ScenarioRunner {
    /// Build the engine from `config` and apply the scenario's initial state
    pub async fn new(config: &DaoConfig, scenario: &Scenario) -> Result<Self, ScenarioError> {
        let tokens = Arc::new(InMemoryTokenLedger::new(config.treasury_identity()));
        let clock = Arc::new(ManualClock::new(scenario.start_time));
        let engine = GovernanceEngine::from_config(config, tokens.clone(), clock.clone())?;

        for (account, amount) in &scenario.balances {
            tokens
                .mint(&Identity::new(account.as_str()), Amount::from(*amount))
                .map_err(GovernanceError::from)?;
        }
        for target in &scenario.effect_targets {
            engine
                .register_effect_handler(target.as_str().into(), Arc::new(LoggingEffectHandler::new()))
                .await;
        }

        Ok(Self { engine, tokens, clock })
    }

    pub fn engine(&self) -> &GovernanceEngine {
        &self.engine
    }

    pub fn tokens(&self) -> &InMemoryTokenLedger {
        &self.tokens
    }

    /// Apply every step in order, stopping at the first unexpected result
    pub async fn run(&self, steps: &[Step]) -> Result<ScenarioReport, ScenarioError> {
        let mut outcomes = Vec::with_capacity(steps.len());

        for (index, step) in steps.iter().enumerate() {
            let op = step.action.name();
            let at = self.clock.now();
            let result = self.apply(&step.action).await;

            let error = match (result, step.expect_error) {
                (Ok(()), None) => None,
                (Ok(()), Some(expected)) => {
                    return Err(ScenarioError::UnexpectedSuccess { index, op, expected });
                }
                (Err(source), None) => {
                    warn!(index, op, error = %source, "Scenario step failed");
                    return Err(ScenarioError::StepFailed { index, op, source });
                }
                (Err(source), Some(expected)) if source.kind() == expected => {
                    debug!(index, op, error = %source, "Step failed as expected");
                    Some(expected)
                }
                (Err(source), Some(expected)) => {
                    return Err(ScenarioError::WrongError {
                        index,
                        op,
                        expected,
                        actual: source.kind(),
                        source,
                    });
                }
            };

            outcomes.push(StepOutcome {
                index,
                op: op.to_string(),
                at,
                error,
            });
        }

        let report = ScenarioReport {
            outcomes,
            treasury_balance: self.engine.treasury_balance().await,
            outstanding_commitments: self.engine.outstanding_commitments().await,
            events: self.engine.events().await,
        };
        info!(
            steps = report.outcomes.len(),
            events = report.events.len(),
            treasury_balance = report.treasury_balance,
            "Scenario complete"
        );
        Ok(report)
    }

    async fn apply(&self, action: &Action) -> GovernanceResult<()> {
        let engine = &self.engine;
        match action {
            Action::Advance { days, secs } => {
                let delta = days
                    .checked_mul(DAY)
                    .and_then(|d| d.checked_add(*secs))
                    .ok_or_else(|| GovernanceError::InvalidInput("advance overflows the clock".to_string()))?;
                self.clock
                    .advance(delta)
                    .ok_or_else(|| GovernanceError::InvalidInput("advance overflows the clock".to_string()))?;
            }
            Action::Mint { account, amount } => {
                self.tokens.mint(&Identity::new(account.as_str()), Amount::from(*amount))?;
            }
            Action::CreateProposal {
                caller,
                title,
                description,
                content_ref,
                proposal_type,
                effect,
            } => {
                let mut proposal = NewProposal::new(title.as_str(), description.as_str())
                    .with_content_ref(content_ref.as_str())
                    .with_type(*proposal_type);
                if let Some(effect) = effect {
                    proposal = proposal.with_effect(ProposalEffect::new(
                        effect.target.as_str(),
                        effect.payload.as_bytes().to_vec(),
                    ));
                }
                engine.create_proposal(&id(caller), proposal).await?;
            }
            Action::Vote { caller, proposal, kind } => {
                engine.cast_vote(&id(caller), *proposal, *kind).await?;
            }
            Action::Finalize { caller, proposal } => {
                engine.finalize_proposal(&id(caller), *proposal).await?;
            }
            Action::Execute { caller, proposal } => {
                engine.execute_proposal(&id(caller), *proposal).await?;
            }
            Action::Cancel { caller, proposal } => {
                engine.cancel_proposal(&id(caller), *proposal).await?;
            }
            Action::Expire { caller, proposal } => {
                engine.expire_proposal(&id(caller), *proposal).await?;
            }
            Action::Deposit { caller, amount } => {
                engine.deposit(&id(caller), Amount::from(*amount)).await?;
            }
            Action::Withdraw { caller, to, amount } => {
                engine.withdraw(&id(caller), &id(to), Amount::from(*amount)).await?;
            }
            Action::CreateGrant {
                caller,
                recipient,
                amount,
                title,
                description,
                duration_days,
            } => {
                let grant = NewGrant::new(id(recipient), Amount::from(*amount), title.as_str(), *duration_days)
                    .with_description(description.as_str());
                engine.create_grant(&id(caller), grant).await?;
            }
            Action::ClaimGrant { caller, grant } => {
                engine.claim_grant(&id(caller), *grant).await?;
            }
            Action::UpdateParams {
                caller,
                voting_period,
                execution_delay,
                quorum,
                approval,
            } => {
                engine
                    .update_governance_params(&id(caller), *voting_period, *execution_delay, Amount::from(*quorum), *approval)
                    .await?;
            }
            Action::SetGracePeriod { caller, secs } => {
                engine.set_execution_grace_period(&id(caller), *secs).await?;
            }
            Action::GrantRole { caller, account, role } => {
                engine.grant_role(&id(caller), &id(account), *role).await?;
            }
            Action::RevokeRole { caller, account, role } => {
                engine.revoke_role(&id(caller), &id(account), *role).await?;
            }
            Action::Pause { caller } => engine.pause(&id(caller)).await?,
            Action::Unpause { caller } => engine.unpause(&id(caller)).await?,
        }
        Ok(())
    }
}

fn id(name: &str) -> Identity {
    Identity::new(name)
}

/// Build a runner for `scenario` and replay all of its steps
pub async fn run_scenario(config: &DaoConfig, scenario: &Scenario) -> Result<ScenarioReport, ScenarioError> {
    let runner = ScenarioRunner::new(config, scenario).await?;
    runner.run(&scenario.steps).await
}
