//! Governance parameters
//!
//! Mutable governance constants. Proposals capture their end time when they
//! are created; quorum and approval thresholds are read when a proposal is
//! finalized.

use serde::{Deserialize, Serialize};

use rdao_config::GovernanceSettings;
use rdao_core::validation::{validate_positive, validate_range};
use rdao_core::{Amount, Timestamp, DAY};

use crate::GovernanceResult;

/// Current governance constants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceParams {
    /// Length of the voting window in seconds
    pub voting_period: u64,
    /// Wait between success and earliest execution, in seconds
    pub execution_delay: u64,
    /// Minimum total vote weight for a decided outcome
    pub quorum_threshold: Amount,
    /// Minimum share of non-abstain weight voting for, in percent
    pub approval_threshold: u8,
    /// Token balance needed to create a proposal
    pub min_proposal_stake: Amount,
    /// How long a succeeded proposal stays executable, if bounded
    pub execution_grace_period: Option<u64>,
}

impl Default for GovernanceParams {
    fn default() -> Self {
        Self {
            voting_period: 7 * DAY,
            execution_delay: 2 * DAY,
            quorum_threshold: 100_000,
            approval_threshold: 51,
            min_proposal_stake: 1_000,
            execution_grace_period: None,
        }
    }
}

impl GovernanceParams {
    pub fn from_settings(settings: &GovernanceSettings) -> Self {
        Self {
            voting_period: settings.voting_period_secs,
            execution_delay: settings.execution_delay_secs,
            quorum_threshold: Amount::from(settings.quorum_threshold),
            approval_threshold: settings.approval_threshold_pct,
            min_proposal_stake: Amount::from(settings.min_proposal_stake),
            execution_grace_period: settings.execution_grace_period_secs,
        }
    }

    pub fn validate(&self) -> GovernanceResult<()> {
        validate_positive(self.voting_period, "voting_period")?;
        validate_range(self.approval_threshold, 1, 100, "approval_threshold")?;
        if let Some(grace) = self.execution_grace_period {
            validate_positive(grace, "execution_grace_period")?;
        }
        Ok(())
    }

    /// Last moment a proposal eligible at `execution_time` may be executed
    pub fn execution_deadline(&self, execution_time: Timestamp) -> Option<Timestamp> {
        self.execution_grace_period
            .map(|grace| execution_time.saturating_add(grace))
    }
}

/// Holder of the live [`GovernanceParams`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterStore {
    current: GovernanceParams,
}

impl ParameterStore {
    pub fn new(params: GovernanceParams) -> GovernanceResult<Self> {
        params.validate()?;
        Ok(Self { current: params })
    }

    pub fn current(&self) -> &GovernanceParams {
        &self.current
    }

    /// Replace the four voting parameters together, or none of them
    pub fn update(
        &mut self,
        voting_period: u64,
        execution_delay: u64,
        quorum_threshold: Amount,
        approval_threshold: u8,
    ) -> GovernanceResult<GovernanceParams> {
        let next = GovernanceParams {
            voting_period,
            execution_delay,
            quorum_threshold,
            approval_threshold,
            ..self.current
        };
        next.validate()?;
        self.current = next;
        Ok(next)
    }

    pub fn set_execution_grace_period(&mut self, grace: Option<u64>) -> GovernanceResult<GovernanceParams> {
        let next = GovernanceParams {
            execution_grace_period: grace,
            ..self.current
        };
        next.validate()?;
        self.current = next;
        Ok(next)
    }
}
