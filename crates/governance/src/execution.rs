//! Proposal execution
//!
//! A proposal may carry an effect: a named target plus an opaque payload.
//! Targets resolve to handlers registered ahead of time, so executing a
//! proposal can only ever reach code the operator wired in.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::proposals::ProposalId;
use crate::{GovernanceError, GovernanceResult};

/// Name of an effect handler
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectTarget(String);

impl EffectTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EffectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EffectTarget {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// What a proposal does when executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalEffect {
    pub target: EffectTarget,
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl ProposalEffect {
    pub fn new(target: impl Into<EffectTarget>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            target: target.into(),
            payload: payload.into(),
        }
    }

    /// Effects without a payload are recorded but never invoked
    pub fn is_invocable(&self) -> bool {
        !self.payload.is_empty()
    }
}

/// A single handler invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectCall {
    pub proposal_id: ProposalId,
    pub target: EffectTarget,
    pub payload: Vec<u8>,
}

/// Failures reported by effect handlers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EffectError {
    #[error("Effect rejected: {0}")]
    Rejected(String),

    #[error("Effect target unavailable: {0}")]
    Unavailable(String),
}

/// Carries out the effect of an executed proposal
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EffectHandler: Send + Sync {
    async fn invoke(&self, call: &EffectCall) -> Result<(), EffectError>;
}

/// Handlers by target name
#[derive(Default, Clone)]
pub struct EffectRegistry {
    handlers: HashMap<EffectTarget, Arc<dyn EffectHandler>>,
}

impl fmt::Debug for EffectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRegistry")
            .field("targets", &self.targets())
            .finish()
    }
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `target`, returning the one it replaces
    pub fn register(
        &mut self,
        target: EffectTarget,
        handler: Arc<dyn EffectHandler>,
    ) -> Option<Arc<dyn EffectHandler>> {
        info!(effect_target = %target, "Registered effect handler");
        self.handlers.insert(target, handler)
    }

    pub fn unregister(&mut self, target: &EffectTarget) -> Option<Arc<dyn EffectHandler>> {
        self.handlers.remove(target)
    }

    pub fn contains(&self, target: &EffectTarget) -> bool {
        self.handlers.contains_key(target)
    }

    /// Registered target names, sorted
    pub fn targets(&self) -> Vec<EffectTarget> {
        let mut targets: Vec<EffectTarget> = self.handlers.keys().cloned().collect();
        targets.sort();
        targets
    }

    /// Invoke the handler for `call.target` exactly once
    pub async fn dispatch(&self, call: &EffectCall) -> GovernanceResult<()> {
        let handler = self.handlers.get(&call.target).ok_or_else(|| {
            GovernanceError::ExecutionFailed(format!(
                "no handler registered for effect target {}",
                call.target
            ))
        })?;

        debug!(proposal_id = call.proposal_id, effect_target = %call.target, "Invoking effect");
        handler.invoke(call).await.map_err(|e| {
            warn!(proposal_id = call.proposal_id, effect_target = %call.target, error = %e, "Effect failed");
            GovernanceError::ExecutionFailed(format!("proposal {}: {}", call.proposal_id, e))
        })
    }
}

/// A handler that only logs the call
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEffectHandler;

impl LoggingEffectHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EffectHandler for LoggingEffectHandler {
    async fn invoke(&self, call: &EffectCall) -> Result<(), EffectError> {
        info!(
            proposal_id = call.proposal_id,
            effect_target = %call.target,
            payload = %String::from_utf8_lossy(&call.payload),
            "Would execute proposal effect"
        );
        Ok(())
    }
}
