//! Participant identities
//!
//! An [`Identity`] names an account that can hold roles, vote, propose,
//! receive grants or move tokens. The ledger treats it as an opaque key.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Opaque account identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create an identity without validating it
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create an identity, rejecting empty or whitespace-containing ids
    pub fn parse(id: impl Into<String>) -> CoreResult<Self> {
        let identity = Self(id.into());
        if !identity.is_valid() {
            return Err(CoreError::validation(format!("invalid identity: {:?}", identity.0)));
        }
        Ok(identity)
    }

    /// An identity is valid when it is non-empty and has no whitespace
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && !self.0.chars().any(char::is_whitespace)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
