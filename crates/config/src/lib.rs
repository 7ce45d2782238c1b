use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use rdao_core::time::DAY;
use rdao_core::validation::{validate_non_empty, validate_positive, validate_range};
use rdao_core::{CoreError, Identity};

/// Errors that can occur in configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidEnvVar(String, String),

    #[error("Failed to read file: {0}")]
    FileReadError(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<CoreError> for ConfigError {
    fn from(e: CoreError) -> Self {
        ConfigError::Invalid(e.to_string())
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_FILE: &str = "/etc/rdao/config.yaml";

/// Governance constants the ledger starts with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceSettings {
    #[serde(default = "default_voting_period")]
    pub voting_period_secs: u64,
    #[serde(default = "default_execution_delay")]
    pub execution_delay_secs: u64,
    #[serde(default = "default_quorum_threshold")]
    pub quorum_threshold: u64,
    #[serde(default = "default_approval_threshold")]
    pub approval_threshold_pct: u8,
    #[serde(default = "default_min_proposal_stake")]
    pub min_proposal_stake: u64,
    /// How long a succeeded proposal stays executable; unset means forever
    #[serde(default)]
    pub execution_grace_period_secs: Option<u64>,
}

fn default_voting_period() -> u64 {
    7 * DAY
}

fn default_execution_delay() -> u64 {
    2 * DAY
}

fn default_quorum_threshold() -> u64 {
    100_000
}

fn default_approval_threshold() -> u8 {
    51
}

fn default_min_proposal_stake() -> u64 {
    1_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_treasury_account() -> String {
    "treasury".to_string()
}

impl Default for GovernanceSettings {
    fn default() -> Self {
        Self {
            voting_period_secs: default_voting_period(),
            execution_delay_secs: default_execution_delay(),
            quorum_threshold: default_quorum_threshold(),
            approval_threshold_pct: default_approval_threshold(),
            min_proposal_stake: default_min_proposal_stake(),
            execution_grace_period_secs: None,
        }
    }
}

impl GovernanceSettings {
    pub fn validate(&self) -> Result<()> {
        validate_positive(self.voting_period_secs, "voting_period_secs")?;
        validate_range(self.approval_threshold_pct, 1, 100, "approval_threshold_pct")?;
        if let Some(grace) = self.execution_grace_period_secs {
            validate_positive(grace, "execution_grace_period_secs")?;
        }
        Ok(())
    }
}

/// Top-level ledger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaoConfig {
    /// Identity that holds every role when the ledger starts
    pub bootstrap_admin: String,
    /// Token account that holds treasury funds
    #[serde(default = "default_treasury_account")]
    pub treasury_account: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub governance: GovernanceSettings,
}

impl DaoConfig {
    /// Configuration with defaults for everything but the bootstrap admin
    pub fn with_admin(bootstrap_admin: impl Into<String>) -> Self {
        Self {
            bootstrap_admin: bootstrap_admin.into(),
            treasury_account: default_treasury_account(),
            log_level: default_log_level(),
            governance: GovernanceSettings::default(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// `RDAO_CONFIG_FILE` (or [`DEFAULT_CONFIG_FILE`]) takes precedence when
    /// the file exists; otherwise every setting is read from `RDAO_*`
    /// variables with the usual defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config_path =
            lookup("RDAO_CONFIG_FILE").unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        if Path::new(&config_path).exists() {
            return Self::from_file(&config_path);
        }

        let bootstrap_admin = lookup("RDAO_BOOTSTRAP_ADMIN")
            .ok_or_else(|| ConfigError::EnvVarNotFound("RDAO_BOOTSTRAP_ADMIN".to_string()))?;

        let governance = GovernanceSettings {
            voting_period_secs: parse_var(&lookup, "RDAO_VOTING_PERIOD", default_voting_period())?,
            execution_delay_secs: parse_var(
                &lookup,
                "RDAO_EXECUTION_DELAY",
                default_execution_delay(),
            )?,
            quorum_threshold: parse_var(&lookup, "RDAO_QUORUM", default_quorum_threshold())?,
            approval_threshold_pct: parse_var(
                &lookup,
                "RDAO_APPROVAL_THRESHOLD",
                default_approval_threshold(),
            )?,
            min_proposal_stake: parse_var(
                &lookup,
                "RDAO_MIN_PROPOSAL_STAKE",
                default_min_proposal_stake(),
            )?,
            execution_grace_period_secs: match lookup("RDAO_EXECUTION_GRACE_PERIOD") {
                Some(raw) => Some(raw.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidEnvVar("RDAO_EXECUTION_GRACE_PERIOD".to_string(), e.to_string())
                })?),
                None => None,
            },
        };

        let config = DaoConfig {
            bootstrap_admin,
            treasury_account: lookup("RDAO_TREASURY_ACCOUNT")
                .unwrap_or_else(default_treasury_account),
            log_level: lookup("RDAO_LOG_LEVEL").unwrap_or_else(default_log_level),
            governance,
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            ConfigError::FileReadError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: DaoConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        Identity::parse(self.bootstrap_admin.as_str())?;
        Identity::parse(self.treasury_account.as_str())?;
        validate_non_empty(&self.log_level, "log_level")?;
        if self.bootstrap_admin == self.treasury_account {
            return Err(ConfigError::Invalid(
                "bootstrap_admin and treasury_account must differ".to_string(),
            ));
        }
        self.governance.validate()
    }

    pub fn bootstrap_identity(&self) -> Identity {
        Identity::new(self.bootstrap_admin.as_str())
    }

    pub fn treasury_identity(&self) -> Identity {
        Identity::new(self.treasury_account.as_str())
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}
