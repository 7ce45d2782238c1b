//! Research DAO governance ledger
//!
//! Proposals decided by token-weighted voting, a treasury held in an external
//! token ledger, and research grants paid out of it.

/// Module version information
pub mod version {
    /// The current version of the rdao library
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
}

pub mod scenario;

/// Re-export the component crates
pub use rdao_config as config;
pub use rdao_core as common;
pub use rdao_governance as governance;
pub use rdao_ledger as ledger;

pub use scenario::{run_scenario, Scenario, ScenarioError, ScenarioReport, ScenarioRunner};
