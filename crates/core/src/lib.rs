//! Core RDAO module
//!
//! Fundamental building blocks shared by the governance ledger crates:
//! participant identities, the injected clock, input validation helpers
//! and tracing initialization.

pub mod error;
pub mod identity;
pub mod logging;
pub mod time;
pub mod validation;

// Re-export key components
pub use error::{CoreError, CoreResult};
pub use identity::Identity;
pub use logging::init_logging;
pub use time::{Clock, ManualClock, SystemClock, DAY, HOUR};

/// Token amounts (voting weight, treasury balance, grant sizes).
pub type Amount = u128;

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

