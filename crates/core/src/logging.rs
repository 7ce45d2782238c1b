use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{CoreError, CoreResult};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `log_level` (e.g. `"info"` or
/// `"rdao_governance=debug"`) is used as the filter directive. Output goes
/// to stderr so command output on stdout stays machine-readable.
pub fn init_logging(log_level: &str) -> CoreResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| CoreError::logging(format!("Invalid log filter {:?}: {}", log_level, e)))?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .map_err(|e| CoreError::logging(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}
