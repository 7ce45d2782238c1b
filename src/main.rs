use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use rdao::config::{DaoConfig, DEFAULT_CONFIG_FILE};
use rdao::{Scenario, ScenarioRunner};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file. Without it the RDAO_* environment variables are used.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file and print the report as JSON
    Run {
        /// Scenario file (YAML)
        scenario: PathBuf,

        /// Print only the event log
        #[arg(long)]
        events_only: bool,
    },
    /// Print the effective configuration as YAML
    Config,
}

fn load_config(path: Option<&Path>) -> Result<DaoConfig> {
    match path {
        Some(path) => DaoConfig::from_file(path).with_context(|| format!("loading config from {}", path.display())),
        None => DaoConfig::from_env()
            .with_context(|| format!("loading config from RDAO_* variables or {}", DEFAULT_CONFIG_FILE)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    rdao::common::init_logging(&config.log_level)?;

    match &cli.command {
        Commands::Run { scenario, events_only } => {
            let loaded = Scenario::from_file(scenario)?;
            info!(scenario = %scenario.display(), steps = loaded.steps.len(), "Replaying scenario");
            let runner = ScenarioRunner::new(&config, &loaded).await?;
            let report = runner.run(&loaded.steps).await?;
            let output = if *events_only {
                runner.engine().event_log().await.to_json()?
            } else {
                serde_json::to_string_pretty(&report)?
            };
            println!("{}", output);
        }
        Commands::Config => {
            print!("{}", config.to_yaml()?);
        }
    }

    Ok(())
}
