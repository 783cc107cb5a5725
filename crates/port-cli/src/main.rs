//! Estimator port harness.
//!
//! Loads a precompiled state estimator module, feeds it an observation
//! table one row at a time and writes the estimated states to a
//! timestamped result file.

mod config;
mod orchestrator;
mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use config::{HarnessConfig, Overrides};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "estimator-port")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(short, long, default_value = "text", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
struct ModuleArgs {
    /// Path to a TOML or JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the estimator module (.so, .dll, .dylib)
    #[arg(short, long)]
    module: Option<PathBuf>,

    /// Symbol prefix of the module entry points
    #[arg(long)]
    model: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the estimator over an observation table
    Run {
        #[command(flatten)]
        module: ModuleArgs,

        /// Observation table
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Directory for the result file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Initialize a module, print its port information and terminate it
    Inspect {
        #[command(flatten)]
        module: ModuleArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let outcome = match cli.command {
        Commands::Run { module, input, output } => run(module, input, output, cli.format),
        Commands::Inspect { module } => inspect(module, cli.format),
    };

    if let Err(e) = &outcome {
        tracing::error!("{:#}", e);
    }
    outcome
}

fn resolve_config(
    args: ModuleArgs,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<HarnessConfig> {
    let config = match &args.config {
        Some(path) => {
            tracing::info!("Loading configuration from {:?}", path);
            config::load_config(path)?
        }
        None => HarnessConfig::default(),
    };

    Ok(config.with_overrides(Overrides {
        module: args.module,
        model: args.model,
        input,
        output,
    }))
}

fn run(
    args: ModuleArgs,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> Result<()> {
    let config = resolve_config(args, input, output)?;
    let orchestrator = orchestrator::Orchestrator::new(config)?;

    let report = orchestrator.run()?;
    output::write_report(&mut std::io::stdout().lock(), &report, format)?;

    tracing::info!("Run complete. Results written to {:?}", report.output_path);
    Ok(())
}

fn inspect(args: ModuleArgs, format: OutputFormat) -> Result<()> {
    let config = resolve_config(args, None, None)?;
    let port = orchestrator::Orchestrator::new(config)?.inspect()?;
    output::write_port(&mut std::io::stdout().lock(), &port, format)
}
