//! meshsched CLI
//!
//! Command-line interface for running placement strategies over CSV inputs.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use meshsched_core::StrategyKind;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// meshsched - bandwidth-aware placement of distributed applications
#[derive(Parser, Debug)]
#[command(name = "meshsched")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level or filter directive (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Place the application found in an input directory
    Schedule {
        /// Directory holding nodes.csv, links.csv, paths.csv, app.csv and deps.csv
        #[arg(short, long)]
        input: PathBuf,

        /// Strategy (optimal, max-bw, simulated-annealing, tabu-search)
        #[arg(short, long)]
        strategy: Option<StrategyKind>,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for the randomized strategies
        #[arg(long)]
        seed: Option<u64>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run every strategy on the same input and compare them
    Compare {
        /// Input directory
        #[arg(short, long)]
        input: PathBuf,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show nodes, links and routes of an input directory
    Inspect {
        /// Input directory
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.command {
        Commands::Schedule { config, .. } | Commands::Compare { config, .. } => config.clone(),
        Commands::Inspect { .. } => None,
    };
    let config = commands::load_config(config_path.as_deref())?;

    // Initialize logging
    let level = if cli.verbose {
        "debug".to_string()
    } else {
        cli.log_level
            .clone()
            .unwrap_or_else(|| config.logging.level.clone())
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::new(level))
        .with_target(config.logging.with_target)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    match cli.command {
        Commands::Schedule {
            input,
            strategy,
            seed,
            json,
            ..
        } => {
            let config = commands::with_overrides(config, strategy, seed);
            commands::schedule(&input, &config, json)?;
        }
        Commands::Compare { input, .. } => {
            commands::compare(&input, &config)?;
        }
        Commands::Inspect { input } => {
            commands::inspect(&input)?;
        }
    }

    Ok(())
}
