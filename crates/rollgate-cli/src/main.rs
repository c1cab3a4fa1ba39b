use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "rollgate",
    about = "RollGate — promotion gates for model rollouts",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate metric results against a promotion policy.
    ///
    /// Prints `PROMOTION=PASS | ...` or `PROMOTION=FAIL | ...` and
    /// exits 0/1 accordingly. Without a policy file the gate passes
    /// vacuously. Any configuration error fails the gate instead of
    /// crashing.
    Gate {
        /// JSON file with the evaluation metric results.
        results: PathBuf,
        /// YAML policy file; omitted means an empty policy.
        policy: Option<PathBuf>,
    },
    /// Classify a failure set against the risk downgrade guards.
    RiskCheck {
        /// JSON file with failures and guard signals.
        #[arg(long = "in")]
        input: PathBuf,
        /// Where to write the risk report JSON.
        #[arg(long)]
        out: PathBuf,
        /// Directory searched upward for the rollout freeze sentinel.
        #[arg(long, default_value = ".")]
        freeze_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rollgate=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Gate { results, policy } => commands::gate::run(&results, policy.as_deref()),
        Commands::RiskCheck {
            input,
            out,
            freeze_dir,
        } => commands::risk::run(&input, &out, &freeze_dir),
    }
}
