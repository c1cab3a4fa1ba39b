//! rollgated — the RollGate daemon.
//!
//! Single binary that assembles the long-running control loops:
//! - Canary PI controller (fail-rate feedback over the traffic split)
//! - Shadow-ratio governor (retunes mirroring from run history)
//!
//! # Usage
//!
//! ```text
//! rollgated run --data-dir /var/lib/rollgate --shadow-candidate model-7
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::info;

use rollgate_canary::{CanaryController, ControllerConfig, ControllerPaths};

mod governor;

#[derive(Parser)]
#[command(name = "rollgated", about = "RollGate daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all control loops in one process.
    Run {
        /// Data directory for controller state and default file locations.
        #[arg(long, default_value = "/var/lib/rollgate")]
        data_dir: PathBuf,

        /// Fail-rate metrics file read each canary tick
        /// (default: <data-dir>/canary_metrics.txt).
        #[arg(long)]
        metrics_file: Option<PathBuf>,

        /// Env file receiving CANARY_PCT (default: <data-dir>/canary.env).
        #[arg(long)]
        env_file: Option<PathBuf>,

        /// Shadow run-log directory (default: <data-dir>/shadow).
        #[arg(long)]
        audit_dir: Option<PathBuf>,

        /// Canary tick interval in seconds.
        #[arg(long, default_value = "300")]
        canary_interval: u64,

        /// Target canary fail rate.
        #[arg(long, default_value = "0.01")]
        target_fail_rate: f64,

        /// Shadow governor interval in seconds.
        #[arg(long, default_value = "600")]
        shadow_interval: u64,

        /// Candidate whose shadow runs drive the ratio governor.
        /// The governor is not started without one.
        #[arg(long)]
        shadow_candidate: Option<String>,

        /// Initial shadow traffic ratio.
        #[arg(long, default_value = "0.1")]
        shadow_ratio: f64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,rollgated=debug,rollgate=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            data_dir,
            metrics_file,
            env_file,
            audit_dir,
            canary_interval,
            target_fail_rate,
            shadow_interval,
            shadow_candidate,
            shadow_ratio,
        } => {
            run_daemon(
                data_dir,
                metrics_file,
                env_file,
                audit_dir,
                canary_interval,
                target_fail_rate,
                shadow_interval,
                shadow_candidate,
                shadow_ratio,
            )
            .await
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_daemon(
    data_dir: PathBuf,
    metrics_file: Option<PathBuf>,
    env_file: Option<PathBuf>,
    audit_dir: Option<PathBuf>,
    canary_interval: u64,
    target_fail_rate: f64,
    shadow_interval: u64,
    shadow_candidate: Option<String>,
    shadow_ratio: f64,
) -> anyhow::Result<()> {
    info!("RollGate daemon starting");

    std::fs::create_dir_all(&data_dir)?;
    let metrics_file = metrics_file.unwrap_or_else(|| data_dir.join("canary_metrics.txt"));
    let env_file = env_file.unwrap_or_else(|| data_dir.join("canary.env"));
    let audit_dir = audit_dir.unwrap_or_else(|| data_dir.join("shadow"));
    std::fs::create_dir_all(&audit_dir)?;

    // ── Canary controller ──────────────────────────────────────

    let config = ControllerConfig {
        target_fail_rate,
        tick_interval: Duration::from_secs(canary_interval),
        ..ControllerConfig::default()
    };
    let paths = ControllerPaths {
        metrics_file,
        env_file,
        state_file: data_dir.join("canary_state.json"),
    };
    let mut controller = CanaryController::open(config, paths);
    info!(
        output = controller.output(),
        phase = ?controller.phase(),
        interval = canary_interval,
        "canary controller initialized"
    );

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start control loops ────────────────────────────────────

    let canary_shutdown = shutdown_rx.clone();
    let canary_handle = tokio::spawn(async move {
        controller.run(canary_shutdown).await;
    });

    let governor_handle = shadow_candidate.map(|candidate| {
        let mut governor = governor::ShadowGovernor::new(
            &audit_dir,
            candidate,
            data_dir.join("shadow_ratio.env"),
            shadow_ratio,
        );
        let shutdown = shutdown_rx.clone();
        let interval = Duration::from_secs(shadow_interval);
        tokio::spawn(async move {
            governor.run(interval, shutdown).await;
        })
    });

    // Graceful shutdown on Ctrl-C.
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = canary_handle.await;
    if let Some(handle) = governor_handle {
        let _ = handle.await;
    }

    info!("RollGate daemon stopped");
    Ok(())
}
