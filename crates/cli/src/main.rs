//! Pod Doctor CLI
//!
//! Scans a Kubernetes cluster for pods stuck in bad phases, failing
//! containers, failing conditions and suspicious warning events.

mod commands;
mod config;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{scan, signatures, Outcome, EXIT_FAILURE};
use doctor_lib::{CallContext, KubeClusterApi};
use tracing::{debug, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Pod Doctor CLI
#[derive(Parser)]
#[command(name = "pod-doctor")]
#[command(author, version, about = "Pod Doctor - diagnose unhealthy Kubernetes pods", long_about = None)]
pub struct Cli {
    /// Path to kubeconfig file (defaults to $KUBECONFIG, then ~/.kube/config)
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Scan settings file (JSON or TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan pods for anomalies
    Scan {
        /// Namespace to scan (all namespaces if not specified)
        #[arg(long, short)]
        namespace: Option<String>,

        /// Abort the scan after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Maximum concurrent event queries
        #[arg(long)]
        concurrency: Option<usize>,

        /// Write Prometheus metrics to this file after the scan
        #[arg(long)]
        metrics_file: Option<PathBuf>,
    },

    /// Show the active suspicion signatures
    Signatures,
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    match run(cli).await {
        Ok(outcome) => outcome.into(),
        Err(err) => {
            output::print_error(&format!("{err:#}"));
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

async fn run(cli: Cli) -> Result<Outcome> {
    let mut scan_config = config::load_scan_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Signatures => {
            signatures::show_signatures(&scan_config.policy, cli.format)?;
            Ok(Outcome::Clean)
        }
        Commands::Scan {
            namespace,
            timeout,
            concurrency,
            metrics_file,
        } => {
            if let Some(secs) = timeout {
                scan_config.scan_timeout_secs = Some(secs);
            }
            if let Some(limit) = concurrency {
                scan_config.event_concurrency = limit;
            }

            let kubeconfigs = config::kubeconfig_paths(cli.kubeconfig.as_deref())?;
            debug!(files = kubeconfigs.len(), "Using kubeconfig");
            let api = KubeClusterApi::from_kubeconfig(&kubeconfigs, scan_config.retry_policy())
                .await
                .context("Failed to configure cluster access")?;

            let ctx = CallContext::default();
            let cancel = ctx.cancel_token().clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received, cancelling scan");
                    cancel.cancel();
                }
            });

            scan::run_scan(
                Arc::new(api),
                scan_config,
                namespace.as_deref(),
                &ctx,
                metrics_file.as_deref(),
                cli.format,
            )
            .await
        }
    }
}
