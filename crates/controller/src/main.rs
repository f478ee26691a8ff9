//! Tether controller binary.

#![forbid(unsafe_code)]

mod config;
mod controller;
mod dry_run;

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::config::Settings;

#[derive(Parser, Debug)]
#[command(name = "tether", version, about = "Keeps objects owned by KServe InferenceServices in sync")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the controller against the current cluster (default)
    Run,
    /// Reconcile an InferenceService manifest offline and print the owned objects
    ReconcileFile {
        /// InferenceService manifest (YAML)
        isvc: PathBuf,
        /// ServingRuntime manifest the InferenceService refers to
        #[arg(long = "runtime")]
        runtime: Option<PathBuf>,
    },
}

fn init_tracing() {
    let env = std::env::var("TETHER_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics(addr: Option<SocketAddr>) {
    let Some(addr) = addr else { return };
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    match builder.with_http_listener(addr).install() {
        Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
        Err(e) => warn!(error = %e, "failed to install metrics exporter"),
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            init_metrics(cli.settings.metrics_addr);
            let config = cli.settings.controller_config()?;
            let client = tether_kubehub::get_kube_client().await?;
            controller::run(client, config).await
        }
        Commands::ReconcileFile { isvc, runtime } => {
            let isvc_yaml = fs::read_to_string(&isvc).with_context(|| format!("reading {}", isvc.display()))?;
            let runtime_yaml = match &runtime {
                Some(p) => Some(fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?),
                None => None,
            };
            let out =
                dry_run::reconcile_documents(&isvc_yaml, runtime_yaml.as_deref(), cli.settings.reconcile_config()?).await?;
            print!("{}", out);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_run_with_builtin_settings() {
        let cli = Cli::try_parse_from(["tether"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.settings.rate_interval, "1m");
        assert_eq!(cli.settings.requeue_secs, 60);
        assert_eq!(cli.settings.resync_secs, 300);
        assert!(cli.settings.watch_crds);
    }

    #[test]
    fn reconcile_file_takes_global_flags() {
        let cli = Cli::try_parse_from([
            "tether",
            "reconcile-file",
            "isvc.yaml",
            "--runtime",
            "sr.yaml",
            "--rate-interval",
            "5m",
            "--watch-crds",
            "false",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::ReconcileFile { isvc, runtime }) => {
                assert_eq!(isvc, PathBuf::from("isvc.yaml"));
                assert_eq!(runtime, Some(PathBuf::from("sr.yaml")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.settings.rate_interval, "5m");
        assert!(!cli.settings.watch_crds);
        assert_eq!(cli.settings.reconcile_config().unwrap().rate_interval, "5m");
    }
}
