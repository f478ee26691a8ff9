use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args};
use tether_reconcile::config::DEFAULT_RATE_INTERVAL;
use tether_reconcile::{DashboardTemplates, ReconcileConfig};

/// Settings shared by every subcommand; each can also come from the environment.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Only watch InferenceServices in this namespace (default: all)
    #[arg(long = "namespace", env = "TETHER_NAMESPACE", global = true)]
    pub namespace: Option<String>,

    /// Directory with `<runtime>-metrics.json` files overriding the built-in dashboards
    #[arg(long = "templates-dir", env = "TETHER_TEMPLATES_DIR", global = true)]
    pub templates_dir: Option<PathBuf>,

    /// Window substituted for ${RATE_INTERVAL} in dashboard queries
    #[arg(long = "rate-interval", env = "TETHER_RATE_INTERVAL", global = true, default_value = DEFAULT_RATE_INTERVAL)]
    pub rate_interval: String,

    /// Serve Prometheus metrics on this address
    #[arg(long = "metrics-addr", env = "TETHER_METRICS_ADDR", global = true)]
    pub metrics_addr: Option<SocketAddr>,

    /// Delay before retrying a failed pass
    #[arg(long = "requeue-secs", env = "TETHER_REQUEUE_SECS", global = true, default_value_t = 60)]
    pub requeue_secs: u64,

    /// Interval at which every InferenceService is reconciled again after a clean pass
    #[arg(long = "resync-secs", env = "TETHER_RESYNC_SECS", global = true, default_value_t = 300)]
    pub resync_secs: u64,

    /// Also watch owned AuthConfig and PeerAuthentication objects (needs their CRDs installed)
    #[arg(long = "watch-crds", env = "TETHER_WATCH_CRDS", global = true, default_value_t = true, action = ArgAction::Set)]
    pub watch_crds: bool,
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub namespace: Option<String>,
    pub requeue: Duration,
    pub resync: Duration,
    pub watch_crds: bool,
    pub reconcile: Arc<ReconcileConfig>,
}

impl Settings {
    pub fn reconcile_config(&self) -> Result<ReconcileConfig> {
        let templates = match &self.templates_dir {
            Some(dir) => DashboardTemplates::from_dir(dir)
                .with_context(|| format!("loading dashboard templates from {}", dir.display()))?,
            None => DashboardTemplates::builtin(),
        };
        Ok(ReconcileConfig { templates, rate_interval: self.rate_interval.clone() })
    }

    pub fn controller_config(&self) -> Result<ControllerConfig> {
        Ok(ControllerConfig {
            namespace: self.namespace.clone(),
            requeue: Duration::from_secs(self.requeue_secs.max(1)),
            resync: Duration::from_secs(self.resync_secs.max(1)),
            watch_crds: self.watch_crds,
            reconcile: Arc::new(self.reconcile_config()?),
        })
    }
}
