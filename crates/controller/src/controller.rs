//! InferenceService controller: runs every sub-resource reconciler per pass.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, ResourceExt};
use metrics::{counter, histogram};
use tether_kubehub::resources::{AuthConfig, InferenceService, PeerAuthentication};
use tether_reconcile::{default_reconcilers, ReconcileError, Stores, SubResourceReconciler};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;

/// A pass in which at least one sub-resource reconciler failed. The others
/// still ran.
#[derive(Debug, Error)]
#[error("{} of {total} reconcilers failed for {parent}: {}", .failures.len(), summary(.failures))]
pub struct PassError {
    pub parent: String,
    pub total: usize,
    pub failures: Vec<(&'static str, ReconcileError)>,
}

fn summary(failures: &[(&'static str, ReconcileError)]) -> String {
    failures.iter().map(|(name, e)| format!("{}: {}", name, e)).collect::<Vec<_>>().join("; ")
}

pub struct Context {
    reconcilers: Vec<Box<dyn SubResourceReconciler>>,
    config: ControllerConfig,
}

impl Context {
    pub fn new(reconcilers: Vec<Box<dyn SubResourceReconciler>>, config: ControllerConfig) -> Self {
        Self { reconcilers, config }
    }
}

/// One pass over every reconciler, or teardown when the parent is being deleted.
pub async fn run_pass(isvc: &InferenceService, reconcilers: &[Box<dyn SubResourceReconciler>]) -> Result<(), PassError> {
    let parent = format!("{}/{}", isvc.namespace().unwrap_or_default(), isvc.name_any());
    let deleting = isvc.metadata.deletion_timestamp.is_some();
    let mut failures = Vec::new();
    for r in reconcilers {
        let res = if deleting { r.remove(isvc).await } else { r.reconcile(isvc).await };
        if let Err(e) = res {
            warn!(parent = %parent, reconciler = r.name(), error = %e, "sub-resource reconcile failed");
            failures.push((r.name(), e));
        }
    }
    if failures.is_empty() {
        Ok(())
    } else {
        Err(PassError { parent, total: reconcilers.len(), failures })
    }
}

async fn reconcile(isvc: Arc<InferenceService>, ctx: Arc<Context>) -> Result<Action, PassError> {
    let t0 = Instant::now();
    counter!("tether_reconcile_total", 1);
    debug!(isvc = %isvc.name_any(), ns = ?isvc.namespace(), "reconcile");
    let res = run_pass(&isvc, &ctx.reconcilers).await;
    histogram!("tether_reconcile_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
    res.map(|_| after_pass(&ctx.config))
}

/// The shared NetworkPolicy is cascade-deleted with whichever parent controls
/// it, and only a sibling's pass recreates it. Clean passes are requeued.
fn after_pass(config: &ControllerConfig) -> Action {
    Action::requeue(config.resync)
}

fn error_policy(isvc: Arc<InferenceService>, err: &PassError, ctx: Arc<Context>) -> Action {
    counter!("tether_reconcile_errors_total", 1);
    error!(isvc = %isvc.name_any(), error = %err, requeue_secs = ctx.config.requeue.as_secs(), "reconcile failed");
    Action::requeue(ctx.config.requeue)
}

fn scoped<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = kube::core::NamespaceResourceScope, DynamicType = ()>,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

/// Run until a termination signal arrives.
pub async fn run(client: Client, config: ControllerConfig) -> Result<()> {
    let ns = config.namespace.clone();
    let stores = Stores::kube(client.clone());
    let reconcilers = default_reconcilers(&stores, config.reconcile.clone());
    info!(
        namespace = ?ns,
        reconcilers = reconcilers.len(),
        watch_crds = config.watch_crds,
        resync_secs = config.resync.as_secs(),
        "starting controller"
    );

    let wc = WatcherConfig::default();
    let mut controller = Controller::new(scoped::<InferenceService>(&client, ns.as_deref()), wc.clone())
        .owns(scoped::<ConfigMap>(&client, ns.as_deref()), wc.clone())
        .owns(scoped::<NetworkPolicy>(&client, ns.as_deref()), wc.clone());
    if config.watch_crds {
        controller = controller
            .owns(scoped::<AuthConfig>(&client, ns.as_deref()), wc.clone())
            .owns(scoped::<PeerAuthentication>(&client, ns.as_deref()), wc);
    }

    let ctx = Arc::new(Context::new(reconcilers, config));
    controller
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!(isvc = %obj, "reconciled"),
                Err(e) => debug!(error = %e, "controller event"),
            }
        })
        .await;
    info!("controller stopped");
    Ok(())
}
