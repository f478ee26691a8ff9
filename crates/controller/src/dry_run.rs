//! `tether reconcile-file`: one pass against in-memory stores.

use std::sync::Arc;

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::networking::v1::NetworkPolicy;
use serde::Serialize;
use tether_kubehub::resources::{AuthConfig, InferenceService, PeerAuthentication, ServingRuntime};
use tether_reconcile::{default_reconcilers, ReconcileConfig, Stores};
use tether_store::MemStore;
use tracing::{info, warn};

const DEFAULT_NAMESPACE: &str = "default";

/// Reconcile `isvc_yaml` (plus an optional ServingRuntime) from scratch and
/// render every object the pass produced as a multi-document YAML stream.
pub async fn reconcile_documents(isvc_yaml: &str, runtime_yaml: Option<&str>, config: ReconcileConfig) -> Result<String> {
    let mut isvc: InferenceService = serde_yaml::from_str(isvc_yaml).context("parsing InferenceService")?;
    let ns = isvc.metadata.namespace.get_or_insert_with(|| DEFAULT_NAMESPACE.to_string()).clone();
    // owner references need a uid the API server would have assigned
    isvc.metadata.uid.get_or_insert_with(|| uuid::Uuid::new_v4().to_string());

    let config_maps = Arc::new(MemStore::<ConfigMap>::new());
    let auth_configs = Arc::new(MemStore::<AuthConfig>::new());
    let peer_auths = Arc::new(MemStore::<PeerAuthentication>::new());
    let network_policies = Arc::new(MemStore::<NetworkPolicy>::new());
    let runtimes = Arc::new(MemStore::<ServingRuntime>::new());

    if let Some(body) = runtime_yaml {
        let mut sr: ServingRuntime = serde_yaml::from_str(body).context("parsing ServingRuntime")?;
        sr.metadata.namespace.get_or_insert_with(|| ns.clone());
        runtimes.seed(sr).await.context("seeding ServingRuntime")?;
    }

    let stores = Stores {
        config_maps: config_maps.clone(),
        auth_configs: auth_configs.clone(),
        peer_authentications: peer_auths.clone(),
        network_policies: network_policies.clone(),
        serving_runtimes: runtimes,
    };
    for r in default_reconcilers(&stores, Arc::new(config)) {
        if let Err(e) = r.reconcile(&isvc).await {
            warn!(reconciler = r.name(), error = %e, "dry-run reconcile failed");
        }
    }

    let mut docs = Vec::new();
    push_all(&mut docs, config_maps.objects().await)?;
    push_all(&mut docs, auth_configs.objects().await)?;
    push_all(&mut docs, peer_auths.objects().await)?;
    push_all(&mut docs, network_policies.objects().await)?;
    info!(objects = docs.len(), "dry-run complete");
    Ok(docs.join("---\n"))
}

fn push_all<K: Serialize>(docs: &mut Vec<String>, objects: Vec<K>) -> Result<()> {
    for obj in objects {
        docs.push(serde_yaml::to_string(&obj)?);
    }
    Ok(())
}
