//! Tether reconcile: delta reconcilers for objects owned by an InferenceService
//!
//! Each owned kind is a small [`OwnedResource`] strategy (key, desired build,
//! merge) plugged into the shared [`DeltaReconciler`] pass. [`default_reconcilers`]
//! assembles the set the controller runs for every parent.

#![forbid(unsafe_code)]

mod error;

pub mod authconfig;
pub mod comparators;
pub mod config;
pub mod dashboard;
pub mod network_policy;
pub mod parent;
pub mod peer_auth;
pub mod skeleton;

use std::sync::Arc;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::Client;
use tether_core::ObjectStore;
use tether_kubehub::resources::{AuthConfig, PeerAuthentication, ServingRuntime};
use tether_kubehub::KubeStore;

pub use authconfig::AuthConfigs;
pub use comparators::OwnedKind;
pub use config::{DashboardTemplates, ReconcileConfig, RuntimeFlavor};
pub use dashboard::MetricsDashboard;
pub use error::ReconcileError;
pub use network_policy::MonitoringNetworkPolicy;
pub use peer_auth::MetricsPeerAuthentication;
pub use skeleton::{DeltaReconciler, OwnedResource, SubResourceReconciler};

/// The stores every reconciler reads from or writes to.
#[derive(Clone)]
pub struct Stores {
    pub config_maps: Arc<dyn ObjectStore<ConfigMap>>,
    pub auth_configs: Arc<dyn ObjectStore<AuthConfig>>,
    pub peer_authentications: Arc<dyn ObjectStore<PeerAuthentication>>,
    pub network_policies: Arc<dyn ObjectStore<NetworkPolicy>>,
    pub serving_runtimes: Arc<dyn ObjectStore<ServingRuntime>>,
}

impl Stores {
    /// Stores backed by the API server.
    pub fn kube(client: Client) -> Self {
        Self {
            config_maps: Arc::new(KubeStore::<ConfigMap>::new(client.clone())),
            auth_configs: Arc::new(KubeStore::<AuthConfig>::new(client.clone())),
            peer_authentications: Arc::new(KubeStore::<PeerAuthentication>::new(client.clone())),
            network_policies: Arc::new(KubeStore::<NetworkPolicy>::new(client.clone())),
            serving_runtimes: Arc::new(KubeStore::<ServingRuntime>::new(client)),
        }
    }
}

/// Every sub-resource reconciler, in the order a pass runs them.
pub fn default_reconcilers(stores: &Stores, config: Arc<ReconcileConfig>) -> Vec<Box<dyn SubResourceReconciler>> {
    vec![
        Box::new(DeltaReconciler::new(
            MetricsDashboard::new(stores.serving_runtimes.clone(), config),
            stores.config_maps.clone(),
        )),
        Box::new(DeltaReconciler::new(AuthConfigs::new(stores.config_maps.clone()), stores.auth_configs.clone())),
        Box::new(DeltaReconciler::new(MetricsPeerAuthentication, stores.peer_authentications.clone())),
        Box::new(DeltaReconciler::new(MonitoringNetworkPolicy, stores.network_policies.clone())),
    ]
}
