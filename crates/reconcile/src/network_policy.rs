//! NetworkPolicy letting the user workload monitoring namespace scrape
//! predictors. One policy serves every InferenceService in a namespace.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::networking::v1::{NetworkPolicy, NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicySpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use tether_core::NamespacedName;
use tether_kubehub::resources::InferenceService;

use crate::comparators::merge_labels;
use crate::parent::{parent_key, MANAGED_LABEL};
use crate::skeleton::OwnedResource;
use crate::ReconcileError;

pub const NETWORK_POLICY_NAME: &str = "allow-from-openshift-monitoring-ns";
pub const MONITORING_NAMESPACE: &str = "openshift-user-workload-monitoring";

pub struct MonitoringNetworkPolicy;

#[async_trait]
impl OwnedResource for MonitoringNetworkPolicy {
    type Kind = NetworkPolicy;

    fn name(&self) -> &'static str {
        "monitoring-network-policy"
    }

    fn key(&self, isvc: &InferenceService) -> NamespacedName {
        NamespacedName::new(parent_key(isvc).namespace, NETWORK_POLICY_NAME)
    }

    async fn build(&self, isvc: &InferenceService) -> Result<Option<NetworkPolicy>, ReconcileError> {
        let key = self.key(isvc);
        let from = NetworkPolicyPeer {
            namespace_selector: Some(LabelSelector {
                match_labels: Some(BTreeMap::from([("name".to_string(), MONITORING_NAMESPACE.to_string())])),
                ..Default::default()
            }),
            ..Default::default()
        };
        // Spelled out in full so the server has nothing to default.
        let spec = NetworkPolicySpec {
            pod_selector: LabelSelector::default(),
            policy_types: Some(vec!["Ingress".to_string()]),
            ingress: Some(vec![NetworkPolicyIngressRule { from: Some(vec![from]), ports: None }]),
            egress: None,
        };
        let mut np = NetworkPolicy::default();
        np.metadata.name = Some(key.name);
        np.metadata.namespace = Some(key.namespace);
        np.metadata.labels = Some(BTreeMap::from([(MANAGED_LABEL.to_string(), "true".to_string())]));
        np.spec = Some(spec);
        Ok(Some(np))
    }

    fn merge(&self, existing: &NetworkPolicy, desired: &NetworkPolicy) -> NetworkPolicy {
        let mut next = existing.clone();
        next.spec = desired.spec.clone();
        merge_labels(&mut next, desired);
        next
    }

    /// Other InferenceServices in the namespace still rely on it.
    fn removable(&self) -> bool {
        false
    }
}
