//! Istio PeerAuthentication opening the metrics port of caikit predictors to
//! the monitoring stack while the rest of the workload stays on strict mTLS.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tether_core::NamespacedName;
use tether_kubehub::resources::{
    InferenceService, MtlsMode, MutualTls, PeerAuthentication, PeerAuthenticationSpec, WorkloadSelector,
};

use crate::comparators::merge_labels;
use crate::parent::{parent_key, MANAGED_LABEL};
use crate::skeleton::OwnedResource;
use crate::ReconcileError;

pub const PEER_AUTH_SUFFIX: &str = "-metrics";
pub const METRICS_PORT: u32 = 8086;
pub const KNATIVE_SERVICE_LABEL: &str = "serving.knative.dev/service";
/// Model format whose runtime exposes metrics on a separate plaintext port.
pub const METRICS_FORMAT: &str = "caikit";

pub struct MetricsPeerAuthentication;

#[async_trait]
impl OwnedResource for MetricsPeerAuthentication {
    type Kind = PeerAuthentication;

    fn name(&self) -> &'static str {
        "metrics-peer-authentication"
    }

    fn key(&self, isvc: &InferenceService) -> NamespacedName {
        NamespacedName::with_suffix(&parent_key(isvc), PEER_AUTH_SUFFIX)
    }

    async fn build(&self, isvc: &InferenceService) -> Result<Option<PeerAuthentication>, ReconcileError> {
        let format = isvc.model().map(|m| m.model_format.name.as_str()).unwrap_or_default();
        if format != METRICS_FORMAT {
            return Ok(None);
        }
        let key = self.key(isvc);
        let spec = PeerAuthenticationSpec {
            selector: Some(WorkloadSelector {
                match_labels: BTreeMap::from([(
                    KNATIVE_SERVICE_LABEL.to_string(),
                    format!("{}-predictor-default", parent_key(isvc).name),
                )]),
            }),
            mtls: Some(MutualTls::new(MtlsMode::Strict)),
            port_level_mtls: BTreeMap::from([(METRICS_PORT, MutualTls::new(MtlsMode::Permissive))]),
        };
        let mut pa = PeerAuthentication::new(&key.name, spec);
        pa.metadata.namespace = Some(key.namespace);
        pa.metadata.labels = Some(BTreeMap::from([(MANAGED_LABEL.to_string(), "true".to_string())]));
        Ok(Some(pa))
    }

    fn merge(&self, existing: &PeerAuthentication, desired: &PeerAuthentication) -> PeerAuthentication {
        let mut next = existing.clone();
        next.spec = desired.spec.clone();
        merge_labels(&mut next, desired);
        next
    }
}
