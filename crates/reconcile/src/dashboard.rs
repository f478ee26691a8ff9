//! Metrics dashboard ConfigMap `<isvc>-metrics-dashboard`.
//!
//! The dashboard is a set of Prometheus queries chosen by the model server
//! the InferenceService runs on. The server is identified from the image of
//! the referenced ServingRuntime. Runtimes without a template still get a
//! ConfigMap, marked `supported: "false"`, so consumers can tell "no
//! dashboard" from "not reconciled yet".

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tether_core::{NamespacedName, ObjectStore};
use tether_kubehub::resources::{InferenceService, ServingRuntime};
use tracing::{debug, warn};

use crate::comparators::merge_labels;
use crate::config::{ReconcileConfig, RuntimeFlavor};
use crate::parent::{is_model_mesh, parent_key, MANAGED_LABEL};
use crate::skeleton::OwnedResource;
use crate::ReconcileError;

pub const DASHBOARD_SUFFIX: &str = "-metrics-dashboard";
pub const SUPPORTED_KEY: &str = "supported";
pub const METRICS_KEY: &str = "metrics";

static IMAGE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r".*/(.+?)(:|@).*").expect("static image name pattern"));

/// Image name without registry, repository path, tag or digest:
/// `quay.io/modh/vllm:v1` → `vllm`. Images without a tag or digest yield `None`.
pub fn extract_image_name(image: &str) -> Option<&str> {
    IMAGE_NAME.captures(image).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Fill in the placeholders used by dashboard and auth templates.
pub fn substitute(template: &str, namespace: &str, model: &str, rate_interval: &str) -> String {
    template
        .replace("${NAMESPACE}", namespace)
        .replace("${namespace}", namespace)
        .replace("${MODEL_NAME}", model)
        .replace("${model_name}", model)
        .replace("${RATE_INTERVAL}", rate_interval)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub config: Vec<Panel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub queries: Vec<Query>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub title: String,
    pub query: String,
}

pub struct MetricsDashboard {
    runtimes: Arc<dyn ObjectStore<ServingRuntime>>,
    config: Arc<ReconcileConfig>,
}

impl MetricsDashboard {
    pub fn new(runtimes: Arc<dyn ObjectStore<ServingRuntime>>, config: Arc<ReconcileConfig>) -> Self {
        Self { runtimes, config }
    }

    /// Resolve the model server flavor. Anything short of a store failure that
    /// prevents identification yields `None`.
    async fn flavor(&self, isvc: &InferenceService) -> Result<Option<RuntimeFlavor>, ReconcileError> {
        let parent = parent_key(isvc);
        let Some(runtime) = isvc.model().and_then(|m| m.runtime.as_deref()) else {
            warn!(isvc = %parent, "no serving runtime named on predictor; dashboard unsupported");
            return Ok(None);
        };
        let key = NamespacedName::new(parent.namespace.clone(), runtime);
        let Some(sr) = self.runtimes.get(&key).await? else {
            warn!(isvc = %parent, runtime = %key, "could not determine servingruntime for isvc");
            return Ok(None);
        };
        let image = sr.server_image().unwrap_or_default();
        let flavor = extract_image_name(image).and_then(RuntimeFlavor::from_image_name);
        debug!(isvc = %parent, image = %image, flavor = ?flavor, "runtime resolved");
        Ok(flavor)
    }

    fn render(&self, flavor: Option<RuntimeFlavor>, parent: &NamespacedName) -> BTreeMap<String, String> {
        let unsupported = || BTreeMap::from([(SUPPORTED_KEY.to_string(), "false".to_string())]);
        let Some(template) = flavor.and_then(|f| self.config.templates.get(f)) else {
            return unsupported();
        };
        let body = substitute(template, &parent.namespace, &parent.name, &self.config.rate_interval);
        let parsed = serde_json::from_str::<Dashboard>(&body).and_then(|d| serde_json::to_string(&d));
        match parsed {
            Ok(metrics) => BTreeMap::from([
                (SUPPORTED_KEY.to_string(), "true".to_string()),
                (METRICS_KEY.to_string(), metrics),
            ]),
            Err(e) => {
                warn!(isvc = %parent, error = %e, "unable to load metrics dashboard template");
                unsupported()
            }
        }
    }
}

#[async_trait]
impl OwnedResource for MetricsDashboard {
    type Kind = ConfigMap;

    fn name(&self) -> &'static str {
        "metrics-dashboard"
    }

    fn key(&self, isvc: &InferenceService) -> NamespacedName {
        NamespacedName::with_suffix(&parent_key(isvc), DASHBOARD_SUFFIX)
    }

    async fn build(&self, isvc: &InferenceService) -> Result<Option<ConfigMap>, ReconcileError> {
        if is_model_mesh(isvc) {
            return Ok(None);
        }
        let key = self.key(isvc);
        let flavor = self.flavor(isvc).await?;
        let data = self.render(flavor, &parent_key(isvc));

        let mut cm = ConfigMap::default();
        cm.metadata.name = Some(key.name);
        cm.metadata.namespace = Some(key.namespace);
        cm.metadata.labels = Some(BTreeMap::from([(MANAGED_LABEL.to_string(), "true".to_string())]));
        cm.data = Some(data);
        Ok(Some(cm))
    }

    fn merge(&self, existing: &ConfigMap, desired: &ConfigMap) -> ConfigMap {
        let mut next = existing.clone();
        merge_labels(&mut next, desired);
        next.data = desired.data.clone();
        next
    }

    /// Deletion is left to the ownership cascade.
    fn removable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_name_extraction() {
        assert_eq!(extract_image_name("quay.io/modh/vllm:rhoai-2.8"), Some("vllm"));
        assert_eq!(
            extract_image_name("quay.io/opendatahub/openvino_model_server@sha256:abcd"),
            Some("openvino_model_server")
        );
        assert_eq!(
            extract_image_name("registry:5000/a/b/text-generation-inference:latest"),
            Some("text-generation-inference")
        );
        assert_eq!(extract_image_name("quay.io/modh/vllm"), None);
        assert_eq!(extract_image_name("vllm:latest"), None);
        assert_eq!(extract_image_name(""), None);
    }

    #[test]
    fn substitution_covers_both_placeholder_styles() {
        let t = "ns=${NAMESPACE} ${namespace} m=${MODEL_NAME} ${model_name} r=${RATE_INTERVAL}";
        assert_eq!(substitute(t, "models", "mnist", "5m"), "ns=models models m=mnist mnist r=5m");
    }

    #[test]
    fn builtin_templates_render_without_placeholders() {
        let cfg = ReconcileConfig::default();
        for flavor in RuntimeFlavor::ALL {
            let body = substitute(cfg.templates.get(flavor).unwrap(), "ns", "m", "1m");
            assert!(!body.contains("${"), "{:?} left a placeholder", flavor);
            let d: Dashboard = serde_json::from_str(&body).unwrap();
            assert!(d.config.iter().all(|p| !p.queries.is_empty()));
        }
    }
}
