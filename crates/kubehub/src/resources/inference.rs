use k8s_openapi::api::core::v1::Container;
use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// The parent resource: a KServe model deployment.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "serving.kserve.io",
    version = "v1beta1",
    kind = "InferenceService",
    namespaced,
    status = "InferenceServiceStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct InferenceServiceSpec {
    #[serde(default)]
    pub predictor: PredictorSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictorSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    #[serde(default)]
    pub model_format: ModelFormat,
    /// Name of the ServingRuntime in the same namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_uri: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelFormat {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceServiceStatus {
    /// External URL, set once the predictor is routable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InferenceService {
    pub fn model(&self) -> Option<&ModelSpec> {
        self.spec.predictor.model.as_ref()
    }

    pub fn url(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.url.as_deref())
    }
}

/// Runtime template referenced by an InferenceService; read only.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "serving.kserve.io",
    version = "v1alpha1",
    kind = "ServingRuntime",
    namespaced,
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct ServingRuntimeSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
}

impl ServingRuntime {
    /// Image of the first container, which is the model server.
    pub fn server_image(&self) -> Option<&str> {
        self.spec.containers.first().and_then(|c| c.image.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_trimmed_inference_service() {
        let yaml = r#"
apiVersion: serving.kserve.io/v1beta1
kind: InferenceService
metadata:
  name: mnist
  namespace: models
  annotations:
    serving.kserve.io/deploymentMode: Serverless
spec:
  predictor:
    minReplicas: 1
    model:
      modelFormat:
        name: onnx
        version: "1"
      runtime: ovms-1.x
      storageUri: s3://bucket/mnist
status:
  url: https://mnist-models.apps.example.com
"#;
        let isvc: InferenceService = serde_yaml::from_str(yaml).unwrap();
        let model = isvc.model().unwrap();
        assert_eq!(model.model_format.name, "onnx");
        assert_eq!(model.runtime.as_deref(), Some("ovms-1.x"));
        assert_eq!(isvc.url(), Some("https://mnist-models.apps.example.com"));
    }

    #[test]
    fn server_image_is_first_container() {
        let yaml = r#"
apiVersion: serving.kserve.io/v1alpha1
kind: ServingRuntime
metadata:
  name: vllm
spec:
  containers:
    - name: kserve-container
      image: quay.io/modh/vllm:rhoai-2.8
    - name: sidecar
      image: quay.io/x/proxy:1
"#;
        let sr: ServingRuntime = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(sr.server_image(), Some("quay.io/modh/vllm:rhoai-2.8"));
    }
}
