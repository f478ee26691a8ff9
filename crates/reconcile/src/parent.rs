//! Helpers reading intent off the parent InferenceService.

use kube::ResourceExt;
use tether_core::NamespacedName;
use tether_kubehub::resources::InferenceService;

pub const DEPLOYMENT_MODE_ANNOTATION: &str = "serving.kserve.io/deploymentMode";
pub const ENABLE_AUTH_ANNOTATION: &str = "security.opendatahub.io/enable-auth";
/// Set on every object this controller creates.
pub const MANAGED_LABEL: &str = "opendatahub.io/managed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Serverless,
    RawDeployment,
    ModelMesh,
}

impl DeploymentMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Serverless" => Some(Self::Serverless),
            "RawDeployment" => Some(Self::RawDeployment),
            "ModelMesh" => Some(Self::ModelMesh),
            _ => None,
        }
    }
}

/// Mode requested through the annotation; `None` means the cluster default applies.
pub fn deployment_mode(isvc: &InferenceService) -> Option<DeploymentMode> {
    isvc.annotations().get(DEPLOYMENT_MODE_ANNOTATION).and_then(|v| DeploymentMode::parse(v))
}

pub fn is_model_mesh(isvc: &InferenceService) -> bool {
    deployment_mode(isvc) == Some(DeploymentMode::ModelMesh)
}

pub fn parent_key(isvc: &InferenceService) -> NamespacedName {
    NamespacedName::new(isvc.namespace().unwrap_or_default(), isvc.name_any())
}
