//! Authorino AuthConfig named after the InferenceService.
//!
//! The rules come from a template chosen by the parent's auth annotation; the
//! controller only fills in the hosts the endpoint answers on.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use smallvec::SmallVec;
use tether_core::{NamespacedName, ObjectStore};
use tether_kubehub::resources::{AuthConfig, AuthConfigSpec, InferenceService};
use tracing::{debug, warn};

use crate::comparators::merge_labels;
use crate::dashboard::substitute;
use crate::parent::{parent_key, ENABLE_AUTH_ANNOTATION};
use crate::skeleton::OwnedResource;
use crate::ReconcileError;

pub const AUTHORIZATION_GROUP_LABEL: &str = "security.opendatahub.io/authorization-group";
/// Per-namespace ConfigMap whose `userdefined` / `anonymous` keys override the built-in rules.
pub const TEMPLATE_CONFIG_MAP: &str = "auth-config-template";

const USER_DEFINED_TEMPLATE: &str = include_str!("../templates/authconfig-userdefined.yaml");
const ANONYMOUS_TEMPLATE: &str = include_str!("../templates/authconfig-anonymous.yaml");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthType {
    UserDefined,
    Anonymous,
}

impl AuthType {
    pub fn detect(isvc: &InferenceService) -> Self {
        let enabled = isvc
            .metadata
            .annotations
            .as_ref()
            .and_then(|a| a.get(ENABLE_AUTH_ANNOTATION))
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        if enabled {
            Self::UserDefined
        } else {
            Self::Anonymous
        }
    }

    /// Also the key looked up in the override ConfigMap.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserDefined => "userdefined",
            Self::Anonymous => "anonymous",
        }
    }

    fn builtin(&self) -> &'static str {
        match self {
            Self::UserDefined => USER_DEFINED_TEMPLATE,
            Self::Anonymous => ANONYMOUS_TEMPLATE,
        }
    }
}

fn parse_template(body: &str, parent: &NamespacedName) -> Result<AuthConfigSpec, serde_yaml::Error> {
    serde_yaml::from_str(&substitute(body, &parent.namespace, &parent.name, ""))
}

/// Resolves the AuthConfig spec template for a parent.
pub struct TemplateLoader {
    config_maps: Arc<dyn ObjectStore<ConfigMap>>,
}

impl TemplateLoader {
    pub fn new(config_maps: Arc<dyn ObjectStore<ConfigMap>>) -> Self {
        Self { config_maps }
    }

    pub async fn load(&self, auth: AuthType, parent: &NamespacedName) -> Result<AuthConfigSpec, ReconcileError> {
        let key = NamespacedName::new(parent.namespace.clone(), TEMPLATE_CONFIG_MAP);
        let custom = self.config_maps.get(&key).await?;
        if let Some(body) = custom.as_ref().and_then(|cm| cm.data.as_ref()).and_then(|d| d.get(auth.as_str())) {
            match parse_template(body, parent) {
                Ok(spec) => {
                    debug!(isvc = %parent, template = %key, auth = auth.as_str(), "using namespace auth template");
                    return Ok(spec);
                }
                Err(e) => warn!(isvc = %parent, template = %key, error = %e, "ignoring malformed auth template"),
            }
        }
        parse_template(auth.builtin(), parent).map_err(|e| ReconcileError::Build {
            kind: "AuthConfig".into(),
            key: parent.clone(),
            message: format!("built-in {} template: {}", auth.as_str(), e),
        })
    }
}

/// Host part of a URL: scheme, userinfo, port and path stripped.
fn url_host(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit_once('@').map(|(_, h)| h).unwrap_or(authority);
    let host = host.split(':').next()?;
    (!host.is_empty()).then_some(host)
}

/// Every host the inference endpoint may be reached on: the external URL host
/// first, then the cluster-local service names.
pub fn extract_hosts(isvc: &InferenceService) -> SmallVec<[String; 8]> {
    let parent = parent_key(isvc);
    let mut hosts: SmallVec<[String; 8]> = SmallVec::new();
    let mut push = |h: String| {
        if !hosts.contains(&h) {
            hosts.push(h);
        }
    };
    if let Some(host) = isvc.url().and_then(url_host) {
        push(host.to_string());
    }
    for svc in [parent.name.clone(), format!("{}-predictor", parent.name)] {
        let base = format!("{}.{}", svc, parent.namespace);
        push(format!("{}.svc.cluster.local", base));
        push(format!("{}.svc", base));
        push(base);
    }
    hosts
}

pub struct AuthConfigs {
    templates: TemplateLoader,
}

impl AuthConfigs {
    pub fn new(config_maps: Arc<dyn ObjectStore<ConfigMap>>) -> Self {
        Self { templates: TemplateLoader::new(config_maps) }
    }
}

#[async_trait]
impl OwnedResource for AuthConfigs {
    type Kind = AuthConfig;

    fn name(&self) -> &'static str {
        "authconfig"
    }

    fn key(&self, isvc: &InferenceService) -> NamespacedName {
        parent_key(isvc)
    }

    /// Hosts are only known once the endpoint is routable.
    fn ready(&self, isvc: &InferenceService) -> bool {
        isvc.url().is_some()
    }

    async fn build(&self, isvc: &InferenceService) -> Result<Option<AuthConfig>, ReconcileError> {
        let key = self.key(isvc);
        let auth = AuthType::detect(isvc);
        let mut spec = self.templates.load(auth, &key).await?;
        spec.hosts = extract_hosts(isvc).into_vec();

        let mut ac = AuthConfig::new(&key.name, spec);
        ac.metadata.namespace = Some(key.namespace);
        ac.metadata.labels = Some(BTreeMap::from([(AUTHORIZATION_GROUP_LABEL.to_string(), "default".to_string())]));
        Ok(Some(ac))
    }

    fn merge(&self, existing: &AuthConfig, desired: &AuthConfig) -> AuthConfig {
        let mut next = existing.clone();
        next.spec = desired.spec.clone();
        merge_labels(&mut next, desired);
        next
    }
}
