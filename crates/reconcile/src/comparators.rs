//! Comparator registry: one explicit field list per owned kind.
//!
//! Only the labels the controller sets and the payload it writes are
//! compared. Labels added by other writers, server assigned metadata (uid,
//! resourceVersion, creationTimestamp, managedFields) and owner references
//! never take part.

use std::fmt::Debug;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::{Resource, ResourceExt};
use tether_core::Comparator;
use tether_kubehub::resources::{AuthConfig, PeerAuthentication};

/// A resource kind the controller owns, together with its comparator.
pub trait OwnedKind: Resource<DynamicType = ()> + Clone + Debug + Send + Sync + 'static {
    fn comparator() -> &'static dyn Comparator<Self>;

    fn kind_name() -> String {
        Self::kind(&()).into_owned()
    }
}

/// True when every label `desired` sets is present on `existing` with the
/// same value. Extra labels on `existing` belong to someone else.
pub fn labels_match<K: Resource>(desired: &K, existing: &K) -> bool {
    let have = existing.labels();
    desired.labels().iter().all(|(k, v)| have.get(k) == Some(v))
}

/// Write the labels `desired` sets onto `next`, keeping any others.
pub fn merge_labels<K: Resource>(next: &mut K, desired: &K) {
    let owned = desired.labels().clone();
    next.labels_mut().extend(owned);
}

pub struct ConfigMapComparator;

impl Comparator<ConfigMap> for ConfigMapComparator {
    fn equal(&self, desired: &ConfigMap, existing: &ConfigMap) -> bool {
        labels_match(desired, existing) && desired.data == existing.data
    }
}

pub struct AuthConfigComparator;

impl Comparator<AuthConfig> for AuthConfigComparator {
    fn equal(&self, desired: &AuthConfig, existing: &AuthConfig) -> bool {
        labels_match(desired, existing) && desired.spec == existing.spec
    }
}

pub struct PeerAuthenticationComparator;

impl Comparator<PeerAuthentication> for PeerAuthenticationComparator {
    fn equal(&self, desired: &PeerAuthentication, existing: &PeerAuthentication) -> bool {
        labels_match(desired, existing) && desired.spec == existing.spec
    }
}

pub struct NetworkPolicyComparator;

impl Comparator<NetworkPolicy> for NetworkPolicyComparator {
    fn equal(&self, desired: &NetworkPolicy, existing: &NetworkPolicy) -> bool {
        labels_match(desired, existing) && desired.spec == existing.spec
    }
}

static CONFIG_MAP: ConfigMapComparator = ConfigMapComparator;
static AUTH_CONFIG: AuthConfigComparator = AuthConfigComparator;
static PEER_AUTHENTICATION: PeerAuthenticationComparator = PeerAuthenticationComparator;
static NETWORK_POLICY: NetworkPolicyComparator = NetworkPolicyComparator;

impl OwnedKind for ConfigMap {
    fn comparator() -> &'static dyn Comparator<Self> {
        &CONFIG_MAP
    }
}

impl OwnedKind for AuthConfig {
    fn comparator() -> &'static dyn Comparator<Self> {
        &AUTH_CONFIG
    }
}

impl OwnedKind for PeerAuthentication {
    fn comparator() -> &'static dyn Comparator<Self> {
        &PEER_AUTHENTICATION
    }
}

impl OwnedKind for NetworkPolicy {
    fn comparator() -> &'static dyn Comparator<Self> {
        &NETWORK_POLICY
    }
}
