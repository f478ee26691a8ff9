//! Resource types that are not part of k8s-openapi.
//!
//! Only the fields the controller reads or owns are modelled; unknown fields
//! are ignored on read. None of these types are ever written back except the
//! owned ones (`AuthConfig`, `PeerAuthentication`).

mod authconfig;
mod inference;
mod peer_auth;

pub use authconfig::{AuthConfig, AuthConfigSpec};
pub use inference::{
    InferenceService, InferenceServiceSpec, InferenceServiceStatus, ModelFormat, ModelSpec, PredictorSpec,
    ServingRuntime, ServingRuntimeSpec,
};
pub use peer_auth::{MtlsMode, MutualTls, PeerAuthentication, PeerAuthenticationSpec, WorkloadSelector};
