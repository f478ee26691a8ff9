use std::collections::BTreeMap;

use kube::CustomResource;
use serde::{Deserialize, Serialize};

/// Authorino access policy protecting an inference endpoint.
///
/// `hosts` is the only field the controller computes; the remaining rules come
/// verbatim from a template and are kept as opaque JSON.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[kube(
    group = "authorino.kuadrant.io",
    version = "v1beta2",
    kind = "AuthConfig",
    namespaced,
    schema = "disabled"
)]
pub struct AuthConfigSpec {
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(flatten)]
    pub rules: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sections_round_trip_as_rules() {
        let yaml = r#"
hosts: [a.example.com]
authentication:
  anonymous-access:
    anonymous: {}
authorization: {}
"#;
        let spec: AuthConfigSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.hosts, vec!["a.example.com".to_string()]);
        assert!(spec.rules.contains_key("authentication"));
        assert!(spec.rules.contains_key("authorization"));

        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back["authentication"]["anonymous-access"]["anonymous"], serde_json::json!({}));
        assert_eq!(back["hosts"][0], "a.example.com");
    }
}
