//! Tether core types
//!
//! Everything here is pure: the delta classification, the comparator
//! capability and the contract the reconcilers expect from an object store.
//! Nothing in this crate talks to a cluster.

#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

mod delta;
mod store;

pub use delta::{Comparator, Delta, DeltaKind, DeltaProcessor};
pub use store::{ObjectStore, StoreError, StoreResult};

pub mod prelude {
    pub use super::{Comparator, Delta, DeltaKind, DeltaProcessor, NamespacedName, ObjectStore, StoreError, StoreResult};
}

/// Identity of a namespaced object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }

    /// Owned objects are named after their parent plus a fixed suffix.
    pub fn with_suffix(parent: &NamespacedName, suffix: &str) -> Self {
        Self { namespace: parent.namespace.clone(), name: format!("{}{}", parent.name, suffix) }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
