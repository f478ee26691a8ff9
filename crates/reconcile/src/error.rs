use tether_core::{NamespacedName, StoreError};
use tether_kubehub::OwnershipError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A store call failed; surfaced exactly as the store reported it.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The desired object could not be computed and no usable default exists.
    #[error("could not build {kind} {key}: {message}")]
    Build { kind: String, key: NamespacedName, message: String },

    #[error("could not set controller reference on {kind} {key}: {source}")]
    Ownership {
        kind: String,
        key: NamespacedName,
        #[source]
        source: OwnershipError,
    },

    #[error("template error: {0}")]
    Template(String),
}

impl ReconcileError {
    /// The underlying store error, if this failure came from a store call.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            ReconcileError::Store(e) => Some(e),
            _ => None,
        }
    }
}
