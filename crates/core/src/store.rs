//! The object store contract consumed by reconcilers.

use async_trait::async_trait;
use thiserror::Error;

use crate::NamespacedName;

/// Failures reported by an object store. "Not found" on a read is not an
/// error and is reported as `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic concurrency rejection: the object changed since it was read.
    #[error("conflict on {key}: {message}")]
    Conflict { key: NamespacedName, message: String },

    #[error("{key} already exists")]
    AlreadyExists { key: NamespacedName },

    /// Returned by `update` when the target vanished.
    #[error("{key} not found")]
    NotFound { key: NamespacedName },

    #[error("forbidden on {key}: {message}")]
    Forbidden { key: NamespacedName, message: String },

    #[error("invalid object: {message}")]
    Invalid { message: String },

    #[error("api error {code} ({reason}): {message}")]
    Api { code: u16, reason: String, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Point reads and single-object mutations keyed by namespaced name.
///
/// Every mutation is one atomic call; implementations never retry.
#[async_trait]
pub trait ObjectStore<K>: Send + Sync {
    async fn get(&self, key: &NamespacedName) -> StoreResult<Option<K>>;

    async fn create(&self, obj: &K) -> StoreResult<K>;

    /// Replaces the stored object. The object's concurrency token must match
    /// the stored one or the call fails with [`StoreError::Conflict`].
    async fn update(&self, obj: &K) -> StoreResult<K>;

    /// Deleting an absent object succeeds.
    async fn delete(&self, key: &NamespacedName) -> StoreResult<()>;
}
