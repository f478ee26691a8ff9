//! Tether kubehub: kube-rs wiring for the reconcilers
//!
//! Provides the [`KubeStore`] adapter that implements the core
//! [`ObjectStore`] contract over `kube::Api`, ownership stamping, and the
//! custom resource types the controller reads or owns.

#![forbid(unsafe_code)]

pub mod owner;
pub mod resources;

use std::fmt::Debug;
use std::marker::PhantomData;

use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::{
    api::{Api, DeleteParams, PostParams},
    core::NamespaceResourceScope,
    Client, Resource, ResourceExt,
};
use metrics::counter;
use serde::{de::DeserializeOwned, Serialize};
use tether_core::{NamespacedName, ObjectStore, StoreError, StoreResult};
use tracing::debug;

pub use owner::{set_controller_reference, OwnershipError};

/// Build a client from the ambient kubeconfig or in-cluster service account.
pub async fn get_kube_client() -> Result<Client> {
    Client::try_default().await.context("building kube client")
}

/// Identity of an object, read from its metadata.
pub fn key_of<K: Resource>(obj: &K) -> NamespacedName {
    NamespacedName::new(obj.namespace().unwrap_or_default(), obj.name_any())
}

/// Map a kube client error onto the store contract.
pub fn store_error(key: &NamespacedName, err: kube::Error) -> StoreError {
    match err {
        kube::Error::Api(ae) => match ae.code {
            409 if ae.reason == "AlreadyExists" => StoreError::AlreadyExists { key: key.clone() },
            409 => StoreError::Conflict { key: key.clone(), message: ae.message },
            404 => StoreError::NotFound { key: key.clone() },
            403 => StoreError::Forbidden { key: key.clone(), message: ae.message },
            422 => StoreError::Invalid { message: ae.message },
            code => StoreError::Api { code, reason: ae.reason, message: ae.message },
        },
        other => StoreError::Transport(other.to_string()),
    }
}

/// [`ObjectStore`] backed by the API server. Updates are full replaces, so the
/// server's resourceVersion check provides optimistic concurrency.
pub struct KubeStore<K> {
    client: Client,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for KubeStore<K> {
    fn clone(&self) -> Self {
        Self { client: self.client.clone(), _kind: PhantomData }
    }
}

impl<K> KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
{
    pub fn new(client: Client) -> Self {
        Self { client, _kind: PhantomData }
    }

    fn api(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl<K> ObjectStore<K> for KubeStore<K>
where
    K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static,
{
    async fn get(&self, key: &NamespacedName) -> StoreResult<Option<K>> {
        counter!("tether_store_calls_total", 1, "op" => "get", "kind" => K::kind(&()).to_string());
        self.api(&key.namespace).get_opt(&key.name).await.map_err(|e| store_error(key, e))
    }

    async fn create(&self, obj: &K) -> StoreResult<K> {
        let key = key_of(obj);
        counter!("tether_store_calls_total", 1, "op" => "create", "kind" => K::kind(&()).to_string());
        debug!(key = %key, kind = %K::kind(&()), "create");
        self.api(&key.namespace)
            .create(&PostParams::default(), obj)
            .await
            .map_err(|e| store_error(&key, e))
    }

    async fn update(&self, obj: &K) -> StoreResult<K> {
        let key = key_of(obj);
        counter!("tether_store_calls_total", 1, "op" => "update", "kind" => K::kind(&()).to_string());
        debug!(key = %key, kind = %K::kind(&()), rv = ?obj.resource_version(), "replace");
        self.api(&key.namespace)
            .replace(&key.name, &PostParams::default(), obj)
            .await
            .map_err(|e| store_error(&key, e))
    }

    async fn delete(&self, key: &NamespacedName) -> StoreResult<()> {
        counter!("tether_store_calls_total", 1, "op" => "delete", "kind" => K::kind(&()).to_string());
        debug!(key = %key, kind = %K::kind(&()), "delete");
        match self.api(&key.namespace).delete(&key.name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
            Err(e) => Err(store_error(key, e)),
        }
    }
}
