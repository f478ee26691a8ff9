//! Generic sub-resource reconciler.
//!
//! One pass is strictly sequential: build desired → fetch existing → compute
//! delta → apply. Each delta maps to at most one store call, so a failed pass
//! never leaves a half-applied change behind. Nothing is retried here; the
//! host runtime schedules the next pass, which re-derives the delta from
//! fresh state.
//!
//! Passes for the same parent must not run concurrently. The kube-runtime
//! controller guarantees this; the reconciler itself holds no locks.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use tether_core::{Delta, DeltaKind, DeltaProcessor, NamespacedName, ObjectStore};
use tether_kubehub::{key_of, resources::InferenceService, set_controller_reference};
use tracing::{debug, info};

use crate::comparators::OwnedKind;
use crate::ReconcileError;

/// Invocation surface seen by the orchestrator.
#[async_trait]
pub trait SubResourceReconciler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn reconcile(&self, isvc: &InferenceService) -> Result<(), ReconcileError>;

    /// Synchronously delete the owned object, for teardown paths that cannot
    /// wait for the ownership cascade.
    async fn remove(&self, isvc: &InferenceService) -> Result<(), ReconcileError>;
}

/// The per-kind strategies plugged into [`DeltaReconciler`].
#[async_trait]
pub trait OwnedResource: Send + Sync + 'static {
    type Kind: OwnedKind;

    fn name(&self) -> &'static str;

    /// Deterministic identity of the owned object for this parent.
    fn key(&self, isvc: &InferenceService) -> NamespacedName;

    /// A parent that is not ready turns the pass into a no-op.
    fn ready(&self, _isvc: &InferenceService) -> bool {
        true
    }

    /// `Ok(None)` means the parent does not want this object.
    async fn build(&self, isvc: &InferenceService) -> Result<Option<Self::Kind>, ReconcileError>;

    /// Copy of `existing` with the fields this reconciler owns taken from
    /// `desired`. Everything else, including the concurrency token, is kept.
    fn merge(&self, existing: &Self::Kind, desired: &Self::Kind) -> Self::Kind;

    /// Whether [`SubResourceReconciler::remove`] deletes anything.
    fn removable(&self) -> bool {
        true
    }
}

pub struct DeltaReconciler<S: OwnedResource> {
    strategy: S,
    store: Arc<dyn ObjectStore<S::Kind>>,
    processor: DeltaProcessor,
}

impl<S: OwnedResource> DeltaReconciler<S> {
    pub fn new(strategy: S, store: Arc<dyn ObjectStore<S::Kind>>) -> Self {
        Self { strategy, store, processor: DeltaProcessor::new() }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    async fn desired(&self, isvc: &InferenceService, key: &NamespacedName) -> Result<Option<S::Kind>, ReconcileError> {
        let Some(mut obj) = self.strategy.build(isvc).await? else {
            return Ok(None);
        };
        set_controller_reference(isvc, &mut obj).map_err(|source| ReconcileError::Ownership {
            kind: S::Kind::kind_name(),
            key: key.clone(),
            source,
        })?;
        Ok(Some(obj))
    }

    async fn apply(
        &self,
        delta: Delta,
        key: &NamespacedName,
        desired: Option<S::Kind>,
        existing: Option<S::Kind>,
    ) -> Result<(), ReconcileError> {
        let kind = S::Kind::kind_name();
        let res = match (delta.kind(), desired, existing) {
            (DeltaKind::Added, Some(desired), _) => {
                info!(kind = %kind, key = %key, "delta found: create");
                self.store.create(&desired).await.map(|_| ())
            }
            (DeltaKind::Updated, Some(desired), Some(existing)) => {
                info!(kind = %kind, key = %key, "delta found: update");
                let merged = self.strategy.merge(&existing, &desired);
                self.store.update(&merged).await.map(|_| ())
            }
            (DeltaKind::Removed, _, Some(existing)) => {
                let target = key_of(&existing);
                info!(kind = %kind, key = %target, "delta found: delete");
                self.store.delete(&target).await
            }
            _ => {
                debug!(kind = %kind, key = %key, "no delta found");
                Ok(())
            }
        };
        if res.is_err() {
            counter!("tether_apply_errors_total", 1, "kind" => kind);
        }
        res.map_err(ReconcileError::from)
    }
}

#[async_trait]
impl<S: OwnedResource> SubResourceReconciler for DeltaReconciler<S> {
    fn name(&self) -> &'static str {
        self.strategy.name()
    }

    async fn reconcile(&self, isvc: &InferenceService) -> Result<(), ReconcileError> {
        let t0 = Instant::now();
        let key = self.strategy.key(isvc);
        let kind = S::Kind::kind_name();
        if !self.strategy.ready(isvc) {
            debug!(kind = %kind, key = %key, "parent not ready yet; skipping");
            return Ok(());
        }

        debug!(kind = %kind, key = %key, "create desired state");
        let desired = self.desired(isvc, &key).await?;

        debug!(kind = %kind, key = %key, "get existing state");
        let existing = self.store.get(&key).await?;

        debug!(kind = %kind, key = %key, "process delta");
        let delta = self.processor.compute_delta(S::Kind::comparator(), desired.as_ref(), existing.as_ref());
        counter!("tether_delta_total", 1, "kind" => kind.clone(), "action" => delta.kind().as_str());

        let res = self.apply(delta, &key, desired, existing).await;
        histogram!("tether_subresource_latency_ms", t0.elapsed().as_secs_f64() * 1000.0, "kind" => kind);
        res
    }

    async fn remove(&self, isvc: &InferenceService) -> Result<(), ReconcileError> {
        let key = self.strategy.key(isvc);
        if !self.strategy.removable() {
            debug!(reconciler = self.strategy.name(), key = %key, "removal left to ownership cascade");
            return Ok(());
        }
        info!(kind = %S::Kind::kind_name(), key = %key, "removing");
        self.store.delete(&key).await?;
        Ok(())
    }
}
