#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use tether_core::{NamespacedName, StoreError};
use tether_kubehub::resources::{InferenceService, InferenceServiceSpec};
use tether_reconcile::comparators::merge_labels;
use tether_reconcile::parent::parent_key;
use tether_reconcile::{DeltaReconciler, OwnedResource, ReconcileError, SubResourceReconciler};
use tether_store::{CallCounts, MemStore, Op};

/// Owns `<isvc>-flag` carrying `x`, or nothing when `x` is `None`.
struct Flag {
    x: Option<&'static str>,
    ready: bool,
}

#[async_trait]
impl OwnedResource for Flag {
    type Kind = ConfigMap;

    fn name(&self) -> &'static str {
        "flag"
    }

    fn key(&self, isvc: &InferenceService) -> NamespacedName {
        NamespacedName::with_suffix(&parent_key(isvc), "-flag")
    }

    fn ready(&self, _isvc: &InferenceService) -> bool {
        self.ready
    }

    async fn build(&self, isvc: &InferenceService) -> Result<Option<ConfigMap>, ReconcileError> {
        let Some(x) = self.x else { return Ok(None) };
        Ok(Some(cm(&self.key(isvc).name, x)))
    }

    fn merge(&self, existing: &ConfigMap, desired: &ConfigMap) -> ConfigMap {
        let mut next = existing.clone();
        merge_labels(&mut next, desired);
        next.data = desired.data.clone();
        next
    }
}

fn cm(name: &str, x: &str) -> ConfigMap {
    let mut c = ConfigMap::default();
    c.metadata.name = Some(name.into());
    c.metadata.namespace = Some("ns".into());
    c.metadata.labels = Some(BTreeMap::from([("app".to_string(), "flag".to_string())]));
    c.data = Some(BTreeMap::from([("x".to_string(), x.to_string())]));
    c
}

fn isvc() -> InferenceService {
    let mut i = InferenceService::new("model", InferenceServiceSpec::default());
    i.metadata.namespace = Some("ns".into());
    i.metadata.uid = Some("isvc-uid".into());
    i
}

fn key() -> NamespacedName {
    NamespacedName::new("ns", "model-flag")
}

fn reconciler(store: &Arc<MemStore<ConfigMap>>, x: Option<&'static str>) -> DeltaReconciler<Flag> {
    DeltaReconciler::new(Flag { x, ready: true }, store.clone())
}

fn data_x(c: &ConfigMap) -> &str {
    c.data.as_ref().map(|d| d["x"].as_str()).unwrap_or_default()
}

#[tokio::test]
async fn absent_object_is_created_once() {
    let store = Arc::new(MemStore::<ConfigMap>::new());
    reconciler(&store, Some("a")).reconcile(&isvc()).await.unwrap();

    assert_eq!(store.calls(), CallCounts { get: 1, create: 1, ..Default::default() });
    let stored = store.peek(&key()).await.unwrap();
    assert_eq!(data_x(&stored), "a");
    assert_eq!(stored.labels()["app"], "flag");

    let owner = &stored.owner_references()[0];
    assert_eq!(owner.uid, "isvc-uid");
    assert_eq!(owner.kind, "InferenceService");
    assert_eq!(owner.controller, Some(true));
}

#[tokio::test]
async fn changed_field_is_updated_keeping_concurrency_token() {
    let store = Arc::new(MemStore::<ConfigMap>::new());
    let seeded = store.seed(cm("model-flag", "a")).await.unwrap();

    reconciler(&store, Some("b")).reconcile(&isvc()).await.unwrap();

    assert_eq!(store.calls(), CallCounts { get: 1, update: 1, ..Default::default() });
    let stored = store.peek(&key()).await.unwrap();
    assert_eq!(data_x(&stored), "b");
    assert_eq!(stored.uid(), seeded.uid());
    assert_eq!(stored.creation_timestamp(), seeded.creation_timestamp());
    assert_ne!(stored.resource_version(), seeded.resource_version());

    let sent = store.last_update().await.unwrap();
    assert!(seeded.resource_version().is_some());
    assert_eq!(sent.resource_version(), seeded.resource_version());
    assert_eq!(sent.uid(), seeded.uid());
}

#[tokio::test]
async fn unwanted_object_is_deleted_by_existing_identity() {
    let store = Arc::new(MemStore::<ConfigMap>::new());
    store.seed(cm("model-flag", "a")).await.unwrap();

    reconciler(&store, None).reconcile(&isvc()).await.unwrap();

    assert_eq!(store.calls(), CallCounts { get: 1, delete: 1, ..Default::default() });
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn equal_object_causes_no_store_mutation() {
    let store = Arc::new(MemStore::<ConfigMap>::new());
    store.seed(cm("model-flag", "a")).await.unwrap();

    reconciler(&store, Some("a")).reconcile(&isvc()).await.unwrap();

    assert_eq!(store.calls(), CallCounts { get: 1, ..Default::default() });
}

#[tokio::test]
async fn absent_and_unwanted_is_a_no_op() {
    let store = Arc::new(MemStore::<ConfigMap>::new());
    reconciler(&store, None).reconcile(&isvc()).await.unwrap();
    assert_eq!(store.calls().mutations(), 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn conflict_on_update_is_returned_unmodified() {
    let store = Arc::new(MemStore::<ConfigMap>::new());
    store.seed(cm("model-flag", "a")).await.unwrap();
    store
        .fail_next(Op::Update, StoreError::Conflict { key: key(), message: "object was modified".into() })
        .await;

    let err = reconciler(&store, Some("b")).reconcile(&isvc()).await.unwrap_err();

    match &err {
        ReconcileError::Store(StoreError::Conflict { key: k, message }) => {
            assert_eq!(k, &key());
            assert_eq!(message, "object was modified");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(err.to_string(), StoreError::Conflict { key: key(), message: "object was modified".into() }.to_string());
    assert_eq!(store.calls().update, 1);
    assert_eq!(data_x(&store.peek(&key()).await.unwrap()), "a");
}

#[tokio::test]
async fn fetch_failure_stops_the_pass() {
    let store = Arc::new(MemStore::<ConfigMap>::new());
    store.fail_next(Op::Get, StoreError::Transport("connection refused".into())).await;

    let err = reconciler(&store, Some("a")).reconcile(&isvc()).await.unwrap_err();
    assert!(matches!(err.store_error(), Some(StoreError::Transport(_))));
    assert_eq!(store.calls().mutations(), 0);
}

#[tokio::test]
async fn second_pass_is_a_no_op() {
    let store = Arc::new(MemStore::<ConfigMap>::new());
    let parent = isvc();

    for (before, after) in [(None, Some("a")), (Some("a"), Some("b")), (Some("b"), None)] {
        if let Some(x) = before {
            // state left by the previous step
            assert_eq!(data_x(&store.peek(&key()).await.unwrap()), x);
        }
        let r = reconciler(&store, after);
        r.reconcile(&parent).await.unwrap();
        store.reset_calls();
        r.reconcile(&parent).await.unwrap();
        assert_eq!(store.calls().mutations(), 0, "second pass towards {:?} mutated", after);
    }
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn not_ready_parent_touches_nothing() {
    let store = Arc::new(MemStore::<ConfigMap>::new());
    let r = DeltaReconciler::new(Flag { x: Some("a"), ready: false }, store.clone());
    r.reconcile(&isvc()).await.unwrap();
    assert_eq!(store.calls(), CallCounts::default());
}

#[tokio::test]
async fn parent_without_uid_fails_before_any_call() {
    let store = Arc::new(MemStore::<ConfigMap>::new());
    let mut parent = isvc();
    parent.metadata.uid = None;

    let err = reconciler(&store, Some("a")).reconcile(&parent).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Ownership { .. }), "{:?}", err);
    assert_eq!(store.calls(), CallCounts::default());
}

#[tokio::test]
async fn remove_deletes_by_key_and_tolerates_absence() {
    let store = Arc::new(MemStore::<ConfigMap>::new());
    store.seed(cm("model-flag", "a")).await.unwrap();
    let r = reconciler(&store, Some("a"));

    r.remove(&isvc()).await.unwrap();
    assert!(store.is_empty().await);
    r.remove(&isvc()).await.unwrap();
    assert_eq!(store.calls(), CallCounts { delete: 2, ..Default::default() });
}

#[tokio::test]
async fn foreign_objects_are_left_alone() {
    let store = Arc::new(MemStore::<ConfigMap>::new());
    store.seed(cm("other", "z")).await.unwrap();

    reconciler(&store, Some("a")).reconcile(&isvc()).await.unwrap();
    reconciler(&store, None).reconcile(&isvc()).await.unwrap();

    let left: Vec<String> = store.objects().await.iter().map(|o| o.name_any()).collect();
    assert_eq!(left, vec!["other"]);
}
