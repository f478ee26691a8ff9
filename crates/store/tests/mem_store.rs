#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use tether_core::{NamespacedName, ObjectStore, StoreError};
use tether_store::{CallCounts, MemStore, Op};

fn cm(name: &str, x: &str) -> ConfigMap {
    let mut c = ConfigMap::default();
    c.metadata.name = Some(name.into());
    c.metadata.namespace = Some("ns".into());
    c.data = Some(BTreeMap::from([("x".to_string(), x.to_string())]));
    c
}

fn key(name: &str) -> NamespacedName {
    NamespacedName::new("ns", name)
}

#[tokio::test]
async fn get_of_missing_object_is_none() {
    let store: MemStore<ConfigMap> = MemStore::new();
    assert!(store.get(&key("nope")).await.unwrap().is_none());
    assert_eq!(store.calls(), CallCounts { get: 1, ..Default::default() });
}

#[tokio::test]
async fn create_assigns_server_fields() {
    let store: MemStore<ConfigMap> = MemStore::new();
    let created = store.create(&cm("a", "1")).await.unwrap();
    assert!(created.uid().is_some());
    assert_eq!(created.resource_version().as_deref(), Some("1"));
    assert!(created.creation_timestamp().is_some());

    let err = store.create(&cm("a", "2")).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists { .. }));
}

#[tokio::test]
async fn update_requires_current_resource_version() {
    let store: MemStore<ConfigMap> = MemStore::new();
    let v1 = store.create(&cm("a", "1")).await.unwrap();

    let mut v2 = v1.clone();
    v2.data = Some(BTreeMap::from([("x".to_string(), "2".to_string())]));
    let v2 = store.update(&v2).await.unwrap();
    assert_eq!(v2.uid(), v1.uid());
    assert_ne!(v2.resource_version(), v1.resource_version());

    // v1 carries the old token now
    let err = store.update(&v1).await.unwrap_err();
    assert!(err.is_conflict(), "{:?}", err);
    let stored = store.peek(&key("a")).await.unwrap();
    assert_eq!(stored.data.unwrap()["x"], "2");
}

#[tokio::test]
async fn update_of_missing_object_is_not_found() {
    let store: MemStore<ConfigMap> = MemStore::new();
    let err = store.update(&cm("ghost", "1")).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let store: MemStore<ConfigMap> = MemStore::new();
    store.seed(cm("a", "1")).await.unwrap();
    store.delete(&key("a")).await.unwrap();
    store.delete(&key("a")).await.unwrap();
    assert!(store.is_empty().await);
    assert_eq!(store.calls().delete, 2);
}

#[tokio::test]
async fn injected_faults_fire_once_per_operation() {
    let store: MemStore<ConfigMap> = MemStore::new();
    store.seed(cm("a", "1")).await.unwrap();
    store
        .fail_next(Op::Get, StoreError::Transport("connection reset".into()))
        .await;

    let err = store.get(&key("a")).await.unwrap_err();
    assert!(matches!(err, StoreError::Transport(_)));
    assert!(store.get(&key("a")).await.unwrap().is_some());
}

#[tokio::test]
async fn seeding_is_not_counted() {
    let store: MemStore<ConfigMap> = MemStore::new();
    store.seed(cm("b", "1")).await.unwrap();
    store.seed(cm("a", "1")).await.unwrap();
    assert_eq!(store.calls(), CallCounts::default());
    let names: Vec<String> = store.objects().await.iter().map(|o| o.name_any()).collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[tokio::test]
async fn objects_need_name_and_namespace() {
    let store: MemStore<ConfigMap> = MemStore::new();
    let mut c = cm("a", "1");
    c.metadata.namespace = None;
    let err = store.create(&c).await.unwrap_err();
    assert!(matches!(err, StoreError::Invalid { .. }));
}

#[tokio::test]
async fn last_update_is_what_the_caller_sent() {
    let store: MemStore<ConfigMap> = MemStore::new();
    assert!(store.last_update().await.is_none());
    let v1 = store.create(&cm("a", "1")).await.unwrap();

    let mut blind = cm("a", "2");
    blind.metadata.resource_version = None;
    let stored = store.update(&blind).await.unwrap();
    assert!(stored.resource_version().is_some());
    assert_eq!(store.last_update().await.unwrap().resource_version(), None);

    store.update(&v1).await.unwrap_err();
    assert_eq!(store.last_update().await.unwrap().resource_version(), v1.resource_version());
}
