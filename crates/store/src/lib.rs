//! Tether store: in-RAM object store
//!
//! [`MemStore`] honors the same contract as the API server behind
//! `tether_kubehub::KubeStore`: server-assigned uid and resourceVersion,
//! optimistic concurrency on update, "not found" as an outcome rather than an
//! error. It also counts calls per operation and can inject failures, which is
//! what the reconciler tests and the offline `reconcile-file` mode rely on.

#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::{Resource, ResourceExt};
use rustc_hash::FxHashMap;
use tether_core::{NamespacedName, ObjectStore, StoreError, StoreResult};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Get,
    Create,
    Update,
    Delete,
}

/// Snapshot of how many times each operation was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub create: usize,
    pub update: usize,
    pub delete: usize,
}

impl CallCounts {
    pub fn mutations(&self) -> usize {
        self.create + self.update + self.delete
    }
}

#[derive(Default)]
struct Counters {
    get: AtomicUsize,
    create: AtomicUsize,
    update: AtomicUsize,
    delete: AtomicUsize,
}

impl Counters {
    fn bump(&self, op: Op) {
        let c = match op {
            Op::Get => &self.get,
            Op::Create => &self.create,
            Op::Update => &self.update,
            Op::Delete => &self.delete,
        };
        c.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CallCounts {
        CallCounts {
            get: self.get.load(Ordering::Relaxed),
            create: self.create.load(Ordering::Relaxed),
            update: self.update.load(Ordering::Relaxed),
            delete: self.delete.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        for c in [&self.get, &self.create, &self.update, &self.delete] {
            c.store(0, Ordering::Relaxed);
        }
    }
}

struct State<K> {
    objects: FxHashMap<NamespacedName, K>,
    next_rv: u64,
    faults: VecDeque<(Op, StoreError)>,
    last_update: Option<K>,
}

impl<K> State<K> {
    fn take_fault(&mut self, op: Op) -> Option<StoreError> {
        let idx = self.faults.iter().position(|(o, _)| *o == op)?;
        self.faults.remove(idx).map(|(_, e)| e)
    }

    fn bump_rv(&mut self) -> String {
        self.next_rv = self.next_rv.saturating_add(1);
        self.next_rv.to_string()
    }
}

pub struct MemStore<K> {
    state: Mutex<State<K>>,
    calls: Counters,
}

impl<K> Default for MemStore<K> {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                objects: FxHashMap::default(),
                next_rv: 0,
                faults: VecDeque::new(),
                last_update: None,
            }),
            calls: Counters::default(),
        }
    }
}

fn key_checked<K: Resource>(obj: &K) -> StoreResult<NamespacedName> {
    let name = obj.meta().name.clone().filter(|n| !n.is_empty());
    let namespace = obj.meta().namespace.clone().filter(|n| !n.is_empty());
    match (namespace, name) {
        (Some(ns), Some(name)) => Ok(NamespacedName::new(ns, name)),
        _ => Err(StoreError::Invalid { message: "metadata.name and metadata.namespace are required".into() }),
    }
}

impl<K> MemStore<K>
where
    K: Resource + Clone + Send + Sync,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> CallCounts {
        self.calls.snapshot()
    }

    pub fn reset_calls(&self) {
        self.calls.reset()
    }

    /// Make the next call of `op` fail with `err`. Faults queue per operation.
    pub async fn fail_next(&self, op: Op, err: StoreError) {
        self.state.lock().await.faults.push_back((op, err));
    }

    /// Insert an object as if it had been created earlier. Not counted.
    pub async fn seed(&self, obj: K) -> StoreResult<K> {
        let mut st = self.state.lock().await;
        Self::insert_new(&mut st, obj)
    }

    /// Read without counting.
    pub async fn peek(&self, key: &NamespacedName) -> Option<K> {
        self.state.lock().await.objects.get(key).cloned()
    }

    /// All stored objects ordered by key.
    pub async fn objects(&self) -> Vec<K> {
        let st = self.state.lock().await;
        let mut keys: Vec<&NamespacedName> = st.objects.keys().collect();
        keys.sort();
        keys.into_iter().filter_map(|k| st.objects.get(k).cloned()).collect()
    }

    /// The object most recently passed to `update`, as the caller sent it.
    pub async fn last_update(&self) -> Option<K> {
        self.state.lock().await.last_update.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn insert_new(st: &mut State<K>, mut obj: K) -> StoreResult<K> {
        let key = key_checked(&obj)?;
        if st.objects.contains_key(&key) {
            return Err(StoreError::AlreadyExists { key });
        }
        let rv = st.bump_rv();
        let meta = obj.meta_mut();
        meta.uid = Some(Uuid::new_v4().to_string());
        meta.resource_version = Some(rv);
        meta.creation_timestamp = Some(Time(chrono::Utc::now()));
        st.objects.insert(key, obj.clone());
        Ok(obj)
    }
}

#[async_trait]
impl<K> ObjectStore<K> for MemStore<K>
where
    K: Resource + Clone + Send + Sync,
{
    async fn get(&self, key: &NamespacedName) -> StoreResult<Option<K>> {
        self.calls.bump(Op::Get);
        let mut st = self.state.lock().await;
        if let Some(err) = st.take_fault(Op::Get) {
            return Err(err);
        }
        Ok(st.objects.get(key).cloned())
    }

    async fn create(&self, obj: &K) -> StoreResult<K> {
        self.calls.bump(Op::Create);
        let mut st = self.state.lock().await;
        if let Some(err) = st.take_fault(Op::Create) {
            return Err(err);
        }
        let created = Self::insert_new(&mut st, obj.clone())?;
        debug!(name = %created.name_any(), rv = ?created.resource_version(), "created");
        Ok(created)
    }

    async fn update(&self, obj: &K) -> StoreResult<K> {
        self.calls.bump(Op::Update);
        let key = key_checked(obj)?;
        let mut st = self.state.lock().await;
        st.last_update = Some(obj.clone());
        if let Some(err) = st.take_fault(Op::Update) {
            return Err(err);
        }
        let (uid, created, current_rv) = match st.objects.get(&key) {
            Some(cur) => (cur.meta().uid.clone(), cur.meta().creation_timestamp.clone(), cur.resource_version()),
            None => return Err(StoreError::NotFound { key }),
        };
        // An update without a resourceVersion is unconditional, as on the API server.
        if let Some(rv) = obj.resource_version() {
            if Some(&rv) != current_rv.as_ref() {
                return Err(StoreError::Conflict {
                    key,
                    message: format!("resourceVersion {} is stale (current {})", rv, current_rv.unwrap_or_default()),
                });
            }
        }
        let rv = st.bump_rv();
        let mut next = obj.clone();
        let meta = next.meta_mut();
        meta.uid = uid;
        meta.creation_timestamp = created;
        meta.resource_version = Some(rv);
        st.objects.insert(key, next.clone());
        debug!(name = %next.name_any(), rv = ?next.resource_version(), "updated");
        Ok(next)
    }

    async fn delete(&self, key: &NamespacedName) -> StoreResult<()> {
        self.calls.bump(Op::Delete);
        let mut st = self.state.lock().await;
        if let Some(err) = st.take_fault(Op::Delete) {
            return Err(err);
        }
        if st.objects.remove(key).is_some() {
            debug!(key = %key, "deleted");
        }
        Ok(())
    }
}
