//! # In-Memory Provider
//!
//! Process-local [`DocumentStore`] used by the test suites and for local
//! dry runs. Every operation is counted, individual operations can be made to
//! fail, and an optional [`OperationLog`] records the order of side effects so
//! callers can assert on sequencing across collaborators.

use super::{CollectionRef, DocumentStore, Record, StoreConnector, StoreError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared, ordered log of side effects (`"delete:<id>"`, `"finalizer-removed:<ns>/<name>"`, ...)
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        lock(&self.entries).push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        lock(&self.entries).clone()
    }

    /// Index of the first entry equal to `entry`
    pub fn position(&self, entry: &str) -> Option<usize> {
        lock(&self.entries).iter().position(|e| e == entry)
    }
}

/// In-memory document store
#[derive(Debug, Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<BTreeMap<CollectionRef, BTreeMap<String, Record>>>,
    next_id: AtomicU64,
    insert_calls: AtomicUsize,
    find_calls: AtomicUsize,
    update_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    fail_inserts: AtomicBool,
    fail_updates: AtomicBool,
    fail_deletes: AtomicBool,
    log: Option<OperationLog>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: OperationLog) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    fn log(&self, entry: String) {
        if let Some(log) = &self.log {
            log.record(entry);
        }
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn find_calls(&self) -> usize {
        self.find_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// All records of a collection, ordered by id
    pub fn records(&self, target: &CollectionRef) -> Vec<(String, Record)> {
        lock(&self.collections)
            .get(target)
            .map(|records| {
                records
                    .iter()
                    .map(|(id, record)| (id.clone(), record.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn record(&self, target: &CollectionRef, id: &str) -> Option<Record> {
        lock(&self.collections)
            .get(target)
            .and_then(|records| records.get(id).cloned())
    }

    /// Write a record directly, bypassing counters (test seeding)
    pub fn put(&self, target: &CollectionRef, id: &str, record: Record) {
        lock(&self.collections)
            .entry(target.clone())
            .or_default()
            .insert(id.to_string(), record);
    }

    /// Drop a record directly, simulating an out-of-band delete
    pub fn remove(&self, target: &CollectionRef, id: &str) -> Option<Record> {
        lock(&self.collections)
            .get_mut(target)
            .and_then(|records| records.remove(id))
    }

    fn generate_id(&self) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{n:024x}")
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert_one(
        &self,
        target: &CollectionRef,
        id: Option<&str>,
        record: &Record,
    ) -> Result<String, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::operation("insert", "injected insert failure"));
        }

        let id = id.map_or_else(|| self.generate_id(), str::to_string);
        let mut collections = lock(&self.collections);
        let records = collections.entry(target.clone()).or_default();
        if records.contains_key(&id) {
            return Err(StoreError::DuplicateKey(id));
        }
        records.insert(id.clone(), record.clone());
        drop(collections);

        self.log(format!("insert:{id}"));
        Ok(id)
    }

    async fn find_by_id(
        &self,
        target: &CollectionRef,
        id: &str,
    ) -> Result<Option<Record>, StoreError> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.record(target, id))
    }

    async fn update_by_id(
        &self,
        target: &CollectionRef,
        id: &str,
        record: &Record,
    ) -> Result<u64, StoreError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::operation("update", "injected update failure"));
        }

        let mut collections = lock(&self.collections);
        let modified = match collections.get_mut(target).and_then(|r| r.get_mut(id)) {
            Some(existing) if existing != record => {
                *existing = record.clone();
                1
            }
            _ => 0,
        };
        drop(collections);

        self.log(format!("update:{id}"));
        Ok(modified)
    }

    async fn delete_by_id(&self, target: &CollectionRef, id: &str) -> Result<bool, StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::operation("delete", "injected delete failure"));
        }

        let existed = self.remove(target, id).is_some();
        self.log(format!("delete:{id}"));
        Ok(existed)
    }
}

/// Connector handing out one shared [`InMemoryDocumentStore`]
#[derive(Debug)]
pub struct InMemoryConnector {
    store: Arc<InMemoryDocumentStore>,
    unreachable: Mutex<HashSet<String>>,
    connect_calls: AtomicUsize,
}

impl InMemoryConnector {
    pub fn new(store: Arc<InMemoryDocumentStore>) -> Self {
        Self {
            store,
            unreachable: Mutex::new(HashSet::new()),
            connect_calls: AtomicUsize::new(0),
        }
    }

    pub fn store(&self) -> &Arc<InMemoryDocumentStore> {
        &self.store
    }

    /// Make connection attempts to `uri` fail (or succeed again)
    pub fn set_unreachable(&self, uri: &str, unreachable: bool) {
        let mut set = lock(&self.unreachable);
        if unreachable {
            set.insert(uri.to_string());
        } else {
            set.remove(uri);
        }
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    async fn connect(
        &self,
        uri: &str,
        _timeout: Duration,
    ) -> Result<Arc<dyn DocumentStore>, StoreError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if !(uri.starts_with("mongodb://") || uri.starts_with("mongodb+srv://")) {
            return Err(StoreError::InvalidUri(format!(
                "'{uri}' does not use the mongodb scheme"
            )));
        }
        if lock(&self.unreachable).contains(uri) {
            return Err(StoreError::Connect("connection refused".to_string()));
        }
        Ok(Arc::clone(&self.store) as Arc<dyn DocumentStore>)
    }
}
