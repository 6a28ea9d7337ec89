//! In-memory document store
//!
//! Used by tests and offline sessions. Every operation yields to the runtime
//! once before touching state so concurrent callers interleave the way they
//! would against a remote store. Failures can be injected per operation.

use super::{index_fields, merge_json, Collection, Document, DocumentQuery, DocumentStore, Version};
use crate::error::StoreError;
use async_trait::async_trait;
use peak_performance_shared::models::new_id;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

/// Operation kinds, used for failure injection and call counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Create,
    Get,
    Query,
    Put,
    Update,
    Merge,
    Delete,
}

#[derive(Debug, Clone)]
struct Stored {
    version: Version,
    data: Value,
}

#[derive(Default)]
struct Inner {
    documents: BTreeMap<(Collection, String), Stored>,
    /// Keyed by operation and, when scoped, collection
    failures: HashMap<(StoreOp, Option<Collection>), u32>,
    calls: HashMap<StoreOp, u32>,
}

/// Thread-safe in-memory [`DocumentStore`]
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls of `op` fail with [`StoreError::Unavailable`]
    pub fn fail_next(&self, op: StoreOp, times: u32) {
        *self.lock().failures.entry((op, None)).or_insert(0) += times;
    }

    /// Like [`fail_next`](Self::fail_next), limited to one collection
    pub fn fail_next_in(&self, collection: Collection, op: StoreOp, times: u32) {
        *self
            .lock()
            .failures
            .entry((op, Some(collection)))
            .or_insert(0) += times;
    }

    /// Store raw data without any shape checks
    pub fn insert_raw(&self, collection: Collection, id: &str, data: Value) {
        let mut inner = self.lock();
        let version = inner
            .documents
            .get(&(collection, id.to_string()))
            .map(|s| s.version + 1)
            .unwrap_or(1);
        inner
            .documents
            .insert((collection, id.to_string()), Stored { version, data });
    }

    /// Current data of a document
    pub fn snapshot(&self, collection: Collection, id: &str) -> Option<Value> {
        self.lock()
            .documents
            .get(&(collection, id.to_string()))
            .map(|s| s.data.clone())
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.lock()
            .documents
            .keys()
            .filter(|(c, _)| *c == collection)
            .count()
    }

    /// How many times `op` has been called
    pub fn op_count(&self, op: StoreOp) -> u32 {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().documents.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Every write is a single insert, so a poisoned map is still consistent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Yield, then consume an injected failure for `op` if one is pending
    ///
    /// Collection-scoped failures are consumed before unscoped ones.
    async fn enter(&self, op: StoreOp, collection: Collection) -> Result<(), StoreError> {
        tokio::task::yield_now().await;
        let mut inner = self.lock();
        *inner.calls.entry(op).or_insert(0) += 1;
        for key in [(op, Some(collection)), (op, None)] {
            if let Some(remaining) = inner.failures.get_mut(&key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(StoreError::Unavailable(format!(
                        "injected {:?} failure on {}",
                        op, collection
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: Collection, data: Value) -> Result<String, StoreError> {
        self.enter(StoreOp::Create, collection).await?;
        let id = new_id();
        self.lock()
            .documents
            .insert((collection, id.clone()), Stored { version: 1, data });
        Ok(id)
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        self.enter(StoreOp::Get, collection).await?;
        Ok(self
            .lock()
            .documents
            .get(&(collection, id.to_string()))
            .map(|s| Document {
                id: id.to_string(),
                version: s.version,
                data: s.data.clone(),
            }))
    }

    async fn query(
        &self,
        collection: Collection,
        query: &DocumentQuery,
    ) -> Result<Vec<Document>, StoreError> {
        self.enter(StoreOp::Query, collection).await?;
        let inner = self.lock();
        let mut matched: Vec<_> = inner
            .documents
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .filter_map(|((_, id), stored)| {
                let (owner, date) = index_fields(collection, id, &stored.data);
                query.matches(owner.as_deref(), date).then(|| {
                    (
                        date,
                        Document {
                            id: id.clone(),
                            version: stored.version,
                            data: stored.data.clone(),
                        },
                    )
                })
            })
            .collect();

        // Newest first; undated documents last
        matched.sort_by(|(a, _), (b, _)| b.cmp(a));
        Ok(matched.into_iter().map(|(_, doc)| doc).collect())
    }

    async fn put(
        &self,
        collection: Collection,
        id: &str,
        data: Value,
        expected: Option<Version>,
    ) -> Result<Version, StoreError> {
        self.enter(StoreOp::Put, collection).await?;
        let mut inner = self.lock();
        let key = (collection, id.to_string());
        let current = inner.documents.get(&key).map(|s| s.version);
        if current != expected {
            return Err(StoreError::conflict(collection, id));
        }
        let version = current.unwrap_or(0) + 1;
        inner.documents.insert(key, Stored { version, data });
        Ok(version)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        data: Value,
    ) -> Result<Version, StoreError> {
        self.enter(StoreOp::Update, collection).await?;
        let mut inner = self.lock();
        match inner.documents.get_mut(&(collection, id.to_string())) {
            Some(stored) => {
                stored.version += 1;
                stored.data = data;
                Ok(stored.version)
            }
            None => Err(StoreError::not_found(collection, id)),
        }
    }

    async fn merge(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<Version, StoreError> {
        self.enter(StoreOp::Merge, collection).await?;
        let mut inner = self.lock();
        let stored = inner
            .documents
            .entry((collection, id.to_string()))
            .or_insert_with(|| Stored {
                version: 0,
                data: Value::Object(Default::default()),
            });
        merge_json(&mut stored.data, patch);
        stored.version += 1;
        Ok(stored.version)
    }

    async fn delete(
        &self,
        collection: Collection,
        id: &str,
        expected: Option<Version>,
    ) -> Result<(), StoreError> {
        self.enter(StoreOp::Delete, collection).await?;
        let mut inner = self.lock();
        let key = (collection, id.to_string());
        let current = inner
            .documents
            .get(&key)
            .map(|s| s.version)
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        if expected.is_some_and(|v| v != current) {
            return Err(StoreError::conflict(collection, id));
        }
        inner.documents.remove(&key);
        Ok(())
    }
}
