//! Common test utilities for integration tests
//!
//! A [`TestApp`] wires services to an in-memory store and a recording
//! notifier. [`GatedStore`] pauses one chosen store operation so a test can
//! inspect state while that call is in flight.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fake::faker::lorem::en::Word;
use fake::Fake;
use peak_performance_backend::config::AppConfig;
use peak_performance_backend::error::StoreError;
use peak_performance_backend::notifications::RecordingNotifier;
use peak_performance_backend::state::AppState;
use peak_performance_backend::store::{
    Collection, Document, DocumentQuery, DocumentStore, MemoryStore, StoreOp, Version,
};
use peak_performance_shared::{MealType, NewFoodEntry, NewWorkout};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

/// Test application wrapper
pub struct TestApp {
    pub state: AppState,
    pub store: MemoryStore,
    pub gate: Arc<Gate>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let store = MemoryStore::new();
        let gate = Arc::new(Gate::default());
        let gated = GatedStore {
            inner: store.clone(),
            gate: gate.clone(),
        };
        let notifier = Arc::new(RecordingNotifier::new());
        let state = AppState::new(Arc::new(gated), notifier.clone(), config);
        Self {
            state,
            store,
            gate,
            notifier,
        }
    }
}

/// Config with short retry delays
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.store.base_retry_delay_ms = 1;
    config
}

pub fn food(calories: i32, date: DateTime<Utc>) -> NewFoodEntry {
    NewFoodEntry {
        name: Word().fake(),
        calories,
        protein: 10.0,
        carbs: 10.0,
        fat: 5.0,
        date: Some(date),
        meal_type: MealType::Lunch,
        serving_size: 1.0,
        serving_unit: "serving".to_string(),
    }
}

pub fn workout(duration: i32, calories: i32) -> NewWorkout {
    NewWorkout {
        name: Word().fake(),
        date: None,
        duration,
        calories,
        exercises: None,
        notes: None,
        is_completed: true,
    }
}

/// Pauses one call of one operation after the wrapped store has run it
#[derive(Default)]
pub struct Gate {
    /// Operation to pause and how many of its calls to let through first
    armed: Mutex<Option<(StoreOp, u32)>>,
    reached: Notify,
    release: Notify,
}

impl Gate {
    /// Pause the next call of `op`
    pub fn arm(&self, op: StoreOp) {
        self.arm_after(op, 0);
    }

    /// Let `skip` calls of `op` through, then pause the one after
    pub fn arm_after(&self, op: StoreOp, skip: u32) {
        *self.armed.lock().unwrap() = Some((op, skip));
    }

    /// Wait until the armed operation is paused
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self, op: StoreOp) {
        let hit = {
            let mut armed = self.armed.lock().unwrap();
            match *armed {
                Some((armed_op, skip)) if armed_op == op => {
                    *armed = skip.checked_sub(1).map(|left| (armed_op, left));
                    skip == 0
                }
                _ => false,
            }
        };
        if hit {
            self.reached.notify_one();
            self.release.notified().await;
        }
    }
}

pub struct GatedStore {
    inner: MemoryStore,
    gate: Arc<Gate>,
}

#[async_trait]
impl DocumentStore for GatedStore {
    async fn create(&self, collection: Collection, data: Value) -> Result<String, StoreError> {
        let result = self.inner.create(collection, data).await;
        self.gate.pass(StoreOp::Create).await;
        result
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError> {
        let result = self.inner.get(collection, id).await;
        self.gate.pass(StoreOp::Get).await;
        result
    }

    async fn query(
        &self,
        collection: Collection,
        query: &DocumentQuery,
    ) -> Result<Vec<Document>, StoreError> {
        let result = self.inner.query(collection, query).await;
        self.gate.pass(StoreOp::Query).await;
        result
    }

    async fn put(
        &self,
        collection: Collection,
        id: &str,
        data: Value,
        expected: Option<Version>,
    ) -> Result<Version, StoreError> {
        let result = self.inner.put(collection, id, data, expected).await;
        self.gate.pass(StoreOp::Put).await;
        result
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        data: Value,
    ) -> Result<Version, StoreError> {
        let result = self.inner.update(collection, id, data).await;
        self.gate.pass(StoreOp::Update).await;
        result
    }

    async fn merge(
        &self,
        collection: Collection,
        id: &str,
        patch: Value,
    ) -> Result<Version, StoreError> {
        let result = self.inner.merge(collection, id, patch).await;
        self.gate.pass(StoreOp::Merge).await;
        result
    }

    async fn delete(
        &self,
        collection: Collection,
        id: &str,
        expected: Option<Version>,
    ) -> Result<(), StoreError> {
        let result = self.inner.delete(collection, id, expected).await;
        self.gate.pass(StoreOp::Delete).await;
        result
    }
}
