//! Application state management
//!
//! Explicitly constructed handles to the store, the notifier and the
//! configuration. Services receive an `&AppState`; nothing is global, so
//! tests can substitute an in-memory store and a recording notifier.

use crate::config::AppConfig;
use crate::notifications::{NotificationCenter, Notifier};
use crate::repositories::offset_from_minutes;
use crate::services::stats::PendingDeltas;
use crate::store::{DocumentStore, TransactionRunner};
use chrono::FixedOffset;
use std::sync::Arc;

/// Shared application state
///
/// All fields are `Arc`s or wrap them, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub transactions: TransactionRunner,
    pub notifications: NotificationCenter,
    /// Stats deltas waiting for a successful stats write
    pub pending_deltas: PendingDeltas,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
        config: AppConfig,
    ) -> Self {
        let transactions = TransactionRunner::new(store.clone(), &config.store);
        let notifications = NotificationCenter::new(notifier, config.notifications.clone());
        Self {
            store,
            transactions,
            notifications,
            pending_deltas: PendingDeltas::new(),
            config: Arc::new(config),
        }
    }

    #[inline]
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    #[inline]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Offset used for calendar-day boundaries
    pub fn utc_offset(&self) -> FixedOffset {
        offset_from_minutes(self.config.nutrition.utc_offset_minutes)
    }
}
