//! Document store contract
//!
//! The entry and stats flows talk to persistence only through
//! [`DocumentStore`]. Documents are JSON objects addressed by collection and
//! id, carry a monotonically increasing version for optimistic concurrency,
//! and are indexed by owner (`userId`) and `date` for list queries.

pub mod memory;
pub mod postgres;
pub mod transaction;

pub use memory::{MemoryStore, StoreOp};
pub use postgres::PgDocumentStore;
pub use transaction::TransactionRunner;

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Version of a stored document; bumped on every write
pub type Version = i64;

/// Logical collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    /// `users/{userId}`: stats and goals
    Users,
    Workouts,
    FoodEntries,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Workouts => "workouts",
            Collection::FoodEntries => "foodEntries",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub version: Version,
    pub data: Value,
}

/// Owner-scoped list query
///
/// The date range is half-open: `date_from <= date < date_to`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub owner_id: String,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

impl DocumentQuery {
    pub fn owned_by(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            ..Default::default()
        }
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.date_from = Some(from);
        self.date_to = Some(to);
        self
    }

    /// Whether a document with the given index fields matches
    pub fn matches(&self, owner: Option<&str>, date: Option<DateTime<Utc>>) -> bool {
        if owner != Some(self.owner_id.as_str()) {
            return false;
        }
        match (self.date_from, self.date_to, date) {
            (None, None, _) => true,
            (_, _, None) => false,
            (from, to, Some(date)) => {
                from.map(|f| date >= f).unwrap_or(true) && to.map(|t| date < t).unwrap_or(true)
            }
        }
    }
}

/// Persistence operations required by the data layer
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Store a new document and return its assigned id
    async fn create(&self, collection: Collection, data: Value) -> Result<String, StoreError>;

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>, StoreError>;

    /// Documents owned by `query.owner_id`, newest `date` first
    async fn query(
        &self,
        collection: Collection,
        query: &DocumentQuery,
    ) -> Result<Vec<Document>, StoreError>;

    /// Write `data` only if the stored version still equals `expected`
    ///
    /// `expected = None` requires that the document does not exist yet.
    /// A mismatch yields [`StoreError::Conflict`].
    async fn put(
        &self,
        collection: Collection,
        id: &str,
        data: Value,
        expected: Option<Version>,
    ) -> Result<Version, StoreError>;

    /// Replace an existing document
    async fn update(&self, collection: Collection, id: &str, data: Value)
        -> Result<Version, StoreError>;

    /// Deep-merge `patch` into the document, creating it if absent
    async fn merge(&self, collection: Collection, id: &str, patch: Value)
        -> Result<Version, StoreError>;

    /// Remove a document
    ///
    /// With `expected`, the document is removed only if its stored version
    /// still equals it; a mismatch yields [`StoreError::Conflict`].
    async fn delete(
        &self,
        collection: Collection,
        id: &str,
        expected: Option<Version>,
    ) -> Result<(), StoreError>;
}

/// Deep-merge `patch` into `target`
///
/// Objects merge key by key; any other patch value replaces the target.
pub fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

/// Owner id and date a document is indexed by
///
/// User documents are owned by their own id; entries by their `userId` field.
pub(crate) fn index_fields(
    collection: Collection,
    id: &str,
    data: &Value,
) -> (Option<String>, Option<DateTime<Utc>>) {
    let owner = match collection {
        Collection::Users => Some(id.to_string()),
        _ => data.get("userId").and_then(Value::as_str).map(str::to_string),
    };
    let date = data
        .get("date")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc));
    (owner, date)
}
