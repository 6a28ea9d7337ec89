//! Food entry repository

use super::{day_bounds, decode_document, decode_documents};
use crate::error::{ServiceResult, StoreError};
use crate::store::{Collection, DocumentQuery, DocumentStore, TransactionRunner};
use chrono::{FixedOffset, NaiveDate};
use peak_performance_shared::FoodEntry;

const COLLECTION: Collection = Collection::FoodEntries;

/// Food entry repository
pub struct FoodEntryRepository;

impl FoodEntryRepository {
    /// Store a new entry and return it with its assigned id
    pub async fn create(
        store: &dyn DocumentStore,
        entry: &FoodEntry,
    ) -> Result<FoodEntry, StoreError> {
        let entry = entry.clone().normalized();
        let id = store.create(COLLECTION, serde_json::to_value(&entry)?).await?;
        Ok(entry.with_id(id))
    }

    pub async fn get(store: &dyn DocumentStore, id: &str) -> Result<Option<FoodEntry>, StoreError> {
        match store.get(COLLECTION, id).await? {
            Some(doc) => {
                let entry: FoodEntry = decode_document(COLLECTION, &doc)?;
                Ok(Some(entry.with_id(doc.id)))
            }
            None => Ok(None),
        }
    }

    /// Entries logged on the local calendar `day`, newest first
    pub async fn list_for_day(
        store: &dyn DocumentStore,
        user_id: &str,
        day: NaiveDate,
        offset: FixedOffset,
    ) -> Result<Vec<FoodEntry>, StoreError> {
        let (start, end) = day_bounds(day, offset);
        let query = DocumentQuery::owned_by(user_id).between(start, end);
        let docs = store.query(COLLECTION, &query).await?;
        Ok(decode_documents(COLLECTION, docs, |entry: FoodEntry, id| entry.with_id(id)))
    }

    /// All entries of a user, newest first
    pub async fn list_for_user(
        store: &dyn DocumentStore,
        user_id: &str,
    ) -> Result<Vec<FoodEntry>, StoreError> {
        let docs = store.query(COLLECTION, &DocumentQuery::owned_by(user_id)).await?;
        Ok(decode_documents(COLLECTION, docs, |entry: FoodEntry, id| entry.with_id(id)))
    }

    /// Replace an entry, returning the version it replaced
    ///
    /// The write only lands on the version that was read, so the returned
    /// entry is exactly what the new one overwrote, even with concurrent edits.
    pub async fn update(
        transactions: &TransactionRunner,
        entry: &FoodEntry,
    ) -> ServiceResult<FoodEntry> {
        let id = entry
            .id
            .as_deref()
            .ok_or_else(|| StoreError::not_found(COLLECTION, "<unsaved>"))?;
        let data = serde_json::to_value(entry.clone().normalized()).map_err(StoreError::from)?;

        transactions
            .replace(COLLECTION, id, |doc| {
                let previous: FoodEntry = decode_document(COLLECTION, doc)?;
                Ok((data.clone(), previous.with_id(doc.id.clone())))
            })
            .await
    }

    /// Delete an entry, returning the version that was deleted
    pub async fn delete(transactions: &TransactionRunner, id: &str) -> ServiceResult<FoodEntry> {
        transactions
            .remove(COLLECTION, id, |doc| {
                let previous: FoodEntry = decode_document(COLLECTION, doc)?;
                Ok(previous.with_id(doc.id.clone()))
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::repositories::offset_from_minutes;
    use crate::store::MemoryStore;
    use chrono::{TimeZone, Utc};
    use peak_performance_shared::MealType;
    use serde_json::json;
    use std::sync::Arc;

    fn runner(store: &MemoryStore) -> TransactionRunner {
        TransactionRunner::new(Arc::new(store.clone()), &StoreConfig::default())
    }

    fn entry(name: &str, calories: i32, hour: u32) -> FoodEntry {
        FoodEntry::new(
            "u1",
            name,
            calories,
            10.0,
            10.0,
            5.0,
            Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap(),
            MealType::Lunch,
            1.0,
            "",
        )
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_normalizes() {
        let store = MemoryStore::new();
        let mut input = entry("Rice", 200, 12);
        input.serving_size = 0.0;

        let created = FoodEntryRepository::create(&store, &input).await.unwrap();
        let id = created.id.clone().unwrap();
        assert_eq!(created.serving_size, 0.1);

        let stored = FoodEntryRepository::get(&store, &id).await.unwrap().unwrap();
        assert_eq!(stored, created);
        assert_eq!(stored.serving_unit, "g");
    }

    #[tokio::test]
    async fn test_list_for_day_respects_bounds() {
        let store = MemoryStore::new();
        for (name, hour) in [("Eggs", 7), ("Salad", 13)] {
            FoodEntryRepository::create(&store, &entry(name, 100, hour)).await.unwrap();
        }
        let mut late = entry("Pizza", 800, 0);
        late.date = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        FoodEntryRepository::create(&store, &late).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let entries = FoodEntryRepository::list_for_day(&store, "u1", day, offset_from_minutes(0))
            .await
            .unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Salad", "Eggs"]);
    }

    #[tokio::test]
    async fn test_list_skips_undecodable_documents() {
        let store = MemoryStore::new();
        FoodEntryRepository::create(&store, &entry("Toast", 120, 8)).await.unwrap();
        store.insert_raw(
            Collection::FoodEntries,
            "broken",
            json!({ "userId": "u1", "date": "2024-03-01T09:00:00Z", "name": 42 }),
        );

        let entries = FoodEntryRepository::list_for_user(&store, "u1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Toast");
    }

    #[tokio::test]
    async fn test_get_surfaces_malformed_document() {
        let store = MemoryStore::new();
        store.insert_raw(Collection::FoodEntries, "broken", json!({ "userId": "u1" }));
        let err = FoodEntryRepository::get(&store, "broken").await.unwrap_err();
        assert_eq!(err.code(), "SERIALIZATION_ERROR");
    }

    #[tokio::test]
    async fn test_update_returns_previous() {
        let store = MemoryStore::new();
        let created = FoodEntryRepository::create(&store, &entry("Soup", 150, 12)).await.unwrap();

        let mut edited = created.clone();
        edited.calories = 250;
        let previous = FoodEntryRepository::update(&runner(&store), &edited).await.unwrap();
        assert_eq!(previous.calories, 150);
        assert_eq!(previous.id, created.id);

        let stored = FoodEntryRepository::get(&store, created.id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.calories, 250);
    }

    #[tokio::test]
    async fn test_update_returns_version_it_replaced() {
        let store = MemoryStore::new();
        let created = FoodEntryRepository::create(&store, &entry("Soup", 150, 12)).await.unwrap();
        let id = created.id.clone().unwrap();

        // Another writer lands first; the update must report its version
        let mut other = created.clone();
        other.calories = 400;
        store.insert_raw(Collection::FoodEntries, &id, serde_json::to_value(&other).unwrap());

        let mut edited = created.clone();
        edited.calories = 250;
        let previous = FoodEntryRepository::update(&runner(&store), &edited).await.unwrap();
        assert_eq!(previous.calories, 400);
    }

    #[tokio::test]
    async fn test_update_unsaved_entry() {
        let store = MemoryStore::new();
        let err = FoodEntryRepository::update(&runner(&store), &entry("Soup", 150, 12))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_returns_removed_entry() {
        let store = MemoryStore::new();
        let created = FoodEntryRepository::create(&store, &entry("Soup", 150, 12)).await.unwrap();
        let id = created.id.clone().unwrap();

        let removed = FoodEntryRepository::delete(&runner(&store), &id).await.unwrap();
        assert_eq!(removed, created);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_entry() {
        let store = MemoryStore::new();
        let err = FoodEntryRepository::delete(&runner(&store), "missing").await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
