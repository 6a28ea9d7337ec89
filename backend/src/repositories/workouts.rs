//! Workout repository

use super::{decode_document, decode_documents};
use crate::error::{ServiceResult, StoreError};
use crate::store::{Collection, DocumentQuery, DocumentStore, TransactionRunner};
use chrono::Utc;
use peak_performance_shared::Workout;

const COLLECTION: Collection = Collection::Workouts;

/// Workout repository
pub struct WorkoutRepository;

impl WorkoutRepository {
    /// Store a new workout, stamping `created_at`
    pub async fn create(
        store: &dyn DocumentStore,
        workout: &Workout,
    ) -> Result<Workout, StoreError> {
        let mut workout = workout.clone();
        workout.id = None;
        workout.created_at = Some(Utc::now());

        let id = store.create(COLLECTION, serde_json::to_value(&workout)?).await?;
        Ok(workout.with_id(id))
    }

    pub async fn get(store: &dyn DocumentStore, id: &str) -> Result<Option<Workout>, StoreError> {
        match store.get(COLLECTION, id).await? {
            Some(doc) => {
                let workout: Workout = decode_document(COLLECTION, &doc)?;
                Ok(Some(workout.with_id(doc.id)))
            }
            None => Ok(None),
        }
    }

    /// All workouts of a user, newest first
    pub async fn list_for_user(
        store: &dyn DocumentStore,
        user_id: &str,
    ) -> Result<Vec<Workout>, StoreError> {
        let docs = store.query(COLLECTION, &DocumentQuery::owned_by(user_id)).await?;
        Ok(decode_documents(COLLECTION, docs, |workout: Workout, id| workout.with_id(id)))
    }

    /// Replace a workout
    ///
    /// `created_at` is carried over from the stored version. Returns the
    /// version that was replaced and the stored workout.
    pub async fn update(
        transactions: &TransactionRunner,
        workout: &Workout,
    ) -> ServiceResult<(Workout, Workout)> {
        let id = workout
            .id
            .as_deref()
            .ok_or_else(|| StoreError::not_found(COLLECTION, "<unsaved>"))?;

        transactions
            .replace(COLLECTION, id, |doc| {
                let previous: Workout = decode_document(COLLECTION, doc)?;
                let mut updated = workout.clone();
                updated.created_at = previous.created_at.or(workout.created_at);
                let data = serde_json::to_value(&updated).map_err(StoreError::from)?;
                Ok((data, (previous.with_id(doc.id.clone()), updated)))
            })
            .await
    }

    /// Delete a workout, returning the version that was deleted
    pub async fn delete(transactions: &TransactionRunner, id: &str) -> ServiceResult<Workout> {
        transactions
            .remove(COLLECTION, id, |doc| {
                let previous: Workout = decode_document(COLLECTION, doc)?;
                Ok(previous.with_id(doc.id.clone()))
            })
            .await
    }
}
