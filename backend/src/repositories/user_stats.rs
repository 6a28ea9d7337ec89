//! User stats repository
//!
//! Stats live at `users/{userId}`. Reads never fail on a damaged document:
//! they return a [`DecodeOutcome`] so callers can see that defaults were
//! substituted.

use crate::error::StoreError;
use crate::store::{Collection, DocumentStore};
use peak_performance_shared::{decode_user_stats, DecodeOutcome, UserStats};
use serde_json::Value;
use tracing::warn;

const COLLECTION: Collection = Collection::Users;

/// Record a healed decode
pub(crate) fn report_recovered(user_id: &str, outcome: &DecodeOutcome<UserStats>) {
    if let DecodeOutcome::Recovered { cause, .. } = outcome {
        metrics::counter!("stats_decode_recovered_total").increment(1);
        warn!(user_id, cause = %cause, "User stats recovered with defaults");
    }
}

/// User stats repository
pub struct UserStatsRepository;

impl UserStatsRepository {
    /// Read a user's stats; a missing document yields recovered defaults
    pub async fn get(
        store: &dyn DocumentStore,
        user_id: &str,
    ) -> Result<DecodeOutcome<UserStats>, StoreError> {
        Ok(Self::find(store, user_id)
            .await?
            .unwrap_or_else(|| decode_user_stats(user_id, None)))
    }

    /// Read a user's stats, or `None` when no document exists yet
    pub async fn find(
        store: &dyn DocumentStore,
        user_id: &str,
    ) -> Result<Option<DecodeOutcome<UserStats>>, StoreError> {
        let Some(doc) = store.get(COLLECTION, user_id).await? else {
            return Ok(None);
        };
        let outcome = decode_user_stats(user_id, Some(&doc.data));
        report_recovered(user_id, &outcome);
        Ok(Some(outcome))
    }

    /// Create the default stats document unless one already exists
    ///
    /// Returns the stats that are stored afterwards.
    pub async fn create_default(
        store: &dyn DocumentStore,
        user_id: &str,
    ) -> Result<UserStats, StoreError> {
        let stats = UserStats::new(user_id);
        match store
            .put(COLLECTION, user_id, serde_json::to_value(&stats)?, None)
            .await
        {
            Ok(_) => Ok(stats),
            Err(err) if err.is_conflict() => {
                let outcome = Self::get(store, user_id).await?;
                Ok(outcome.into_result().unwrap_or(stats))
            }
            Err(err) => Err(err),
        }
    }

    /// Merge `patch` into the stats document
    pub async fn merge(
        store: &dyn DocumentStore,
        user_id: &str,
        patch: Value,
    ) -> Result<(), StoreError> {
        store.merge(COLLECTION, user_id, patch).await?;
        Ok(())
    }
}
