//! Nutrition service - business logic for food tracking
//!
//! Entry writes are followed by a stats transaction that moves
//! `caloriesConsumed` by the calorie difference. A failed stats transaction
//! does not fail the entry write; see [`StatsService::settle_delta`].

use crate::error::{ServiceError, ServiceResult};
use crate::repositories::{local_day, FoodEntryRepository, UserStatsRepository};
use crate::services::stats::{StatDelta, StatsService};
use crate::state::AppState;
use chrono::{NaiveDate, Utc};
use peak_performance_shared::validation::validate_new_food_entry;
use peak_performance_shared::{FoodEntry, NewFoodEntry, NutritionSummary, ValidationError};
use tracing::{error, warn};

/// Nutrition service
pub struct NutritionService;

impl NutritionService {
    /// The user's current calendar day
    pub fn today(state: &AppState) -> NaiveDate {
        local_day(Utc::now(), state.utc_offset())
    }

    /// Log a food entry and add its calories to the user's stats
    pub async fn add_entry(
        state: &AppState,
        user_id: &str,
        request: NewFoodEntry,
    ) -> ServiceResult<FoodEntry> {
        validate_new_food_entry(&request)?;
        let entry = request.into_entry(user_id);

        let created = FoodEntryRepository::create(state.store(), &entry)
            .await
            .map_err(|err| {
                error!(user_id, error = %err, "Failed to add food entry");
                ServiceError::from(err)
            })?;

        StatsService::settle_delta(state, user_id, StatDelta::food_added(&created)).await;
        state.notifications.food_entry_added(&created).await;
        Ok(created)
    }

    /// Replace a stored entry and apply the calorie difference
    pub async fn update_entry(
        state: &AppState,
        user_id: &str,
        entry: FoodEntry,
    ) -> ServiceResult<FoodEntry> {
        let entry_id = entry
            .id
            .clone()
            .ok_or_else(|| ValidationError::field("id", "Entry has not been saved yet"))?;
        Self::owned_entry(state, user_id, &entry_id).await?;

        let entry = FoodEntry {
            user_id: user_id.to_string(),
            ..entry
        }
        .normalized();

        let previous = FoodEntryRepository::update(&state.transactions, &entry)
            .await
            .map_err(|err| {
                error!(user_id, entry_id = %entry_id, error = %err, "Failed to update food entry");
                err
            })?;

        let delta = StatDelta::food_changed(&previous, &entry);
        StatsService::settle_delta(state, user_id, delta).await;
        state.notifications.food_entry_updated(&entry).await;
        Ok(entry)
    }

    /// Delete an entry and subtract its calories
    pub async fn delete_entry(
        state: &AppState,
        user_id: &str,
        entry_id: &str,
    ) -> ServiceResult<FoodEntry> {
        Self::owned_entry(state, user_id, entry_id).await?;

        let deleted = FoodEntryRepository::delete(&state.transactions, entry_id)
            .await
            .map_err(|err| {
                error!(user_id, entry_id, error = %err, "Failed to delete food entry");
                err
            })?;

        StatsService::settle_delta(state, user_id, StatDelta::food_removed(&deleted)).await;
        state.notifications.food_entry_deleted().await;
        Ok(deleted)
    }

    /// Entries for one local calendar day, newest first
    pub async fn entries_for_day(
        state: &AppState,
        user_id: &str,
        day: NaiveDate,
    ) -> ServiceResult<Vec<FoodEntry>> {
        FoodEntryRepository::list_for_day(state.store(), user_id, day, state.utc_offset())
            .await
            .map_err(|err| {
                error!(user_id, %day, error = %err, "Failed to fetch food entries");
                ServiceError::from(err)
            })
    }

    /// Summary of one day's entries against the user's intake goal
    pub async fn daily_summary(
        state: &AppState,
        user_id: &str,
        day: NaiveDate,
    ) -> ServiceResult<NutritionSummary> {
        let entries = Self::entries_for_day(state, user_id, day).await?;
        let goal = Self::calorie_goal(state, user_id).await;
        Ok(NutritionSummary::from_entries(&entries, goal))
    }

    /// The user's intake goal, or the configured fallback when stats cannot be read
    pub async fn calorie_goal(state: &AppState, user_id: &str) -> i32 {
        match UserStatsRepository::get(state.store(), user_id).await {
            Ok(outcome) => outcome
                .into_result()
                .map(|stats| stats.daily_goal.calories_intake)
                .unwrap_or(state.config.nutrition.fallback_calorie_goal),
            Err(err) => {
                warn!(user_id, error = %err, "Using fallback calorie goal");
                state.config.nutrition.fallback_calorie_goal
            }
        }
    }

    async fn owned_entry(
        state: &AppState,
        user_id: &str,
        entry_id: &str,
    ) -> ServiceResult<FoodEntry> {
        match FoodEntryRepository::get(state.store(), entry_id).await? {
            Some(entry) if entry.user_id == user_id => Ok(entry),
            _ => Err(ServiceError::NotFound(format!("Food entry {}", entry_id))),
        }
    }
}
