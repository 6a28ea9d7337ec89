//! Stats service - keeps each user's cumulative counters in step with their entries
//!
//! Every counter change goes through an optimistic transaction on
//! `users/{userId}`, so concurrent mutators never lose an update.
//!
//! The entry write is the commit point of an add, edit or delete. If the
//! stats transaction that follows it fails, the operation still succeeds:
//! the delta is parked in [`PendingDeltas`] and folded into the next stats
//! write for that user, or applied by [`StatsService::flush_pending`] before
//! the next stats read. Parked deltas live in process memory only.

use crate::error::{ServiceError, ServiceResult};
use crate::repositories::user_stats::report_recovered;
use crate::repositories::UserStatsRepository;
use crate::state::AppState;
use crate::store::Collection;
use peak_performance_shared::validation::{validate_activity_update, validate_profile_update};
use peak_performance_shared::{
    decode_user_stats, ActivityUpdate, FoodEntry, GoalUpdate, ProfileUpdate, UserStats, Workout,
};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{error, info, warn};

/// Signed change to the cumulative counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatDelta {
    pub calories_burned: i32,
    pub active_minutes: i32,
    pub calories_consumed: i32,
}

impl StatDelta {
    pub fn workout_added(workout: &Workout) -> Self {
        Self {
            calories_burned: workout.calories,
            active_minutes: workout.duration,
            calories_consumed: 0,
        }
    }

    pub fn workout_removed(workout: &Workout) -> Self {
        Self::workout_added(workout).negated()
    }

    pub fn workout_changed(old: &Workout, new: &Workout) -> Self {
        Self {
            calories_burned: new.calories.saturating_sub(old.calories),
            active_minutes: new.duration.saturating_sub(old.duration),
            calories_consumed: 0,
        }
    }

    pub fn food_added(entry: &FoodEntry) -> Self {
        Self {
            calories_consumed: entry.calories,
            ..Default::default()
        }
    }

    pub fn food_removed(entry: &FoodEntry) -> Self {
        Self::food_added(entry).negated()
    }

    pub fn food_changed(old: &FoodEntry, new: &FoodEntry) -> Self {
        Self {
            calories_consumed: new.calories.saturating_sub(old.calories),
            ..Default::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Sum of two deltas
    pub fn combined(self, other: Self) -> Self {
        Self {
            calories_burned: self.calories_burned.saturating_add(other.calories_burned),
            active_minutes: self.active_minutes.saturating_add(other.active_minutes),
            calories_consumed: self.calories_consumed.saturating_add(other.calories_consumed),
        }
    }

    fn negated(self) -> Self {
        Self {
            calories_burned: self.calories_burned.saturating_neg(),
            active_minutes: self.active_minutes.saturating_neg(),
            calories_consumed: self.calories_consumed.saturating_neg(),
        }
    }

    /// Apply to `stats`, clamping every counter at zero
    pub fn apply(&self, mut stats: UserStats) -> UserStats {
        stats.calories_burned = stats
            .calories_burned
            .saturating_add(self.calories_burned)
            .max(0);
        stats.active_minutes = stats
            .active_minutes
            .saturating_add(self.active_minutes)
            .max(0);
        stats.calories_consumed = Some(
            stats
                .calories_consumed()
                .saturating_add(self.calories_consumed)
                .max(0),
        );
        stats
    }
}

/// Per-user deltas whose stats transaction failed after the entry was written
#[derive(Clone, Default)]
pub struct PendingDeltas {
    inner: Arc<Mutex<HashMap<String, StatDelta>>>,
}

impl PendingDeltas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `delta` for `user_id`, adding it to anything already parked
    pub fn defer(&self, user_id: &str, delta: StatDelta) {
        if delta.is_zero() {
            return;
        }
        let mut pending = self.lock();
        let parked = pending.entry(user_id.to_string()).or_default();
        *parked = parked.combined(delta);
    }

    /// Remove and return the parked delta for `user_id`
    pub fn take(&self, user_id: &str) -> StatDelta {
        self.lock().remove(user_id).unwrap_or_default()
    }

    pub fn peek(&self, user_id: &str) -> StatDelta {
        self.lock().get(user_id).copied().unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StatDelta>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Stats service
pub struct StatsService;

impl StatsService {
    /// Apply `delta` to the user's stats in a transaction
    pub async fn apply_delta(
        state: &AppState,
        user_id: &str,
        delta: StatDelta,
    ) -> ServiceResult<UserStats> {
        let result = state
            .transactions
            .run(Collection::Users, user_id, |doc| {
                let outcome = decode_user_stats(user_id, doc.map(|d| &d.data));
                if doc.is_some() {
                    report_recovered(user_id, &outcome);
                }
                let current = outcome
                    .into_result()
                    .unwrap_or_else(|_| UserStats::new(user_id));
                let updated = delta.apply(current);

                let patch = match doc {
                    // A fresh document gets every field
                    None => serde_json::to_value(&updated)
                        .map_err(|e| ServiceError::Internal(e.into()))?,
                    Some(_) => json!({
                        "userId": user_id,
                        "caloriesBurned": updated.calories_burned,
                        "activeMinutes": updated.active_minutes,
                        "caloriesConsumed": updated.calories_consumed(),
                    }),
                };
                Ok((patch, updated))
            })
            .await;

        if let Err(err) = &result {
            error!(user_id, error = %err, ?delta, "Failed to update user stats");
        }
        result
    }

    /// Apply the stats side of an entry write that has already committed
    ///
    /// Anything parked for the user rides along. On failure the combined
    /// delta is parked again and `None` is returned; the caller's write
    /// stands either way.
    pub async fn settle_delta(
        state: &AppState,
        user_id: &str,
        delta: StatDelta,
    ) -> Option<UserStats> {
        let delta = delta.combined(state.pending_deltas.take(user_id));
        if delta.is_zero() {
            return None;
        }

        match Self::apply_delta(state, user_id, delta).await {
            Ok(stats) => Some(stats),
            Err(err) => {
                state.pending_deltas.defer(user_id, delta);
                metrics::counter!("stats_deltas_deferred_total").increment(1);
                warn!(user_id, error = %err, ?delta, "Stats update deferred");
                None
            }
        }
    }

    /// Apply whatever is parked for the user
    pub async fn flush_pending(state: &AppState, user_id: &str) -> ServiceResult<()> {
        let delta = state.pending_deltas.take(user_id);
        if delta.is_zero() {
            return Ok(());
        }

        match Self::apply_delta(state, user_id, delta).await {
            Ok(_) => {
                info!(user_id, ?delta, "Applied deferred stats update");
                Ok(())
            }
            Err(err) => {
                state.pending_deltas.defer(user_id, delta);
                Err(err)
            }
        }
    }

    /// Read the user's stats, creating the default document on first use
    pub async fn fetch_or_create(state: &AppState, user_id: &str) -> ServiceResult<UserStats> {
        match UserStatsRepository::find(state.store(), user_id).await? {
            Some(outcome) => outcome.into_result().map_err(|e| {
                ServiceError::Internal(anyhow::anyhow!("user stats undecodable: {}", e))
            }),
            None => {
                info!(user_id, "Creating default user stats");
                Ok(UserStatsRepository::create_default(state.store(), user_id).await?)
            }
        }
    }

    /// Make sure stats exist and greet the user
    pub async fn sign_in(
        state: &AppState,
        user_id: &str,
        display_name: &str,
    ) -> ServiceResult<UserStats> {
        let stats = Self::fetch_or_create(state, user_id).await?;
        state.notifications.login_success(display_name).await;
        Ok(stats)
    }

    /// Overwrite the manually tracked activity values that are present
    pub async fn update_activity(
        state: &AppState,
        user_id: &str,
        update: &ActivityUpdate,
    ) -> ServiceResult<UserStats> {
        validate_activity_update(update)?;

        let mut patch =
            serde_json::to_value(update).map_err(|e| ServiceError::Internal(e.into()))?;
        if let Value::Object(fields) = &mut patch {
            fields.insert("userId".to_string(), Value::String(user_id.to_string()));
        }

        UserStatsRepository::merge(state.store(), user_id, patch)
            .await
            .map_err(|err| {
                error!(user_id, error = %err, "Failed to update activity");
                ServiceError::from(err)
            })?;

        let stats = Self::fetch_or_create(state, user_id).await?;
        state.notifications.stats_updated().await;
        Ok(stats)
    }

    /// Merge bio, photo URL and goal changes into the stats document
    pub async fn update_profile(
        state: &AppState,
        user_id: &str,
        update: &ProfileUpdate,
    ) -> ServiceResult<UserStats> {
        validate_profile_update(update)?;

        let stats = state
            .transactions
            .run(Collection::Users, user_id, |doc| {
                let current = decode_user_stats(user_id, doc.map(|d| &d.data))
                    .into_result()
                    .unwrap_or_else(|_| UserStats::new(user_id));

                let mut updated = current.with_updated_goals(&update.goals);
                if let Some(bio) = &update.bio {
                    updated.bio = Some(bio.clone());
                }
                if let Some(url) = &update.photo_url {
                    updated.photo_url = Some(url.clone());
                }

                let patch = match doc {
                    None => serde_json::to_value(&updated)
                        .map_err(|e| ServiceError::Internal(e.into()))?,
                    Some(_) => profile_patch(user_id, &updated, update)?,
                };
                Ok((patch, updated))
            })
            .await
            .map_err(|err| {
                error!(user_id, error = %err, "Failed to update profile");
                err
            })?;

        if update.goals != GoalUpdate::default() {
            state.notifications.goals_updated().await;
        }
        if update.bio.is_some() || update.photo_url.is_some() {
            state.notifications.profile_updated().await;
        }
        Ok(stats)
    }
}

fn profile_patch(
    user_id: &str,
    updated: &UserStats,
    update: &ProfileUpdate,
) -> ServiceResult<Value> {
    let mut patch = Map::new();
    patch.insert("userId".to_string(), Value::String(user_id.to_string()));
    if update.goals != GoalUpdate::default() {
        let goal = serde_json::to_value(&updated.daily_goal)
            .map_err(|e| ServiceError::Internal(e.into()))?;
        patch.insert("dailyGoal".to_string(), goal);
    }
    if let Some(bio) = &updated.bio {
        patch.insert("bio".to_string(), Value::String(bio.clone()));
    }
    if let Some(url) = &updated.photo_url {
        patch.insert("photoURL".to_string(), Value::String(url.clone()));
    }
    Ok(Value::Object(patch))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use peak_performance_shared::MealType;

    fn workout(calories: i32, duration: i32) -> Workout {
        Workout::new("u1", "Row", Utc::now(), duration, calories)
    }

    fn food(calories: i32) -> FoodEntry {
        FoodEntry::new(
            "u1",
            "Bagel",
            calories,
            9.0,
            48.0,
            1.5,
            Utc::now(),
            MealType::Breakfast,
            1.0,
            "piece",
        )
    }

    #[test]
    fn test_workout_deltas() {
        assert_eq!(
            StatDelta::workout_added(&workout(300, 40)),
            StatDelta {
                calories_burned: 300,
                active_minutes: 40,
                calories_consumed: 0
            }
        );
        assert_eq!(
            StatDelta::workout_changed(&workout(300, 40), &workout(250, 50)),
            StatDelta {
                calories_burned: -50,
                active_minutes: 10,
                calories_consumed: 0
            }
        );
        assert_eq!(StatDelta::workout_removed(&workout(300, 40)).calories_burned, -300);
    }

    #[test]
    fn test_food_deltas() {
        assert_eq!(StatDelta::food_added(&food(245)).calories_consumed, 245);
        assert_eq!(StatDelta::food_removed(&food(245)).calories_consumed, -245);
        assert!(StatDelta::food_changed(&food(245), &food(245)).is_zero());
    }

    #[test]
    fn test_apply_clamps_at_zero() {
        let mut stats = UserStats::new("u1");
        stats.calories_burned = 100;
        stats.calories_consumed = Some(50);

        let updated = StatDelta {
            calories_burned: -300,
            active_minutes: -5,
            calories_consumed: -80,
        }
        .apply(stats);

        assert_eq!(updated.calories_burned, 0);
        assert_eq!(updated.active_minutes, 0);
        assert_eq!(updated.calories_consumed, Some(0));
    }

    #[test]
    fn test_pending_deltas_accumulate_per_user() {
        let pending = PendingDeltas::new();
        pending.defer("u1", StatDelta::food_added(&food(300)));
        pending.defer("u1", StatDelta::food_removed(&food(120)));
        pending.defer("u2", StatDelta::workout_added(&workout(200, 30)));
        pending.defer("u2", StatDelta::default());

        assert_eq!(pending.peek("u1").calories_consumed, 180);
        assert_eq!(pending.take("u2").active_minutes, 30);
        assert!(pending.take("u2").is_zero());
        assert_eq!(pending.take("u1").calories_consumed, 180);
        assert!(pending.peek("u1").is_zero());
    }

    #[test]
    fn test_profile_patch_only_touches_requested_fields() {
        let update = ProfileUpdate {
            bio: Some("Trail runner".to_string()),
            ..Default::default()
        };
        let updated = UserStats {
            bio: Some("Trail runner".to_string()),
            ..UserStats::new("u1")
        };
        let patch = profile_patch("u1", &updated, &update).unwrap();
        assert_eq!(patch, json!({ "userId": "u1", "bio": "Trail runner" }));
    }
}
