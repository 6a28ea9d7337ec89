//! Workout service
//!
//! Workout writes move `caloriesBurned` and `activeMinutes` in the user's
//! stats by the workout's contribution. As with food entries, the stats
//! side is settled after the workout write and deferred when it fails.

use crate::error::{ServiceError, ServiceResult};
use crate::repositories::WorkoutRepository;
use crate::services::stats::{StatDelta, StatsService};
use crate::state::AppState;
use peak_performance_shared::validation::{
    validate_calories, validate_duration_minutes, validate_new_workout,
};
use peak_performance_shared::{NewWorkout, ValidationError, Workout};
use tracing::error;

/// Workout service
pub struct WorkoutService;

impl WorkoutService {
    /// Store a workout and add its calories and minutes to the user's stats
    pub async fn add_workout(
        state: &AppState,
        user_id: &str,
        request: NewWorkout,
    ) -> ServiceResult<Workout> {
        validate_new_workout(&request)?;
        let workout = request.into_workout(user_id);

        let created = WorkoutRepository::create(state.store(), &workout)
            .await
            .map_err(|err| {
                error!(user_id, error = %err, "Failed to add workout");
                ServiceError::from(err)
            })?;

        StatsService::settle_delta(state, user_id, StatDelta::workout_added(&created)).await;
        state.notifications.workout_added(&created).await;
        Ok(created)
    }

    /// Replace a workout and apply the calorie and duration differences
    pub async fn update_workout(
        state: &AppState,
        user_id: &str,
        workout: Workout,
    ) -> ServiceResult<Workout> {
        let workout_id = workout
            .id
            .clone()
            .ok_or_else(|| ValidationError::field("id", "Workout has not been saved yet"))?;
        if workout.name.trim().is_empty() {
            return Err(ValidationError::field("name", "Workout name cannot be blank").into());
        }
        validate_duration_minutes(workout.duration)?;
        validate_calories(workout.calories)?;
        Self::owned_workout(state, user_id, &workout_id).await?;

        let workout = Workout {
            user_id: user_id.to_string(),
            ..workout
        };
        let (previous, updated) = WorkoutRepository::update(&state.transactions, &workout)
            .await
            .map_err(|err| {
                error!(user_id, entry_id = %workout_id, error = %err, "Failed to update workout");
                err
            })?;

        let delta = StatDelta::workout_changed(&previous, &updated);
        StatsService::settle_delta(state, user_id, delta).await;
        state.notifications.workout_updated(&updated).await;
        Ok(updated)
    }

    /// Delete a workout and subtract its contribution
    pub async fn delete_workout(
        state: &AppState,
        user_id: &str,
        workout_id: &str,
    ) -> ServiceResult<Workout> {
        Self::owned_workout(state, user_id, workout_id).await?;

        let deleted = WorkoutRepository::delete(&state.transactions, workout_id)
            .await
            .map_err(|err| {
                error!(user_id, entry_id = workout_id, error = %err, "Failed to delete workout");
                err
            })?;

        let delta = StatDelta::workout_removed(&deleted);
        StatsService::settle_delta(state, user_id, delta).await;
        state.notifications.workout_deleted().await;
        Ok(deleted)
    }

    /// All of the user's workouts, newest first
    pub async fn list_workouts(state: &AppState, user_id: &str) -> ServiceResult<Vec<Workout>> {
        WorkoutRepository::list_for_user(state.store(), user_id)
            .await
            .map_err(|err| {
                error!(user_id, error = %err, "Failed to fetch workouts");
                ServiceError::from(err)
            })
    }

    async fn owned_workout(
        state: &AppState,
        user_id: &str,
        workout_id: &str,
    ) -> ServiceResult<Workout> {
        match WorkoutRepository::get(state.store(), workout_id).await? {
            Some(workout) if workout.user_id == user_id => Ok(workout),
            _ => Err(ServiceError::NotFound(format!("Workout {}", workout_id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::notifications::RecordingNotifier;
    use crate::store::{Collection, MemoryStore, StoreOp};
    use std::sync::Arc;

    fn setup() -> (AppState, MemoryStore, Arc<RecordingNotifier>) {
        let store = MemoryStore::new();
        let notifier = Arc::new(RecordingNotifier::new());
        let state = AppState::new(Arc::new(store.clone()), notifier.clone(), AppConfig::default());
        (state, store, notifier)
    }

    fn request(name: &str, duration: i32, calories: i32) -> NewWorkout {
        NewWorkout {
            name: name.to_string(),
            date: None,
            duration,
            calories,
            exercises: None,
            notes: None,
            is_completed: true,
        }
    }

    #[tokio::test]
    async fn test_add_workout_updates_stats() {
        let (state, _, notifier) = setup();
        WorkoutService::add_workout(&state, "u1", request("Run", 30, 300)).await.unwrap();

        let stats = StatsService::fetch_or_create(&state, "u1").await.unwrap();
        assert_eq!(stats.calories_burned, 300);
        assert_eq!(stats.active_minutes, 30);
        assert_eq!(notifier.sent_titles(), vec!["Workout Added"]);
    }

    #[tokio::test]
    async fn test_edit_and_delete_workout() {
        let (state, _, _) = setup();
        let workout = WorkoutService::add_workout(&state, "u1", request("Ride", 60, 500))
            .await
            .unwrap();
        let created_at = workout.created_at;

        let edited = Workout {
            duration: 45,
            calories: 420,
            ..workout
        };
        let updated = WorkoutService::update_workout(&state, "u1", edited).await.unwrap();
        assert_eq!(updated.created_at, created_at);

        let stats = StatsService::fetch_or_create(&state, "u1").await.unwrap();
        assert_eq!((stats.calories_burned, stats.active_minutes), (420, 45));

        WorkoutService::delete_workout(&state, "u1", updated.id.as_deref().unwrap())
            .await
            .unwrap();
        let stats = StatsService::fetch_or_create(&state, "u1").await.unwrap();
        assert_eq!((stats.calories_burned, stats.active_minutes), (0, 0));
        assert!(WorkoutService::list_workouts(&state, "u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_store_write_leaves_stats_alone() {
        let (state, store, notifier) = setup();
        StatsService::fetch_or_create(&state, "u1").await.unwrap();
        store.fail_next(StoreOp::Create, 1);

        let err = WorkoutService::add_workout(&state, "u1", request("Swim", 40, 350))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "STORE_UNAVAILABLE");

        let stats = StatsService::fetch_or_create(&state, "u1").await.unwrap();
        assert_eq!(stats.calories_burned, 0);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_add_survives_stats_failure() {
        let (state, store, notifier) = setup();
        StatsService::fetch_or_create(&state, "u1").await.unwrap();
        store.fail_next_in(Collection::Users, StoreOp::Put, 1);

        WorkoutService::add_workout(&state, "u1", request("Swim", 40, 350))
            .await
            .unwrap();
        assert_eq!(notifier.sent_titles(), vec!["Workout Added"]);
        assert_eq!(state.pending_deltas.peek("u1").active_minutes, 40);

        StatsService::flush_pending(&state, "u1").await.unwrap();
        let stats = StatsService::fetch_or_create(&state, "u1").await.unwrap();
        assert_eq!((stats.calories_burned, stats.active_minutes), (350, 40));
    }

    #[tokio::test]
    async fn test_update_and_delete_survive_stats_failure() {
        let (state, store, _) = setup();
        let workout = WorkoutService::add_workout(&state, "u1", request("Ride", 60, 500))
            .await
            .unwrap();
        let id = workout.id.clone().unwrap();

        store.fail_next_in(Collection::Users, StoreOp::Put, 1);
        let edited = Workout {
            duration: 45,
            calories: 420,
            ..workout
        };
        WorkoutService::update_workout(&state, "u1", edited).await.unwrap();

        store.fail_next_in(Collection::Users, StoreOp::Put, 1);
        WorkoutService::delete_workout(&state, "u1", &id).await.unwrap();
        assert!(WorkoutService::list_workouts(&state, "u1").await.unwrap().is_empty());
        assert_eq!(state.pending_deltas.peek("u1").calories_burned, -500);

        StatsService::flush_pending(&state, "u1").await.unwrap();
        let stats = StatsService::fetch_or_create(&state, "u1").await.unwrap();
        assert_eq!((stats.calories_burned, stats.active_minutes), (0, 0));
    }

    #[tokio::test]
    async fn test_flush_keeps_delta_when_stats_still_failing() {
        let (state, store, _) = setup();
        StatsService::fetch_or_create(&state, "u1").await.unwrap();
        store.fail_next_in(Collection::Users, StoreOp::Put, 2);

        WorkoutService::add_workout(&state, "u1", request("Row", 25, 210))
            .await
            .unwrap();
        assert!(StatsService::flush_pending(&state, "u1").await.is_err());
        assert_eq!(state.pending_deltas.peek("u1").calories_burned, 210);

        StatsService::flush_pending(&state, "u1").await.unwrap();
        let stats = StatsService::fetch_or_create(&state, "u1").await.unwrap();
        assert_eq!(stats.calories_burned, 210);
    }

    #[tokio::test]
    async fn test_notification_failure_does_not_fail_workout() {
        let (state, _, notifier) = setup();
        notifier.set_failing(true);
        let workout = WorkoutService::add_workout(&state, "u1", request("Yoga", 20, 80)).await;
        assert!(workout.is_ok());
    }

    #[tokio::test]
    async fn test_update_requires_saved_workout() {
        let (state, _, _) = setup();
        let unsaved = request("Lift", 50, 200).into_workout("u1");
        let err = WorkoutService::update_workout(&state, "u1", unsaved).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
