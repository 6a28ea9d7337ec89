//! Local cache / view model
//!
//! Mirrors the last successful fetch of a user's stats, workouts and food
//! entries, and publishes a fresh [`Snapshot`] through a `watch` channel on
//! every change. The nutrition summary is re-derived from the mirrored
//! entries whenever they or the intake goal change.
//!
//! Each mirrored collection has a generation counter. A fetch records the
//! generation it started under and its response is dropped if a newer fetch
//! (or an optimistic delete) began in the meantime.

pub mod optimistic;

use crate::error::{ServiceError, ServiceResult};
use crate::services::{NutritionService, StatsService, WorkoutService};
use crate::state::AppState;
use chrono::NaiveDate;
use optimistic::{apply_optimistically, reinsert, remove_where};
use peak_performance_shared::{
    FoodEntry, NewFoodEntry, NewWorkout, NutritionSummary, UserStats, Workout,
};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::{debug, warn};

/// What the UI renders
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub stats: Option<UserStats>,
    pub workouts: Vec<Workout>,
    pub food_entries: Vec<FoodEntry>,
    /// Derived from `food_entries`
    pub summary: NutritionSummary,
    /// Day the mirrored food entries belong to
    pub day: Option<NaiveDate>,
    /// Last user-visible error
    pub error: Option<String>,
}

impl Snapshot {
    fn empty(calorie_goal: i32) -> Self {
        Self {
            stats: None,
            workouts: Vec::new(),
            food_entries: Vec::new(),
            summary: NutritionSummary::from_entries(&[], calorie_goal),
            day: None,
            error: None,
        }
    }
}

/// Mirrored collections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirrored {
    Stats,
    Workouts,
    FoodEntries,
}

#[derive(Debug, Default)]
struct Generations {
    stats: u64,
    workouts: u64,
    food_entries: u64,
}

impl Generations {
    fn get_mut(&mut self, kind: Mirrored) -> &mut u64 {
        match kind {
            Mirrored::Stats => &mut self.stats,
            Mirrored::Workouts => &mut self.workouts,
            Mirrored::FoodEntries => &mut self.food_entries,
        }
    }

    /// Start a new generation, invalidating in-flight fetches
    fn advance(&mut self, kind: Mirrored) -> u64 {
        let generation = self.get_mut(kind);
        *generation += 1;
        *generation
    }

    fn is_current(&mut self, kind: Mirrored, token: u64) -> bool {
        *self.get_mut(kind) == token
    }
}

struct Mirror {
    snapshot: Snapshot,
    generations: Generations,
    fallback_goal: i32,
}

impl Mirror {
    fn calorie_goal(&self) -> i32 {
        self.snapshot
            .stats
            .as_ref()
            .map(|s| s.daily_goal.calories_intake)
            .unwrap_or(self.fallback_goal)
    }

    fn recompute_summary(&mut self) {
        let goal = self.calorie_goal();
        self.snapshot.summary = NutritionSummary::from_entries(&self.snapshot.food_entries, goal);
    }
}

/// Undo record for an optimistic food entry delete
struct PendingRemoval {
    token: u64,
    removed: Option<(usize, FoodEntry)>,
}

/// Per-session view model
pub struct ViewModel {
    state: AppState,
    user_id: String,
    mirror: Mutex<Mirror>,
    publisher: watch::Sender<Snapshot>,
}

impl ViewModel {
    pub fn new(state: AppState, user_id: impl Into<String>) -> Self {
        let fallback_goal = state.config.nutrition.fallback_calorie_goal;
        let snapshot = Snapshot::empty(fallback_goal);
        let (publisher, _) = watch::channel(snapshot.clone());
        Self {
            state,
            user_id: user_id.into(),
            mirror: Mutex::new(Mirror {
                snapshot,
                generations: Generations::default(),
                fallback_goal,
            }),
            publisher,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Receive every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.publisher.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Mirror> {
        self.mirror.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self, mirror: &Mirror) {
        self.publisher.send_replace(mirror.snapshot.clone());
    }

    fn begin_fetch(&self, kind: Mirrored) -> u64 {
        self.lock().generations.advance(kind)
    }

    /// Apply a fetch result if it is still the newest for `kind`
    fn finish_fetch<T>(
        &self,
        kind: Mirrored,
        token: u64,
        result: ServiceResult<T>,
        apply: impl FnOnce(&mut Mirror, T),
    ) -> ServiceResult<()> {
        let mut mirror = self.lock();
        if !mirror.generations.is_current(kind, token) {
            metrics::counter!("stale_fetches_discarded_total").increment(1);
            debug!(user_id = %self.user_id, ?kind, token, "Discarding stale fetch response");
            return result.map(|_| ());
        }

        match result {
            Ok(value) => {
                apply(&mut mirror, value);
                mirror.snapshot.error = None;
                self.publish(&mirror);
                Ok(())
            }
            Err(err) => {
                mirror.snapshot.error = Some(err.user_message());
                self.publish(&mirror);
                Err(err)
            }
        }
    }

    fn report_error(&self, err: &ServiceError) {
        let mut mirror = self.lock();
        mirror.snapshot.error = Some(err.user_message());
        self.publish(&mirror);
    }

    // ========================================================================
    // Fetches
    // ========================================================================

    /// Fetch the user's stats, applying any deferred counter changes first
    pub async fn fetch_stats(&self) -> ServiceResult<()> {
        let token = self.begin_fetch(Mirrored::Stats);
        if let Err(err) = StatsService::flush_pending(&self.state, &self.user_id).await {
            warn!(user_id = %self.user_id, error = %err, "Deferred stats update still pending");
        }
        let result = StatsService::fetch_or_create(&self.state, &self.user_id).await;
        self.finish_fetch(Mirrored::Stats, token, result, |mirror, stats| {
            mirror.snapshot.stats = Some(stats);
            mirror.recompute_summary();
        })
    }

    pub async fn fetch_workouts(&self) -> ServiceResult<()> {
        let token = self.begin_fetch(Mirrored::Workouts);
        let result = WorkoutService::list_workouts(&self.state, &self.user_id).await;
        self.finish_fetch(Mirrored::Workouts, token, result, |mirror, workouts| {
            mirror.snapshot.workouts = workouts;
        })
    }

    pub async fn fetch_food_entries(&self, day: NaiveDate) -> ServiceResult<()> {
        let token = self.begin_fetch(Mirrored::FoodEntries);
        let result = NutritionService::entries_for_day(&self.state, &self.user_id, day).await;
        self.finish_fetch(Mirrored::FoodEntries, token, result, |mirror, entries| {
            mirror.snapshot.food_entries = entries;
            mirror.snapshot.day = Some(day);
            mirror.recompute_summary();
        })
    }

    /// Fetch everything for `day`
    pub async fn refresh(&self, day: NaiveDate) -> ServiceResult<()> {
        let (stats, workouts, entries) = tokio::join!(
            self.fetch_stats(),
            self.fetch_workouts(),
            self.fetch_food_entries(day)
        );
        stats.and(workouts).and(entries)
    }

    fn mirrored_day(&self) -> NaiveDate {
        self.lock()
            .snapshot
            .day
            .unwrap_or_else(|| NutritionService::today(&self.state))
    }

    /// Refresh after a confirmed write; the write's own result is what counts
    async fn refresh_after_write(&self, entries: bool, workouts: bool) {
        let day = self.mirrored_day();
        let mut results = vec![self.fetch_stats().await];
        if entries {
            results.push(self.fetch_food_entries(day).await);
        }
        if workouts {
            results.push(self.fetch_workouts().await);
        }
        for err in results.into_iter().filter_map(Result::err) {
            warn!(user_id = %self.user_id, error = %err, "Refresh after write failed");
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    pub async fn add_food_entry(&self, request: NewFoodEntry) -> ServiceResult<FoodEntry> {
        let result = NutritionService::add_entry(&self.state, &self.user_id, request).await;
        self.after_write(result, true, false).await
    }

    pub async fn update_food_entry(&self, entry: FoodEntry) -> ServiceResult<FoodEntry> {
        let result = NutritionService::update_entry(&self.state, &self.user_id, entry).await;
        self.after_write(result, true, false).await
    }

    pub async fn add_workout(&self, request: NewWorkout) -> ServiceResult<Workout> {
        let result = WorkoutService::add_workout(&self.state, &self.user_id, request).await;
        self.after_write(result, false, true).await
    }

    pub async fn update_workout(&self, workout: Workout) -> ServiceResult<Workout> {
        let result = WorkoutService::update_workout(&self.state, &self.user_id, workout).await;
        self.after_write(result, false, true).await
    }

    pub async fn delete_workout(&self, workout_id: &str) -> ServiceResult<Workout> {
        let result = WorkoutService::delete_workout(&self.state, &self.user_id, workout_id).await;
        self.after_write(result, false, true).await
    }

    async fn after_write<T>(
        &self,
        result: ServiceResult<T>,
        entries: bool,
        workouts: bool,
    ) -> ServiceResult<T> {
        match result {
            Ok(value) => {
                self.refresh_after_write(entries, workouts).await;
                Ok(value)
            }
            Err(err) => {
                self.report_error(&err);
                Err(err)
            }
        }
    }

    /// Delete a food entry, removing it from the mirror before the store confirms
    ///
    /// If the entry delete fails, the entry goes back to its original
    /// position and the summary is re-derived, unless a newer fetch has
    /// replaced the list in the meantime or the entry is already gone from
    /// the store. The delete succeeds even when its stats update has to be
    /// deferred, so the removal stands in that case.
    pub async fn delete_food_entry(&self, entry_id: &str) -> ServiceResult<FoodEntry> {
        let remote = NutritionService::delete_entry(&self.state, &self.user_id, entry_id);

        let result = apply_optimistically(
            &self.mirror,
            |mirror: &mut Mirror| {
                let token = mirror.generations.advance(Mirrored::FoodEntries);
                let removed = remove_where(&mut mirror.snapshot.food_entries, |e| {
                    e.id.as_deref() == Some(entry_id)
                });
                if removed.is_some() {
                    mirror.recompute_summary();
                    self.publish(mirror);
                }
                PendingRemoval { token, removed }
            },
            remote,
            |mirror: &mut Mirror, pending: PendingRemoval, err: &ServiceError| {
                let Some((index, entry)) = pending.removed else {
                    return;
                };
                if err.is_not_found() {
                    debug!(user_id = %self.user_id, entry_id, "Entry already gone");
                    return;
                }
                if !mirror.generations.is_current(Mirrored::FoodEntries, pending.token) {
                    debug!(
                        user_id = %self.user_id,
                        entry_id,
                        "Mirror refreshed since delete; skipping rollback"
                    );
                    return;
                }
                let entries = &mut mirror.snapshot.food_entries;
                if reinsert(entries, index, entry, |e| e.id.clone()) {
                    metrics::counter!("optimistic_rollbacks_total").increment(1);
                    warn!(
                        user_id = %self.user_id,
                        entry_id,
                        index,
                        "Rolled back optimistic delete"
                    );
                    mirror.recompute_summary();
                    self.publish(mirror);
                }
            },
        )
        .await;

        match result {
            Ok(deleted) => {
                if let Err(err) = self.fetch_stats().await {
                    warn!(user_id = %self.user_id, error = %err, "Refresh after delete failed");
                }
                Ok(deleted)
            }
            Err(err) => {
                self.report_error(&err);
                Err(err)
            }
        }
    }
}
