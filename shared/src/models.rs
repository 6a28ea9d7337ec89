//! Data models for the PeakPerformance application
//!
//! Every model clamps its numeric fields both when constructed in code and
//! when decoded from a stored document, so values read back from the store
//! always satisfy the same invariants as values created locally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Smallest serving size an entry can carry
pub const MIN_SERVING_SIZE: f64 = 0.1;

/// Serving unit used when none is given
pub const DEFAULT_SERVING_UNIT: &str = "g";

fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

/// Fresh random document id
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

// ============================================================================
// Food entries
// ============================================================================

/// Meal category for a food entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "Breakfast",
            MealType::Lunch => "Lunch",
            MealType::Dinner => "Dinner",
            MealType::Snack => "Snack",
        }
    }
}

impl std::fmt::Display for MealType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A logged food item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "FoodEntryDocument")]
pub struct FoodEntry {
    /// Assigned by the store on creation
    #[serde(skip_serializing)]
    pub id: Option<String>,
    pub user_id: String,
    pub name: String,
    pub calories: i32,
    /// Grams
    pub protein: f64,
    /// Grams
    pub carbs: f64,
    /// Grams
    pub fat: f64,
    pub date: DateTime<Utc>,
    pub meal_type: MealType,
    pub serving_size: f64,
    pub serving_unit: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoodEntryDocument {
    #[serde(default)]
    id: Option<String>,
    user_id: String,
    name: String,
    calories: i32,
    protein: f64,
    carbs: f64,
    fat: f64,
    date: DateTime<Utc>,
    meal_type: MealType,
    serving_size: f64,
    #[serde(default)]
    serving_unit: String,
}

impl From<FoodEntryDocument> for FoodEntry {
    fn from(doc: FoodEntryDocument) -> Self {
        FoodEntry {
            id: doc.id,
            user_id: doc.user_id,
            name: doc.name,
            calories: doc.calories,
            protein: doc.protein,
            carbs: doc.carbs,
            fat: doc.fat,
            date: doc.date,
            meal_type: doc.meal_type,
            serving_size: doc.serving_size,
            serving_unit: doc.serving_unit,
        }
        .normalized()
    }
}

impl FoodEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        calories: i32,
        protein: f64,
        carbs: f64,
        fat: f64,
        date: DateTime<Utc>,
        meal_type: MealType,
        serving_size: f64,
        serving_unit: impl Into<String>,
    ) -> Self {
        FoodEntry {
            id: None,
            user_id: user_id.into(),
            name: name.into(),
            calories,
            protein,
            carbs,
            fat,
            date,
            meal_type,
            serving_size,
            serving_unit: serving_unit.into(),
        }
        .normalized()
    }

    /// Clamp nutrients to zero, serving size to its floor and fill an empty unit
    pub fn normalized(mut self) -> Self {
        self.calories = self.calories.max(0);
        self.protein = non_negative(self.protein);
        self.carbs = non_negative(self.carbs);
        self.fat = non_negative(self.fat);
        self.serving_size = if self.serving_size.is_finite() {
            self.serving_size.max(MIN_SERVING_SIZE)
        } else {
            MIN_SERVING_SIZE
        };
        if self.serving_unit.trim().is_empty() {
            self.serving_unit = DEFAULT_SERVING_UNIT.to_string();
        }
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn calories_per_serving(&self) -> f64 {
        per_serving(self.calories as f64, self.serving_size)
    }

    pub fn protein_per_serving(&self) -> f64 {
        per_serving(self.protein, self.serving_size)
    }

    pub fn carbs_per_serving(&self) -> f64 {
        per_serving(self.carbs, self.serving_size)
    }

    pub fn fat_per_serving(&self) -> f64 {
        per_serving(self.fat, self.serving_size)
    }

    /// True when both entries carry the same nutritional content, ignoring identity
    pub fn same_content(&self, other: &FoodEntry) -> bool {
        FoodEntry { id: None, ..self.clone() } == FoodEntry { id: None, ..other.clone() }
    }
}

fn per_serving(amount: f64, serving_size: f64) -> f64 {
    if serving_size > 0.0 {
        amount / serving_size
    } else {
        0.0
    }
}

// ============================================================================
// Workouts and exercises
// ============================================================================

/// One set of an exercise
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseSet {
    #[serde(default = "new_id")]
    pub id: String,
    pub weight: i32,
    pub reps: i32,
    #[serde(default)]
    pub is_completed: bool,
}

impl ExerciseSet {
    pub fn new(weight: i32, reps: i32) -> Self {
        Self {
            id: new_id(),
            weight,
            reps,
            is_completed: false,
        }
    }

    pub fn volume(&self) -> i64 {
        self.weight as i64 * self.reps as i64
    }
}

/// An exercise performed during a workout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    #[serde(default = "new_id")]
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub sets: Vec<ExerciseSet>,
}

impl Exercise {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        sets: Vec<ExerciseSet>,
    ) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            category: category.into(),
            sets,
        }
    }

    /// Σ weight × reps over all sets
    pub fn total_volume(&self) -> i64 {
        self.sets.iter().map(ExerciseSet::volume).sum()
    }
}

/// A logged workout
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    #[serde(default, skip_serializing)]
    pub id: Option<String>,
    pub user_id: String,
    pub name: String,
    pub date: DateTime<Utc>,
    /// Minutes
    pub duration: i32,
    pub calories: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercises: Option<Vec<Exercise>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
    /// Set once when the workout is first stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Workout {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        date: DateTime<Utc>,
        duration: i32,
        calories: i32,
    ) -> Self {
        Self {
            id: None,
            user_id: user_id.into(),
            name: name.into(),
            date,
            duration,
            calories,
            exercises: None,
            notes: None,
            is_completed: false,
            created_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn formatted_duration(&self) -> String {
        format_duration(self.duration)
    }

    pub fn total_volume(&self) -> i64 {
        self.exercises
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(Exercise::total_volume)
            .sum()
    }
}

// ============================================================================
// User stats and goals
// ============================================================================

/// Per-user daily targets used for progress ratios
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "DailyGoalDocument")]
pub struct DailyGoal {
    pub steps: i32,
    /// Calories to burn
    pub calories: i32,
    /// Calorie intake target
    pub calories_intake: i32,
    pub active_minutes: i32,
    /// Cups
    pub water: i32,
    /// Grams
    pub protein: f64,
    /// Grams
    pub carbs: f64,
    /// Grams
    pub fat: f64,
}

impl Default for DailyGoal {
    fn default() -> Self {
        Self {
            steps: 10_000,
            calories: 500,
            calories_intake: 2000,
            active_minutes: 30,
            water: 8,
            protein: 150.0,
            carbs: 225.0,
            fat: 67.0,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyGoalDocument {
    steps: Option<i32>,
    calories: Option<i32>,
    calories_intake: Option<i32>,
    active_minutes: Option<i32>,
    water: Option<i32>,
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
}

impl From<DailyGoalDocument> for DailyGoal {
    fn from(doc: DailyGoalDocument) -> Self {
        let defaults = DailyGoal::default();
        DailyGoal {
            steps: doc.steps.unwrap_or(defaults.steps),
            calories: doc.calories.unwrap_or(defaults.calories),
            calories_intake: doc.calories_intake.unwrap_or(defaults.calories_intake),
            active_minutes: doc.active_minutes.unwrap_or(defaults.active_minutes),
            water: doc.water.unwrap_or(defaults.water),
            protein: doc.protein.unwrap_or(defaults.protein),
            carbs: doc.carbs.unwrap_or(defaults.carbs),
            fat: doc.fat.unwrap_or(defaults.fat),
        }
        .normalized()
    }
}

impl DailyGoal {
    /// Ratio targets never drop below 1; water and macro targets never below 0
    pub fn normalized(mut self) -> Self {
        self.steps = self.steps.max(1);
        self.calories = self.calories.max(1);
        self.calories_intake = self.calories_intake.max(1);
        self.active_minutes = self.active_minutes.max(1);
        self.water = self.water.max(0);
        self.protein = non_negative(self.protein);
        self.carbs = non_negative(self.carbs);
        self.fat = non_negative(self.fat);
        self
    }
}

/// Partial goal update; only positive values replace existing targets
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GoalUpdate {
    pub steps: Option<i32>,
    pub calories: Option<i32>,
    pub calories_intake: Option<i32>,
    pub active_minutes: Option<i32>,
    pub water: Option<i32>,
}

/// The single mutable aggregate per user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", from = "UserStatsDocument")]
pub struct UserStats {
    pub user_id: String,
    pub daily_steps: i32,
    pub calories_burned: i32,
    pub calories_consumed: Option<i32>,
    pub active_minutes: i32,
    /// Kilometres
    pub distance_walked: f64,
    /// Cups
    pub water_intake: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub daily_goal: DailyGoal,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserStatsDocument {
    user_id: String,
    #[serde(default)]
    daily_steps: i32,
    #[serde(default)]
    calories_burned: i32,
    #[serde(default)]
    calories_consumed: Option<i32>,
    #[serde(default)]
    active_minutes: i32,
    #[serde(default)]
    distance_walked: f64,
    #[serde(default)]
    water_intake: i32,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default, rename = "photoURL")]
    photo_url: Option<String>,
    #[serde(default)]
    daily_goal: Option<serde_json::Value>,
}

impl From<UserStatsDocument> for UserStats {
    fn from(doc: UserStatsDocument) -> Self {
        let daily_goal = doc
            .daily_goal
            .and_then(|value| serde_json::from_value::<DailyGoal>(value).ok())
            .unwrap_or_default();

        UserStats {
            user_id: doc.user_id,
            daily_steps: doc.daily_steps,
            calories_burned: doc.calories_burned,
            calories_consumed: Some(doc.calories_consumed.unwrap_or(0)),
            active_minutes: doc.active_minutes,
            distance_walked: doc.distance_walked,
            water_intake: doc.water_intake,
            bio: doc.bio,
            photo_url: doc.photo_url,
            daily_goal,
        }
        .normalized()
    }
}

impl UserStats {
    /// Fresh stats with zeroed counters and the default goal
    pub fn new(user_id: impl Into<String>) -> Self {
        UserStats {
            user_id: user_id.into(),
            daily_steps: 0,
            calories_burned: 0,
            calories_consumed: Some(0),
            active_minutes: 0,
            distance_walked: 0.0,
            water_intake: 0,
            bio: None,
            photo_url: None,
            daily_goal: DailyGoal::default(),
        }
    }

    pub fn normalized(mut self) -> Self {
        self.daily_steps = self.daily_steps.max(0);
        self.calories_burned = self.calories_burned.max(0);
        self.calories_consumed = self.calories_consumed.map(|c| c.max(0));
        self.active_minutes = self.active_minutes.max(0);
        self.distance_walked = non_negative(self.distance_walked);
        self.water_intake = self.water_intake.max(0);
        self.daily_goal = self.daily_goal.normalized();
        self
    }

    pub fn calories_consumed(&self) -> i32 {
        self.calories_consumed.unwrap_or(0)
    }

    pub fn steps_progress(&self) -> f64 {
        progress(self.daily_steps as f64, self.daily_goal.steps as f64)
    }

    pub fn calories_progress(&self) -> f64 {
        progress(self.calories_burned as f64, self.daily_goal.calories as f64)
    }

    pub fn calories_intake_progress(&self) -> f64 {
        progress(
            self.calories_consumed() as f64,
            self.daily_goal.calories_intake as f64,
        )
    }

    pub fn active_minutes_progress(&self) -> f64 {
        progress(self.active_minutes as f64, self.daily_goal.active_minutes as f64)
    }

    pub fn water_progress(&self) -> f64 {
        progress(self.water_intake as f64, self.daily_goal.water as f64)
    }

    pub fn net_calories(&self) -> i32 {
        self.calories_consumed() - self.calories_burned
    }

    /// Calories still to burn today
    pub fn remaining_calories(&self) -> i32 {
        (self.daily_goal.calories - self.calories_burned).max(0)
    }

    pub fn remaining_calories_intake(&self) -> i32 {
        (self.daily_goal.calories_intake - self.calories_consumed()).max(0)
    }

    /// Copy with the provided positive goal values applied
    pub fn with_updated_goals(&self, update: &GoalUpdate) -> UserStats {
        fn apply(target: &mut i32, value: Option<i32>) {
            if let Some(v) = value.filter(|v| *v > 0) {
                *target = v;
            }
        }

        let mut copy = self.clone();
        apply(&mut copy.daily_goal.steps, update.steps);
        apply(&mut copy.daily_goal.calories, update.calories);
        apply(&mut copy.daily_goal.calories_intake, update.calories_intake);
        apply(&mut copy.daily_goal.active_minutes, update.active_minutes);
        apply(&mut copy.daily_goal.water, update.water);
        copy
    }
}

/// `"1h 5m"` or `"45m"`
pub fn format_duration(minutes: i32) -> String {
    let minutes = minutes.max(0);
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours > 0 {
        format!("{}h {}m", hours, rest)
    } else {
        format!("{}m", rest)
    }
}

/// `value / goal` capped at 1, or 0 when the goal is not positive
pub fn progress(value: f64, goal: f64) -> f64 {
    if goal > 0.0 {
        (value / goal).clamp(0.0, 1.0)
    } else {
        0.0
    }
}
