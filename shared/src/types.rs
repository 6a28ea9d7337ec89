//! Input types for the entry and stats flows

use crate::models::{Exercise, FoodEntry, GoalUpdate, MealType, Workout};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to log a food entry
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewFoodEntry {
    #[validate(length(min = 1, max = 120, message = "Food name must be 1-120 characters"))]
    pub name: String,
    #[validate(range(max = 50000, message = "Calorie value unreasonably high"))]
    pub calories: i32,
    #[validate(range(max = 5000.0, message = "Protein value unreasonably high"))]
    pub protein: f64,
    #[validate(range(max = 5000.0, message = "Carbs value unreasonably high"))]
    pub carbs: f64,
    #[validate(range(max = 5000.0, message = "Fat value unreasonably high"))]
    pub fat: f64,
    /// Defaults to now
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    pub meal_type: MealType,
    pub serving_size: f64,
    #[serde(default)]
    pub serving_unit: String,
}

impl NewFoodEntry {
    /// Build the entry owned by `user_id`; nutrient values are clamped
    pub fn into_entry(self, user_id: &str) -> FoodEntry {
        FoodEntry::new(
            user_id,
            self.name.trim(),
            self.calories,
            self.protein,
            self.carbs,
            self.fat,
            self.date.unwrap_or_else(Utc::now),
            self.meal_type,
            self.serving_size,
            self.serving_unit,
        )
    }
}

/// Request to log a workout
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkout {
    #[validate(length(min = 1, max = 120, message = "Workout name must be 1-120 characters"))]
    pub name: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    /// Minutes
    #[validate(range(min = 0, max = 1440, message = "Duration must be between 0 and 1440 minutes"))]
    pub duration: i32,
    #[validate(range(min = 0, max = 20000, message = "Calories must be between 0 and 20000"))]
    pub calories: i32,
    #[serde(default)]
    pub exercises: Option<Vec<Exercise>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
}

impl NewWorkout {
    pub fn into_workout(self, user_id: &str) -> Workout {
        Workout {
            id: None,
            user_id: user_id.to_string(),
            name: self.name.trim().to_string(),
            date: self.date.unwrap_or_else(Utc::now),
            duration: self.duration,
            calories: self.calories,
            exercises: self.exercises,
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            is_completed: self.is_completed,
            created_at: None,
        }
    }
}

/// Manual update of the daily activity counters; absent fields are left alone
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivityUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_steps: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_burned: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_walked: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub water_intake: Option<i32>,
}

impl ActivityUpdate {
    pub fn is_empty(&self) -> bool {
        self == &ActivityUpdate::default()
    }
}

/// Profile and goal changes merged into the stats document
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub bio: Option<String>,
    pub photo_url: Option<String>,
    #[serde(default)]
    pub goals: GoalUpdate,
}
