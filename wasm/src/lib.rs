//! Peak Performance WASM Module
//!
//! Browser bindings for the dashboard math, so web clients derive the same
//! nutrition summary and progress values as the native apps.

use peak_performance_shared::{
    decode, format_duration, macro_percentage, progress, DecodeOutcome, FoodEntry, NutritionSummary,
};
use serde_json::Value;
use wasm_bindgen::prelude::*;

/// Summarize a JSON array of food entries against a calorie intake goal
///
/// Entries that do not decode are left out. Returns the summary as JSON.
#[wasm_bindgen]
pub fn nutrition_summary(entries_json: &str, calorie_goal: i32) -> Result<String, JsError> {
    summarize(entries_json, calorie_goal).map_err(|e| JsError::new(&e.to_string()))
}

fn summarize(entries_json: &str, calorie_goal: i32) -> Result<String, serde_json::Error> {
    let raw: Vec<Value> = serde_json::from_str(entries_json)?;
    let entries: Vec<FoodEntry> = raw
        .iter()
        .filter_map(|doc| match decode::<FoodEntry>(Some(doc)) {
            DecodeOutcome::Ok(entry) | DecodeOutcome::Recovered { value: entry, .. } => {
                Some(entry.normalized())
            }
            DecodeOutcome::Fatal(_) => None,
        })
        .collect();
    serde_json::to_string(&NutritionSummary::from_entries(&entries, calorie_goal))
}

/// Progress towards a goal in `[0, 1]`
#[wasm_bindgen]
pub fn progress_ratio(value: f64, goal: f64) -> f64 {
    progress(value, goal)
}

/// Share of total calories contributed by one macro, in percent
#[wasm_bindgen]
pub fn macro_share(macro_calories: f64, total_calories: i32) -> f64 {
    macro_percentage(macro_calories, total_calories)
}

#[wasm_bindgen]
pub fn workout_duration_label(minutes: i32) -> String {
    format_duration(minutes)
}
