//! Input validation functions
//!
//! Combines the `validator` derive rules on the input types with checks that
//! derive macros cannot express (finite floats, cross-field rules).

use crate::errors::ValidationError;
use crate::types::{ActivityUpdate, NewFoodEntry, NewWorkout, ProfileUpdate};
use validator::Validate;

/// Upper bound for a manually entered step count
const MAX_DAILY_STEPS: i32 = 200_000;

/// Upper bound for manually entered water intake (cups)
const MAX_WATER_CUPS: i32 = 100;

/// Validate a finite, non-negative quantity
pub fn validate_quantity(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_nan() || value.is_infinite() {
        return Err(ValidationError::field(field, "must be a valid number"));
    }
    if value < 0.0 {
        return Err(ValidationError::field(field, "cannot be negative"));
    }
    Ok(())
}

/// Validate calorie value
pub fn validate_calories(calories: i32) -> Result<(), ValidationError> {
    if calories < 0 {
        return Err(ValidationError::field("calories", "Calories cannot be negative"));
    }
    if calories > 50_000 {
        return Err(ValidationError::field("calories", "Calorie value unreasonably high"));
    }
    Ok(())
}

/// Validate duration in minutes
pub fn validate_duration_minutes(minutes: i32) -> Result<(), ValidationError> {
    if minutes < 0 {
        return Err(ValidationError::field("duration", "Duration cannot be negative"));
    }
    if minutes > 1440 {
        // 24 hours
        return Err(ValidationError::field("duration", "Duration cannot exceed 24 hours"));
    }
    Ok(())
}

/// Validate a food entry request
///
/// Negative nutrient values are not rejected here; they are clamped to zero
/// when the entry is built.
pub fn validate_new_food_entry(request: &NewFoodEntry) -> Result<(), ValidationError> {
    request.validate()?;
    if request.name.trim().is_empty() {
        return Err(ValidationError::field("name", "Food name cannot be blank"));
    }
    for (field, value) in [
        ("protein", request.protein),
        ("carbs", request.carbs),
        ("fat", request.fat),
        ("servingSize", request.serving_size),
    ] {
        if !value.is_finite() {
            return Err(ValidationError::field(field, "must be a valid number"));
        }
    }
    Ok(())
}

/// Validate a workout request
pub fn validate_new_workout(request: &NewWorkout) -> Result<(), ValidationError> {
    request.validate()?;
    if request.name.trim().is_empty() {
        return Err(ValidationError::field("name", "Workout name cannot be blank"));
    }
    validate_duration_minutes(request.duration)?;
    validate_calories(request.calories)?;
    Ok(())
}

/// Validate a manual activity update
pub fn validate_activity_update(update: &ActivityUpdate) -> Result<(), ValidationError> {
    if update.is_empty() {
        return Err(ValidationError::Invalid("No activity values provided".to_string()));
    }
    if let Some(steps) = update.daily_steps {
        if !(0..=MAX_DAILY_STEPS).contains(&steps) {
            return Err(ValidationError::field(
                "dailySteps",
                format!("must be between 0 and {}", MAX_DAILY_STEPS),
            ));
        }
    }
    if let Some(calories) = update.calories_burned {
        validate_calories(calories)?;
    }
    if let Some(distance) = update.distance_walked {
        validate_quantity("distanceWalked", distance)?;
    }
    if let Some(water) = update.water_intake {
        if !(0..=MAX_WATER_CUPS).contains(&water) {
            return Err(ValidationError::field(
                "waterIntake",
                format!("must be between 0 and {} cups", MAX_WATER_CUPS),
            ));
        }
    }
    Ok(())
}

/// Validate a profile update
pub fn validate_profile_update(update: &ProfileUpdate) -> Result<(), ValidationError> {
    if let Some(bio) = &update.bio {
        if bio.chars().count() > 500 {
            return Err(ValidationError::field("bio", "Bio cannot exceed 500 characters"));
        }
    }
    if let Some(url) = &update.photo_url {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ValidationError::field("photoURL", "Photo URL must be an http(s) URL"));
        }
    }
    Ok(())
}
