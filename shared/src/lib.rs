//! PeakPerformance Shared Library
//!
//! Domain types and pure computations shared by the data-access backend and
//! the WASM bindings. Nothing in this crate performs I/O.

pub mod decode;
pub mod errors;
pub mod models;
pub mod summary;
pub mod types;
pub mod validation;

// Re-export commonly used items
pub use decode::{decode, decode_or_else, decode_user_stats, DecodeOutcome};
pub use errors::*;
pub use models::{
    format_duration, progress, DailyGoal, Exercise, ExerciseSet, FoodEntry, GoalUpdate, MealType,
    UserStats, Workout,
};
pub use summary::{macro_percentage, MacroProgress, NutritionSummary};
pub use types::*;
