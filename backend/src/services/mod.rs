//! Business logic services
//!
//! Services validate input, call the repositories and keep the per-user
//! stats document consistent with the entries they write.

pub mod nutrition;
pub mod stats;
pub mod workouts;

pub use nutrition::NutritionService;
pub use stats::{PendingDeltas, StatDelta, StatsService};
pub use workouts::WorkoutService;
