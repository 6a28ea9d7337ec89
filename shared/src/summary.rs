//! Nutrition summary aggregation
//!
//! A [`NutritionSummary`] is always recomputed from the full set of entries
//! for a day instead of being patched incrementally, so it cannot drift from
//! the entries it describes.

use crate::models::{progress, DailyGoal, FoodEntry, MealType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Energy density of protein (kcal per gram)
pub const KCAL_PER_GRAM_PROTEIN: f64 = 4.0;

/// Energy density of carbohydrates (kcal per gram)
pub const KCAL_PER_GRAM_CARBS: f64 = 4.0;

/// Energy density of fat (kcal per gram)
pub const KCAL_PER_GRAM_FAT: f64 = 9.0;

/// Daily nutrition totals derived from a day's food entries
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NutritionSummary {
    pub total_calories: i32,
    pub total_protein: f64,
    pub total_carbs: f64,
    pub total_fat: f64,
    /// `max(0, goal - total_calories)`
    pub remaining_calories: i32,
    pub protein_percentage: f64,
    pub carbs_percentage: f64,
    pub fat_percentage: f64,
    #[serde(default)]
    pub calories_by_meal: BTreeMap<MealType, i32>,
}

impl NutritionSummary {
    /// Fold a day's entries into totals, remaining calories and macro shares
    pub fn from_entries(entries: &[FoodEntry], calorie_intake_goal: i32) -> Self {
        let mut calories_by_meal = BTreeMap::new();
        let (total_calories, total_protein, total_carbs, total_fat) = entries.iter().fold(
            (0i32, 0.0f64, 0.0f64, 0.0f64),
            |(cal, pro, carb, fat), entry| {
                let meal_total = calories_by_meal.entry(entry.meal_type).or_insert(0i32);
                *meal_total = meal_total.saturating_add(entry.calories);
                (
                    cal.saturating_add(entry.calories),
                    pro + entry.protein,
                    carb + entry.carbs,
                    fat + entry.fat,
                )
            },
        );

        NutritionSummary {
            total_calories,
            total_protein,
            total_carbs,
            total_fat,
            remaining_calories: calorie_intake_goal.saturating_sub(total_calories).max(0),
            protein_percentage: macro_percentage(
                total_protein * KCAL_PER_GRAM_PROTEIN,
                total_calories,
            ),
            carbs_percentage: macro_percentage(total_carbs * KCAL_PER_GRAM_CARBS, total_calories),
            fat_percentage: macro_percentage(total_fat * KCAL_PER_GRAM_FAT, total_calories),
            calories_by_meal,
        }
    }

    /// Summary against a user's goal
    pub fn for_goal(entries: &[FoodEntry], goal: &DailyGoal) -> Self {
        Self::from_entries(entries, goal.calories_intake)
    }

    pub fn protein_calories(&self) -> i32 {
        (self.total_protein * KCAL_PER_GRAM_PROTEIN) as i32
    }

    pub fn carbs_calories(&self) -> i32 {
        (self.total_carbs * KCAL_PER_GRAM_CARBS) as i32
    }

    pub fn fat_calories(&self) -> i32 {
        (self.total_fat * KCAL_PER_GRAM_FAT) as i32
    }

    /// Progress of each macro towards the goal's gram targets, each in [0, 1]
    pub fn macro_progress(&self, goal: &DailyGoal) -> MacroProgress {
        MacroProgress {
            protein: progress(self.total_protein, goal.protein),
            carbs: progress(self.total_carbs, goal.carbs),
            fat: progress(self.total_fat, goal.fat),
        }
    }

    pub fn calories_for_meal(&self, meal: MealType) -> i32 {
        self.calories_by_meal.get(&meal).copied().unwrap_or(0)
    }

    pub fn formatted_protein(&self) -> String {
        format!("{:.1} g", self.total_protein)
    }

    pub fn formatted_carbs(&self) -> String {
        format!("{:.1} g", self.total_carbs)
    }

    pub fn formatted_fat(&self) -> String {
        format!("{:.1} g", self.total_fat)
    }
}

/// Macro intake relative to the gram targets of a [`DailyGoal`]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MacroProgress {
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

/// Share of total calories contributed by a macro, in [0, 100]
pub fn macro_percentage(macro_calories: f64, total_calories: i32) -> f64 {
    if total_calories <= 0 || !macro_calories.is_finite() {
        return 0.0;
    }
    (macro_calories / total_calories as f64 * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fake::{faker::lorem::en::Word, Fake};
    use rstest::rstest;

    fn entry(calories: i32, protein: f64, carbs: f64, fat: f64) -> FoodEntry {
        entry_for_meal(calories, protein, carbs, fat, MealType::Lunch)
    }

    fn entry_for_meal(
        calories: i32,
        protein: f64,
        carbs: f64,
        fat: f64,
        meal: MealType,
    ) -> FoodEntry {
        let name: String = Word().fake();
        FoodEntry::new("user", name, calories, protein, carbs, fat, Utc::now(), meal, 100.0, "g")
    }

    #[test]
    fn test_empty_entries_yield_zero_summary() {
        let summary = NutritionSummary::from_entries(&[], 2000);
        assert_eq!(summary.total_calories, 0);
        assert_eq!(summary.total_protein, 0.0);
        assert_eq!(summary.remaining_calories, 2000);
        assert_eq!(summary.protein_percentage, 0.0);
        assert_eq!(summary.carbs_percentage, 0.0);
        assert_eq!(summary.fat_percentage, 0.0);
    }

    #[test]
    fn test_chicken_and_rice_example() {
        let entries = vec![entry(165, 31.0, 0.0, 3.6), entry(200, 5.0, 40.0, 2.0)];
        let summary = NutritionSummary::from_entries(&entries, 2000);

        assert_eq!(summary.total_calories, 365);
        assert_eq!(summary.remaining_calories, 1635);
        assert!((summary.total_protein - 36.0).abs() < 1e-9);
        assert_eq!(summary.protein_percentage.round(), 39.0);
        assert_eq!(summary.carbs_percentage.round(), 44.0);
        assert_eq!(summary.fat_percentage.round(), 14.0);
    }

    #[test]
    fn test_remaining_calories_floor_at_zero() {
        let entries = vec![entry(1500, 0.0, 0.0, 0.0), entry(900, 0.0, 0.0, 0.0)];
        let summary = NutritionSummary::from_entries(&entries, 2000);
        assert_eq!(summary.total_calories, 2400);
        assert_eq!(summary.remaining_calories, 0);
    }

    #[test]
    fn test_percentage_capped_at_hundred() {
        // 100 g of protein is 400 kcal but the entry only declares 50 kcal
        let summary = NutritionSummary::from_entries(&[entry(50, 100.0, 0.0, 0.0)], 2000);
        assert_eq!(summary.protein_percentage, 100.0);
    }

    #[test]
    fn test_macros_without_calories_give_zero_percentages() {
        let summary = NutritionSummary::from_entries(&[entry(0, 20.0, 20.0, 20.0)], 2000);
        assert_eq!(summary.protein_percentage, 0.0);
        assert_eq!(summary.fat_percentage, 0.0);
    }

    #[test]
    fn test_macro_calories_truncate() {
        let summary = NutritionSummary::from_entries(&[entry(100, 2.6, 1.1, 1.05)], 2000);
        assert_eq!(summary.protein_calories(), 10);
        assert_eq!(summary.carbs_calories(), 4);
        assert_eq!(summary.fat_calories(), 9);
    }

    #[test]
    fn test_calories_by_meal() {
        let entries = vec![
            entry_for_meal(300, 0.0, 0.0, 0.0, MealType::Breakfast),
            entry_for_meal(150, 0.0, 0.0, 0.0, MealType::Snack),
            entry_for_meal(100, 0.0, 0.0, 0.0, MealType::Snack),
        ];
        let summary = NutritionSummary::from_entries(&entries, 2000);
        assert_eq!(summary.calories_for_meal(MealType::Breakfast), 300);
        assert_eq!(summary.calories_for_meal(MealType::Snack), 250);
        assert_eq!(summary.calories_for_meal(MealType::Dinner), 0);
    }

    #[test]
    fn test_macro_progress_against_goal() {
        let goal = DailyGoal {
            protein: 100.0,
            fat: 0.0,
            ..DailyGoal::default()
        };
        let summary = NutritionSummary::from_entries(&[entry(500, 50.0, 300.0, 10.0)], 2000);
        let progress = summary.macro_progress(&goal);
        assert_eq!(progress.protein, 0.5);
        assert_eq!(progress.carbs, 1.0);
        assert_eq!(progress.fat, 0.0);
    }

    #[test]
    fn test_formatted_macros() {
        let summary = NutritionSummary::from_entries(&[entry(100, 12.345, 0.0, 3.0)], 2000);
        assert_eq!(summary.formatted_protein(), "12.3 g");
        assert_eq!(summary.formatted_fat(), "3.0 g");
    }

    #[rstest]
    #[case(0.0, 0, 0.0)]
    #[case(400.0, 0, 0.0)]
    #[case(100.0, 400, 25.0)]
    #[case(800.0, 400, 100.0)]
    #[case(f64::INFINITY, 400, 0.0)]
    fn test_macro_percentage(#[case] macro_kcal: f64, #[case] total: i32, #[case] expected: f64) {
        assert_eq!(macro_percentage(macro_kcal, total), expected);
    }
}
