//! # fitness-tracker 🏋️
//!
//! Estimate calories burned during a workout, compute BMI, and keep a history
//! of entries in plain CSV files.
//!
//! ## Features
//! - Heart-rate based calorie estimate with gender-specific coefficients
//! - MET (Metabolic Equivalent of Task) based estimate per exercise type
//! - BMI with healthy-range classification
//! - Append-only CSV tables (`exercise.csv`, `calories.csv`, `history.csv`)
//! - Random forest, SVM and linear regressors trained on the history with
//!   [`linfa`](https://crates.io/crates/linfa), persisted with `rmp-serde` (MessagePack)
//! - Benchmarkable with [Criterion](https://crates.io/crates/criterion)
//!
//! ## Example
//! ```rust
//! use fitness_tracker::{bmi, estimate_calories, CalorieMethod, WorkoutInput};
//!
//! let input = WorkoutInput::default();
//! let kcal = estimate_calories(&input, CalorieMethod::Met);
//! let bmi = bmi(input.weight_kg as f64, input.height_cm as f64).unwrap();
//! assert_eq!(kcal, 210.0);
//! assert_eq!(bmi, 24.22);
//! ```

pub mod bmi;
pub mod calories;
pub mod config;
pub mod error;
pub mod forest;
pub mod linear;
pub mod store;
pub mod tracker;
pub mod training;

pub use bmi::{bmi, BmiStatus};
pub use calories::{
    calories_heart_rate, calories_met, estimate_calories, met_value, CalorieMethod, Exercise,
    Gender, WorkoutInput,
};
pub use config::Config;
pub use error::{FitnessError, Result};
pub use store::{CaloriesRecord, ExerciseRecord, HistoryRecord, Store, Table};
pub use tracker::{Prediction, SaveOutcome, Tracker, TrainingStatus};
pub use training::{train_models, ModelBundle, ModelKind, TrainingOptions};

/// Rounds to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
