//! Calorie estimation from exercise parameters.
//!
//! Two estimators are available: a heart-rate regression with gender-specific
//! coefficients, and a MET (Metabolic Equivalent of Task) lookup. Both return
//! kilocalories rounded to two decimals.

use crate::error::{FitnessError, Result};
use crate::round2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kilojoule to kilocalorie conversion factor used by the heart-rate formula.
const KJ_PER_KCAL: f64 = 4.184;

/// MET used when the exercise is not in the lookup table.
pub const DEFAULT_MET: f64 = 6.0;

/// Selects the coefficient set of the heart-rate formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl FromStr for Gender {
    type Err = FitnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            _ => Err(FitnessError::unknown("gender", s)),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Exercise types with a known MET value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Exercise {
    Cycling,
    Running,
    Walking,
    #[serde(rename = "Jump Rope")]
    JumpRope,
}

impl Exercise {
    pub const ALL: [Exercise; 4] = [
        Exercise::Cycling,
        Exercise::Running,
        Exercise::Walking,
        Exercise::JumpRope,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Exercise::Cycling => "Cycling",
            Exercise::Running => "Running",
            Exercise::Walking => "Walking",
            Exercise::JumpRope => "Jump Rope",
        }
    }

    /// Energy cost relative to sitting still.
    pub fn met(&self) -> f64 {
        match self {
            Exercise::Cycling => 6.0,
            Exercise::Running => 10.0,
            Exercise::Walking => 3.8,
            Exercise::JumpRope => 10.0,
        }
    }
}

impl FromStr for Exercise {
    type Err = FitnessError;

    fn from_str(s: &str) -> Result<Self> {
        Exercise::ALL
            .into_iter()
            .find(|e| e.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| FitnessError::unknown("exercise", s))
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Which estimator produced a calorie figure. Serialized with the labels
/// stored in the history table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalorieMethod {
    #[serde(rename = "Heart Rate-Based")]
    HeartRate,
    #[serde(rename = "MET-Based")]
    Met,
}

impl CalorieMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CalorieMethod::HeartRate => "Heart Rate-Based",
            CalorieMethod::Met => "MET-Based",
        }
    }

    /// One-line explanation shown next to the method choice.
    pub fn description(&self) -> &'static str {
        match self {
            CalorieMethod::HeartRate => {
                "Estimates calories burned from age, weight, heart rate and duration."
            }
            CalorieMethod::Met => {
                "Uses the MET (Metabolic Equivalent of Task) value of the exercise to estimate calories burned."
            }
        }
    }
}

impl FromStr for CalorieMethod {
    type Err = FitnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "heart rate-based" | "heart-rate" | "hr" => Ok(CalorieMethod::HeartRate),
            "met-based" | "met" => Ok(CalorieMethod::Met),
            _ => Err(FitnessError::unknown("calculation method", s)),
        }
    }
}

impl fmt::Display for CalorieMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The values a user enters for one workout.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutInput {
    pub gender: Gender,
    pub age: u32,
    pub height_cm: u32,
    pub weight_kg: u32,
    pub duration_min: u32,
    pub heart_rate: u32,
    pub body_temp: f64,
    pub exercise: Exercise,
}

impl Default for WorkoutInput {
    fn default() -> Self {
        WorkoutInput {
            gender: Gender::Male,
            age: 25,
            height_cm: 170,
            weight_kg: 70,
            duration_min: 30,
            heart_rate: 120,
            body_temp: 37.0,
            exercise: Exercise::Cycling,
        }
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(FitnessError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}

impl WorkoutInput {
    /// Checks every field against the ranges the entry form accepts.
    pub fn validate(&self) -> Result<()> {
        check_range("age", self.age as f64, 10.0, 150.0)?;
        check_range("height", self.height_cm as f64, 100.0, 250.0)?;
        check_range("weight", self.weight_kg as f64, 30.0, 200.0)?;
        check_range("duration", self.duration_min as f64, 5.0, 120.0)?;
        check_range("heart rate", self.heart_rate as f64, 50.0, 200.0)?;
        check_range("body temperature", self.body_temp, 35.0, 40.0)?;
        Ok(())
    }
}

/// Calories burned estimated from heart rate.
pub fn calories_heart_rate(
    gender: Gender,
    age: f64,
    weight: f64,
    heart_rate: f64,
    duration_min: f64,
) -> f64 {
    let per_min = match gender {
        Gender::Male => (age * 0.2017 + weight * 0.09036 + heart_rate * 0.6309 - 55.0969) / KJ_PER_KCAL,
        Gender::Female => (age * 0.074 + weight * 0.05741 + heart_rate * 0.4472 - 20.4022) / KJ_PER_KCAL,
    };
    round2(per_min * duration_min)
}

/// MET value for an exercise name, falling back to [`DEFAULT_MET`].
pub fn met_value(exercise: &str) -> f64 {
    exercise
        .parse::<Exercise>()
        .map(|e| e.met())
        .unwrap_or(DEFAULT_MET)
}

/// Calories burned estimated from the exercise's MET value.
pub fn calories_met(exercise: &str, weight: f64, duration_min: f64) -> f64 {
    round2(met_value(exercise) * weight * (duration_min / 60.0))
}

/// Runs the estimator selected by `method` on a workout.
///
/// ```
/// use fitness_tracker::{estimate_calories, CalorieMethod, WorkoutInput};
///
/// let input = WorkoutInput::default();
/// assert_eq!(estimate_calories(&input, CalorieMethod::HeartRate), 229.29);
/// ```
pub fn estimate_calories(input: &WorkoutInput, method: CalorieMethod) -> f64 {
    match method {
        CalorieMethod::HeartRate => calories_heart_rate(
            input.gender,
            input.age as f64,
            input.weight_kg as f64,
            input.heart_rate as f64,
            input.duration_min as f64,
        ),
        CalorieMethod::Met => calories_met(
            input.exercise.as_str(),
            input.weight_kg as f64,
            input.duration_min as f64,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn met_cycling_example() {
        assert_eq!(calories_met("Cycling", 70.0, 30.0), 210.0);
        assert_eq!(calories_met("Running", 70.0, 30.0), 350.0);
        assert_eq!(calories_met("Walking", 80.0, 45.0), 228.0);
    }

    #[test]
    fn unknown_exercise_uses_default_met() {
        assert_eq!(met_value("Swimming"), DEFAULT_MET);
        assert_eq!(calories_met("Swimming", 70.0, 30.0), 210.0);
    }

    #[test]
    fn heart_rate_male_example() {
        let per_min: f64 = (25.0 * 0.2017 + 70.0 * 0.09036 + 120.0 * 0.6309 - 55.0969) / 4.184;
        let expected = ((per_min * 30.0) * 100.0).round() / 100.0;
        let got = calories_heart_rate(Gender::Male, 25.0, 70.0, 120.0, 30.0);
        assert_eq!(got, expected);
        assert_eq!(got, 229.29);
    }

    #[test]
    fn heart_rate_female_example() {
        assert_eq!(
            calories_heart_rate(Gender::Female, 25.0, 70.0, 120.0, 30.0),
            280.57
        );
    }

    #[test]
    fn gender_parsing_is_case_insensitive_and_strict() {
        assert_eq!("male".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!("FEMALE".parse::<Gender>().unwrap(), Gender::Female);
        assert!(matches!(
            "other".parse::<Gender>(),
            Err(FitnessError::UnknownCategory { kind: "gender", .. })
        ));
    }

    #[test]
    fn exercise_and_method_parsing() {
        assert_eq!("jump rope".parse::<Exercise>().unwrap(), Exercise::JumpRope);
        assert_eq!(
            "Heart Rate-Based".parse::<CalorieMethod>().unwrap(),
            CalorieMethod::HeartRate
        );
        assert_eq!("met".parse::<CalorieMethod>().unwrap(), CalorieMethod::Met);
        assert!("Yoga".parse::<Exercise>().is_err());
    }

    #[test]
    fn display_respects_width_and_alignment() {
        assert_eq!(format!("{:<8}|", Gender::Male), "Male    |");
        assert_eq!(format!("{:>10}|", Exercise::JumpRope), " Jump Rope|");
        assert_eq!(format!("{:<10}|", CalorieMethod::Met), "MET-Based |");
        assert_eq!(Exercise::Cycling.to_string(), "Cycling");
    }

    #[test]
    fn estimate_dispatches_on_method() {
        let input = WorkoutInput::default();
        assert_eq!(estimate_calories(&input, CalorieMethod::Met), 210.0);
        assert_eq!(estimate_calories(&input, CalorieMethod::HeartRate), 229.29);
    }

    #[test]
    fn validate_enforces_form_ranges() {
        assert!(WorkoutInput::default().validate().is_ok());

        let young = WorkoutInput {
            age: 9,
            ..WorkoutInput::default()
        };
        assert!(matches!(
            young.validate(),
            Err(FitnessError::OutOfRange { field: "age", .. })
        ));

        let feverish = WorkoutInput {
            body_temp: 40.5,
            ..WorkoutInput::default()
        };
        assert!(feverish.validate().is_err());
    }
}
