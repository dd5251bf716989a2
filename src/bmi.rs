use crate::error::{FitnessError, Result};
use crate::round2;

/// Lower and upper bounds of the healthy BMI band, inclusive.
pub const HEALTHY_BMI: (f64, f64) = (18.5, 24.9);

/// Body Mass Index from weight in kilograms and height in centimeters,
/// rounded to two decimals.
///
/// Height must be positive; a zero or negative height is rejected rather
/// than producing an infinite or negative BMI.
pub fn bmi(weight_kg: f64, height_cm: f64) -> Result<f64> {
    if !height_cm.is_finite() || height_cm <= 0.0 {
        return Err(FitnessError::InvalidMeasurement {
            field: "height",
            value: height_cm,
        });
    }
    if !weight_kg.is_finite() {
        return Err(FitnessError::InvalidMeasurement {
            field: "weight",
            value: weight_kg,
        });
    }
    let height_m = height_cm / 100.0;
    Ok(round2(weight_kg / (height_m * height_m)))
}

/// Whether a BMI falls inside [`HEALTHY_BMI`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BmiStatus {
    Healthy,
    Unhealthy,
}

impl BmiStatus {
    /// Both bounds count as healthy.
    pub fn classify(bmi: f64) -> Self {
        let (low, high) = HEALTHY_BMI;
        if (low..=high).contains(&bmi) {
            BmiStatus::Healthy
        } else {
            BmiStatus::Unhealthy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_rounded_bmi() {
        assert_eq!(bmi(70.0, 170.0).unwrap(), 24.22);
        assert_eq!(bmi(80.0, 180.0).unwrap(), 24.69);
    }

    #[test]
    fn rejects_non_positive_height() {
        assert!(matches!(
            bmi(70.0, 0.0),
            Err(FitnessError::InvalidMeasurement { field: "height", .. })
        ));
        assert!(bmi(70.0, -170.0).is_err());
        assert!(bmi(70.0, f64::NAN).is_err());
    }

    #[test]
    fn classifies_healthy_band() {
        assert_eq!(BmiStatus::classify(18.5), BmiStatus::Healthy);
        assert_eq!(BmiStatus::classify(24.9), BmiStatus::Healthy);
        assert_eq!(BmiStatus::classify(18.49), BmiStatus::Unhealthy);
        assert_eq!(BmiStatus::classify(25.0), BmiStatus::Unhealthy);
    }
}
