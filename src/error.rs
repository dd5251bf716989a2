//! Unified error type for the fitness tracker.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FitnessError {
    /// I/O operation errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// CSV read/write errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to encode model bundle: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode model bundle: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("linear regression failed: {0}")]
    Linear(#[from] linfa_linear::LinearError<f64>),

    #[error("support vector regression failed: {0}")]
    Svm(#[from] linfa_svm::SvmError),

    #[error("model fitting failed: {0}")]
    Linfa(#[from] linfa::Error),

    /// A measurement that makes a formula undefined (e.g. zero height)
    #[error("invalid {field}: {value}")]
    InvalidMeasurement { field: &'static str, value: f64 },

    /// A form value outside the accepted range
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    /// A categorical value that is not one of the supported variants
    #[error("unknown {kind}: {value:?}")]
    UnknownCategory { kind: &'static str, value: String },

    #[error("no prediction to save; run a prediction first")]
    NothingToSave,

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, FitnessError>;

impl FitnessError {
    pub fn unknown(kind: &'static str, value: impl Into<String>) -> Self {
        FitnessError::UnknownCategory {
            kind,
            value: value.into(),
        }
    }
}

impl From<toml::de::Error> for FitnessError {
    fn from(err: toml::de::Error) -> Self {
        FitnessError::Config(err.to_string())
    }
}
