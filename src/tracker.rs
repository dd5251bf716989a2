//! One tracking session: predict, then optionally save.
//!
//! Each prediction appends an exercise and a calories row under its own
//! `userid` and enables saving. Saving appends the history row, disables
//! saving again until the next prediction, and retrains the models.

use crate::bmi::{bmi, BmiStatus};
use crate::calories::{estimate_calories, CalorieMethod, WorkoutInput};
use crate::config::Config;
use crate::error::{FitnessError, Result};
use crate::store::{CaloriesRecord, ExerciseRecord, HistoryRecord, Store};
use crate::training::{train_models, ModelBundle, ModelKind, TrainingOptions};
use chrono::{Local, NaiveDateTime};
use log::{info, warn};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Short record identifier: the first eight hex digits of a random UUID.
pub fn new_userid() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Result of one prediction, with the id its rows were stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub userid: String,
    pub method: CalorieMethod,
    pub calories: f64,
    pub bmi: f64,
    pub bmi_status: BmiStatus,
}

/// What happened to the models after an entry was saved.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingStatus {
    Trained { models: usize },
    /// Not enough history; the previous bundle was left in place.
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    /// The row appended to the history table.
    pub entry: HistoryRecord,
    pub training: TrainingStatus,
}

/// Session state over a [`Store`] and the current model bundle.
pub struct Tracker {
    store: Store,
    model_path: PathBuf,
    options: TrainingOptions,
    models: Option<ModelBundle>,
    userid: String,
    pending: Option<(WorkoutInput, Prediction)>,
}

impl Tracker {
    /// Opens the data directory and loads (or trains) the model bundle.
    ///
    /// A training failure at start-up leaves the tracker without models
    /// rather than refusing to start.
    pub fn open(config: &Config) -> Result<Self> {
        let store = Store::open(&config.data_dir)?;
        let model_path = config.model_path();
        let options = config.training_options();

        let models = match ModelBundle::load_or_train(&model_path, &store, &options) {
            Ok(models) => models,
            Err(e @ FitnessError::Io(_)) => return Err(e),
            Err(e) => {
                warn!("starting without models: {e}");
                None
            }
        };

        info!("tracker opened in {}", store.dir().display());
        Ok(Tracker {
            store,
            model_path,
            options,
            models,
            userid: new_userid(),
            pending: None,
        })
    }

    /// The id the next prediction will be recorded under.
    pub fn userid(&self) -> &str {
        &self.userid
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn models(&self) -> Option<&ModelBundle> {
        self.models.as_ref()
    }

    /// Whether there is a prediction waiting to be saved.
    pub fn can_save(&self) -> bool {
        self.pending.is_some()
    }

    /// Estimates calories and BMI and records the exercise/calories pair.
    pub fn predict(&mut self, input: &WorkoutInput, method: CalorieMethod) -> Result<Prediction> {
        input.validate()?;
        let calories = estimate_calories(input, method);
        let bmi = bmi(input.weight_kg as f64, input.height_cm as f64)?;

        self.store.append_prediction(
            &ExerciseRecord::from_input(&self.userid, input),
            &CaloriesRecord {
                userid: self.userid.clone(),
                calories,
            },
        )?;

        // Each recorded pair gets its own id so the tables join one-to-one.
        let userid = std::mem::replace(&mut self.userid, new_userid());
        let prediction = Prediction {
            userid,
            method,
            calories,
            bmi,
            bmi_status: BmiStatus::classify(bmi),
        };
        self.pending = Some((input.clone(), prediction.clone()));
        Ok(prediction)
    }

    pub fn save_entry(&mut self) -> Result<SaveOutcome> {
        self.save_entry_at(Local::now().naive_local())
    }

    /// Saves the last prediction to the history table, then retrains.
    pub fn save_entry_at(&mut self, at: NaiveDateTime) -> Result<SaveOutcome> {
        let (input, prediction) = self.pending.as_ref().ok_or(FitnessError::NothingToSave)?;
        let entry = HistoryRecord {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            userid: prediction.userid.clone(),
            gender: input.gender,
            age: input.age,
            height: input.height_cm,
            weight: input.weight_kg,
            bmi: prediction.bmi,
            duration: input.duration_min,
            heart_rate: input.heart_rate,
            body_temp: input.body_temp,
            exercise: input.exercise,
            calories: prediction.calories,
            method: prediction.method,
        };
        self.store.append(&entry)?;
        self.pending = None;

        let training = match self.train() {
            Ok(Some(models)) => TrainingStatus::Trained { models },
            Ok(None) => TrainingStatus::Skipped,
            Err(e) => {
                warn!("training after save failed: {e}");
                TrainingStatus::Failed(e.to_string())
            }
        };
        Ok(SaveOutcome { entry, training })
    }

    /// Retrains on the full history and persists the bundle. Returns the
    /// number of fitted models, or `None` if training was skipped.
    pub fn train(&mut self) -> Result<Option<usize>> {
        let Some(bundle) = train_models(&self.store, &self.options)? else {
            return Ok(None);
        };
        bundle.save_to_file(&self.model_path)?;
        let count = bundle.models.len();
        self.models = Some(bundle);
        Ok(Some(count))
    }

    pub fn history(&self) -> Result<Vec<HistoryRecord>> {
        self.store.read_all()
    }

    /// Each trained model's calorie estimate for `input`, if models exist.
    pub fn model_estimates(&self, input: &WorkoutInput) -> Result<Option<BTreeMap<ModelKind, f64>>> {
        let Some(bundle) = &self.models else {
            return Ok(None);
        };
        let record = ExerciseRecord::from_input(&self.userid, input);
        bundle.predict(&record).map(Some)
    }
}
