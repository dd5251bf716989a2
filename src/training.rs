//! Regression models trained on the accumulated exercise history.
//!
//! The exercise and calories tables are inner-joined on `userid`, the two
//! categorical columns are encoded with a fixed mapping, and three regressors
//! are fit to predict calories. The fitted models travel together in a
//! [`ModelBundle`] persisted as MessagePack.

use crate::calories::{Exercise, Gender};
use crate::error::{FitnessError, Result};
use crate::forest::{RandomForest, RandomForestParams};
use crate::linear::LinearRegressor;
use crate::store::{CaloriesRecord, ExerciseRecord, Store};
use linfa::prelude::*;
use linfa_svm::Svm;
use log::{debug, info, warn};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rmp_serde::{decode::from_read, encode::write_named};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Bumped whenever the category-to-code mapping changes.
pub const ENCODING_VERSION: u32 = 1;

/// Fewer joined rows than this and training is skipped.
pub const MIN_TRAINING_ROWS: usize = 2;

/// Feature columns in the order they appear in the design matrix.
pub const FEATURE_NAMES: [&str; 8] = [
    "gender",
    "age",
    "height",
    "weight",
    "duration",
    "heart_rate",
    "body_temp",
    "exercise",
];

/// Category-to-code mapping for the categorical features.
///
/// Codes follow the alphabetical order of the full category set, so they do
/// not shift when a category first shows up in the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoding {
    pub version: u32,
    pub gender: BTreeMap<String, usize>,
    pub exercise: BTreeMap<String, usize>,
}

impl CategoryEncoding {
    pub fn current() -> Self {
        let codes = |names: Vec<&str>| -> BTreeMap<String, usize> {
            let mut names = names;
            names.sort_unstable();
            names
                .into_iter()
                .enumerate()
                .map(|(code, name)| (name.to_string(), code))
                .collect()
        };

        CategoryEncoding {
            version: ENCODING_VERSION,
            gender: codes(vec![Gender::Male.as_str(), Gender::Female.as_str()]),
            exercise: codes(Exercise::ALL.iter().map(|e| e.as_str()).collect()),
        }
    }

    fn code(map: &BTreeMap<String, usize>, kind: &'static str, value: &str) -> Result<f64> {
        map.get(value)
            .map(|&code| code as f64)
            .ok_or_else(|| FitnessError::unknown(kind, value))
    }

    /// Feature vector for one exercise row, in [`FEATURE_NAMES`] order.
    pub fn encode(&self, record: &ExerciseRecord) -> Result<[f64; 8]> {
        Ok([
            Self::code(&self.gender, "gender", record.gender.as_str())?,
            record.age as f64,
            record.height as f64,
            record.weight as f64,
            record.duration as f64,
            record.heart_rate as f64,
            record.body_temp,
            Self::code(&self.exercise, "exercise", record.exercise.as_str())?,
        ])
    }
}

/// The regressors fit on every training pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    RandomForest,
    #[serde(rename = "SVM")]
    Svm,
    LinearRegression,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [
        ModelKind::RandomForest,
        ModelKind::Svm,
        ModelKind::LinearRegression,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "RandomForest",
            ModelKind::Svm => "SVM",
            ModelKind::LinearRegression => "LinearRegression",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// A fitted regressor of one of the supported kinds.
#[derive(Serialize, Deserialize)]
pub enum TrainedModel {
    RandomForest(RandomForest),
    Svm(Svm<f64, f64>),
    LinearRegression(LinearRegressor),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::Svm(_) => ModelKind::Svm,
            TrainedModel::LinearRegression(_) => ModelKind::LinearRegression,
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Array1<f64> {
        match self {
            TrainedModel::RandomForest(model) => model.predict(x),
            TrainedModel::Svm(model) => model.predict(x),
            TrainedModel::LinearRegression(model) => model.predict(x),
        }
    }
}

/// Root-mean-squared error of each model on the held-out rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub holdout_rows: usize,
    pub rmse: BTreeMap<ModelKind, f64>,
}

/// Knobs for a training pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOptions {
    /// Share of rows held out for scoring.
    pub test_ratio: f64,
    /// Seed of the holdout shuffle.
    pub seed: u64,
    /// Below this many joined rows nothing is held out.
    pub holdout_min_rows: usize,
    pub forest: RandomForestParams,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        TrainingOptions {
            test_ratio: 0.2,
            seed: 42,
            holdout_min_rows: 10,
            forest: RandomForestParams::default(),
        }
    }
}

/// The fitted models of one training pass, with the encoding they expect.
#[derive(Serialize, Deserialize)]
pub struct ModelBundle {
    pub encoding: CategoryEncoding,
    pub models: BTreeMap<ModelKind, TrainedModel>,
    pub trained_rows: usize,
    pub evaluation: Option<Evaluation>,
}

impl ModelBundle {
    /// True when the bundle was encoded with a different category mapping.
    pub fn is_stale(&self) -> bool {
        self.encoding != CategoryEncoding::current()
    }

    /// Calorie estimate of every model for one exercise row.
    pub fn predict(&self, record: &ExerciseRecord) -> Result<BTreeMap<ModelKind, f64>> {
        let row = self.encoding.encode(record)?;
        let x = Array2::from_shape_vec((1, row.len()), row.to_vec())
            .map_err(linfa::Error::from)?;
        Ok(self
            .models
            .iter()
            .map(|(kind, model)| (*kind, model.predict(&x)[0]))
            .collect())
    }

    /// Saves the bundle to a binary `.msgpack` file, replacing any previous one.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write_named(&mut writer, self)?;
        writer.flush()?;
        info!("saved {} models to {}", self.models.len(), path.display());
        Ok(())
    }

    /// Loads the bundle from a binary `.msgpack` file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(from_read(reader)?)
    }

    /// Loads a saved bundle, or trains and saves a fresh one when the file is
    /// missing, empty, unreadable or encoded with an outdated mapping.
    ///
    /// Returns `None` when there is no usable bundle and too little history
    /// to train one.
    pub fn load_or_train(
        model_path: &Path,
        store: &Store,
        options: &TrainingOptions,
    ) -> Result<Option<Self>> {
        let has_file = fs::metadata(model_path).map(|m| m.len() > 0).unwrap_or(false);
        if has_file {
            match Self::load_from_file(model_path) {
                Ok(bundle) if !bundle.is_stale() => {
                    info!("loaded models from {}", model_path.display());
                    return Ok(Some(bundle));
                }
                Ok(_) => warn!("{} uses an outdated encoding, retraining", model_path.display()),
                Err(e) => warn!("could not load {}: {e}, retraining", model_path.display()),
            }
        }

        let bundle = train_models(store, options)?;
        if let Some(bundle) = &bundle {
            bundle.save_to_file(model_path)?;
        }
        Ok(bundle)
    }
}

/// Inner join of exercise and calories rows on `userid`.
///
/// Every matching pair is kept, in exercise-table order; rows without a
/// partner are dropped.
pub fn join_history(
    exercise: &[ExerciseRecord],
    calories: &[CaloriesRecord],
) -> Vec<(ExerciseRecord, f64)> {
    let mut by_user: HashMap<&str, Vec<f64>> = HashMap::new();
    for row in calories {
        by_user.entry(row.userid.as_str()).or_default().push(row.calories);
    }

    exercise
        .iter()
        .flat_map(|row| {
            by_user
                .get(row.userid.as_str())
                .into_iter()
                .flatten()
                .map(move |&kcal| (row.clone(), kcal))
        })
        .collect()
}

/// Trains the three regressors on the stored history.
///
/// Returns `Ok(None)` without touching anything when either table is empty
/// or fewer than [`MIN_TRAINING_ROWS`] rows join.
pub fn train_models(store: &Store, options: &TrainingOptions) -> Result<Option<ModelBundle>> {
    let exercise = store.read_all::<ExerciseRecord>()?;
    let calories = store.read_all::<CaloriesRecord>()?;
    if exercise.is_empty() || calories.is_empty() {
        info!("no history yet, skipping training");
        return Ok(None);
    }

    let joined = join_history(&exercise, &calories);
    train_on(&joined, options)
}

/// Trains on already-joined rows.
pub fn train_on(joined: &[(ExerciseRecord, f64)], options: &TrainingOptions) -> Result<Option<ModelBundle>> {
    if joined.len() < MIN_TRAINING_ROWS {
        info!(
            "{} joined rows, need at least {MIN_TRAINING_ROWS} to train",
            joined.len()
        );
        return Ok(None);
    }

    let encoding = CategoryEncoding::current();
    let mut features = Vec::with_capacity(joined.len() * FEATURE_NAMES.len());
    for (record, _) in joined {
        features.extend(encoding.encode(record)?);
    }
    let x = Array2::from_shape_vec((joined.len(), FEATURE_NAMES.len()), features)
        .map_err(linfa::Error::from)?;
    let y: Array1<f64> = joined.iter().map(|(_, kcal)| *kcal).collect();

    let (train_idx, test_idx) = holdout_split(joined.len(), options);
    let train = Dataset::new(x.select(Axis(0), &train_idx), y.select(Axis(0), &train_idx));

    info!("training models on {} rows", train_idx.len());
    let mut models = BTreeMap::new();
    let forest = options.forest.fit(&train)?;
    models.insert(ModelKind::RandomForest, TrainedModel::RandomForest(forest));

    let svm = Svm::<f64, f64>::params()
        .c_svr(1.0, Some(0.1))
        .gaussian_kernel(rbf_eps(train.records()))
        .fit(&train)?;
    models.insert(ModelKind::Svm, TrainedModel::Svm(svm));

    let linear = LinearRegressor::params().fit(&train)?;
    models.insert(ModelKind::LinearRegression, TrainedModel::LinearRegression(linear));

    let evaluation = (!test_idx.is_empty()).then(|| {
        let x_test = x.select(Axis(0), &test_idx);
        let y_test = y.select(Axis(0), &test_idx);
        let rmse = models
            .iter()
            .map(|(kind, model)| {
                let err = root_mean_squared_error(&model.predict(&x_test), &y_test);
                debug!("{kind} holdout RMSE {err:.3}");
                (*kind, err)
            })
            .collect();
        Evaluation {
            holdout_rows: test_idx.len(),
            rmse,
        }
    });

    Ok(Some(ModelBundle {
        encoding,
        models,
        trained_rows: train_idx.len(),
        evaluation,
    }))
}

/// Seeded split into (train, test) row indices. Small histories are not
/// split at all, and at least [`MIN_TRAINING_ROWS`] rows always stay in the
/// training set.
pub fn holdout_split(n: usize, options: &TrainingOptions) -> (Vec<usize>, Vec<usize>) {
    let mut idx: Vec<usize> = (0..n).collect();
    if n < options.holdout_min_rows {
        return (idx, Vec::new());
    }

    idx.shuffle(&mut StdRng::seed_from_u64(options.seed));
    let test_size = ((n as f64) * options.test_ratio).ceil() as usize;
    let test_size = test_size.min(n.saturating_sub(MIN_TRAINING_ROWS));
    let train = idx.split_off(test_size);
    (train, idx)
}

/// Gaussian kernel width matching `gamma = 1 / (n_features * var(X))`.
fn rbf_eps(x: &Array2<f64>) -> f64 {
    let n_features = x.ncols() as f64;
    let var = x.var(0.0);
    if var.is_finite() && var > 0.0 {
        n_features * var
    } else {
        n_features
    }
}

fn root_mean_squared_error(pred: &Array1<f64>, truth: &Array1<f64>) -> f64 {
    let mse = (pred - truth).mapv(|d| d * d).mean().unwrap_or(0.0);
    mse.sqrt()
}
