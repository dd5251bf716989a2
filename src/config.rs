//! Tracker configuration, read from an optional TOML file.
//!
//! ```toml
//! data_dir = "/home/me/fitness"
//! model_file = "models.msgpack"
//!
//! [training]
//! test_ratio = 0.2
//! seed = 42
//! holdout_min_rows = 10
//! forest_trees = 100
//! ```

use crate::error::{FitnessError, Result};
use crate::forest::RandomForestParams;
use crate::training::TrainingOptions;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Settings read from `fitness.toml`. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the CSV tables and the model bundle
    pub data_dir: PathBuf,
    /// Model bundle file name, relative to `data_dir`
    pub model_file: String,
    pub training: TrainingConfig,
}

/// The `[training]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_ratio: f64,
    pub seed: u64,
    pub holdout_min_rows: usize,
    pub forest_trees: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("."),
            model_file: "models.msgpack".to_string(),
            training: TrainingConfig::default(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let options = TrainingOptions::default();
        TrainingConfig {
            test_ratio: options.test_ratio,
            seed: options.seed,
            holdout_min_rows: options.holdout_min_rows,
            forest_trees: 100,
        }
    }
}

impl Config {
    /// Reads the file at `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                return Ok(Config::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let ratio = self.training.test_ratio;
        if !(0.0..1.0).contains(&ratio) {
            return Err(FitnessError::Config(format!(
                "training.test_ratio must be in [0, 1), got {ratio}"
            )));
        }
        if self.training.forest_trees == 0 {
            return Err(FitnessError::Config(
                "training.forest_trees must be at least 1".to_string(),
            ));
        }
        if self.model_file.trim().is_empty() {
            return Err(FitnessError::Config("model_file must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn model_path(&self) -> PathBuf {
        self.data_dir.join(&self.model_file)
    }

    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            test_ratio: self.training.test_ratio,
            seed: self.training.seed,
            holdout_min_rows: self.training.holdout_min_rows,
            forest: RandomForestParams::default()
                .n_trees(self.training.forest_trees)
                .seed(self.training.seed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.model_path(), PathBuf::from("./models.msgpack"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fitness.toml");
        fs::write(&path, "data_dir = \"/tmp/fit\"\n[training]\nforest_trees = 10\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/fit"));
        assert_eq!(config.training.forest_trees, 10);
        assert_eq!(config.training.seed, 42);
        assert_eq!(config.model_file, "models.msgpack");
    }

    #[test]
    fn rejects_bad_ratio_and_syntax() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fitness.toml");

        fs::write(&path, "[training]\ntest_ratio = 1.5\n").unwrap();
        assert!(matches!(Config::load(&path), Err(FitnessError::Config(_))));

        fs::write(&path, "data_dir = [").unwrap();
        assert!(matches!(Config::load(&path), Err(FitnessError::Config(_))));
    }
}
