//! Append-only CSV tables backing the tracker.
//!
//! Each table is a flat CSV file whose header is written once, when the file
//! is first created or found empty. Rows are only ever appended. The exercise
//! and calories rows of one prediction are appended as a pair under a small
//! journal so that a crash between the two writes can be rolled back.

use crate::calories::{CalorieMethod, Exercise, Gender, WorkoutInput};
use crate::error::Result;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Records the table lengths before a paired append.
pub const JOURNAL_FILE: &str = "prediction.journal";

/// A CSV-backed table with a fixed file name and column set.
pub trait Table: Serialize + DeserializeOwned {
    const FILE_NAME: &'static str;
    const COLUMNS: &'static [&'static str];
}

/// Exercise parameters captured on each prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseRecord {
    pub userid: String,
    pub gender: Gender,
    pub age: u32,
    pub height: u32,
    pub weight: u32,
    pub duration: u32,
    pub heart_rate: u32,
    pub body_temp: f64,
    pub exercise: Exercise,
}

impl ExerciseRecord {
    pub fn from_input(userid: &str, input: &WorkoutInput) -> Self {
        ExerciseRecord {
            userid: userid.to_string(),
            gender: input.gender,
            age: input.age,
            height: input.height_cm,
            weight: input.weight_kg,
            duration: input.duration_min,
            heart_rate: input.heart_rate,
            body_temp: input.body_temp,
            exercise: input.exercise,
        }
    }
}

impl Table for ExerciseRecord {
    const FILE_NAME: &'static str = "exercise.csv";
    const COLUMNS: &'static [&'static str] = &[
        "userid",
        "gender",
        "age",
        "height",
        "weight",
        "duration",
        "heart_rate",
        "body_temp",
        "exercise",
    ];
}

/// Calorie estimate of a prediction, keyed by the same `userid`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaloriesRecord {
    pub userid: String,
    pub calories: f64,
}

impl Table for CaloriesRecord {
    const FILE_NAME: &'static str = "calories.csv";
    const COLUMNS: &'static [&'static str] = &["userid", "calories"];
}

/// A saved entry as shown in the history table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// `YYYY-MM-DD HH:MM:SS`
    #[serde(rename = "DateTime")]
    pub timestamp: String,
    #[serde(rename = "Userid")]
    pub userid: String,
    #[serde(rename = "Gender")]
    pub gender: Gender,
    #[serde(rename = "Age")]
    pub age: u32,
    #[serde(rename = "Height (cm)")]
    pub height: u32,
    #[serde(rename = "Weight (Kg)")]
    pub weight: u32,
    #[serde(rename = "BMI")]
    pub bmi: f64,
    #[serde(rename = "Duration (min)")]
    pub duration: u32,
    #[serde(rename = "Heart Rate (bpm)")]
    pub heart_rate: u32,
    #[serde(rename = "Body Temperature (°C)")]
    pub body_temp: f64,
    #[serde(rename = "Exercise")]
    pub exercise: Exercise,
    #[serde(rename = "Calories (kcal)")]
    pub calories: f64,
    #[serde(rename = "Method")]
    pub method: CalorieMethod,
}

impl Table for HistoryRecord {
    const FILE_NAME: &'static str = "history.csv";
    const COLUMNS: &'static [&'static str] = &[
        "DateTime",
        "Userid",
        "Gender",
        "Age",
        "Height (cm)",
        "Weight (Kg)",
        "BMI",
        "Duration (min)",
        "Heart Rate (bpm)",
        "Body Temperature (°C)",
        "Exercise",
        "Calories (kcal)",
        "Method",
    ];
}

fn file_len(path: &Path) -> io::Result<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e),
    }
}

/// The data directory holding the three tables.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    /// Opens (creating if needed) the data directory, rolls back any
    /// interrupted paired append and makes sure every table has its header.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let store = Store { dir: dir.into() };
        fs::create_dir_all(&store.dir)?;
        store.recover()?;
        store.initialize()?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of<T: Table>(&self) -> PathBuf {
        self.dir.join(T::FILE_NAME)
    }

    /// Writes a header-only file for every table that is missing or empty.
    pub fn initialize(&self) -> Result<()> {
        self.initialize_table::<ExerciseRecord>()?;
        self.initialize_table::<CaloriesRecord>()?;
        self.initialize_table::<HistoryRecord>()?;
        Ok(())
    }

    /// Returns `true` when the header was written, `false` if the table
    /// already had content.
    pub fn initialize_table<T: Table>(&self) -> Result<bool> {
        let path = self.path_of::<T>();
        if file_len(&path)? > 0 {
            return Ok(false);
        }
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(T::COLUMNS)?;
        writer.flush()?;
        debug!("created {}", path.display());
        Ok(true)
    }

    /// Appends one row, writing the header first if the file is empty.
    pub fn append<T: Table>(&self, row: &T) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_of::<T>())?;
        let needs_header = file.metadata()?.len() == 0;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if needs_header {
            writer.write_record(T::COLUMNS)?;
        }
        writer.serialize(row)?;
        writer.flush()?;
        Ok(())
    }

    /// Reads every data row. A missing or empty file has no rows.
    pub fn read_all<T: Table>(&self) -> Result<Vec<T>> {
        let path = self.path_of::<T>();
        if file_len(&path)? == 0 {
            return Ok(Vec::new());
        }
        let mut rdr = csv::Reader::from_path(&path)?;
        let mut rows = Vec::new();
        for result in rdr.deserialize() {
            rows.push(result?);
        }
        Ok(rows)
    }

    /// Appends the exercise and calories rows of one prediction as a unit.
    ///
    /// If either append fails, both tables are rolled back before the error
    /// is returned. If the process dies in between, the next [`Store::open`]
    /// performs the rollback.
    pub fn append_prediction(
        &self,
        exercise: &ExerciseRecord,
        calories: &CaloriesRecord,
    ) -> Result<()> {
        let journal = self.dir.join(JOURNAL_FILE);
        let marks = format!(
            "{} {}\n{} {}\n",
            ExerciseRecord::FILE_NAME,
            file_len(&self.path_of::<ExerciseRecord>())?,
            CaloriesRecord::FILE_NAME,
            file_len(&self.path_of::<CaloriesRecord>())?,
        );
        {
            let mut file = File::create(&journal)?;
            file.write_all(marks.as_bytes())?;
            file.sync_all()?;
        }

        if let Err(err) = self.append(exercise).and_then(|_| self.append(calories)) {
            if let Err(rollback) = self.recover() {
                warn!("rollback after failed append also failed: {rollback}");
            }
            return Err(err);
        }

        fs::remove_file(&journal)?;
        Ok(())
    }

    /// Rolls back an interrupted paired append. Returns `true` if a journal
    /// was found.
    pub fn recover(&self) -> Result<bool> {
        let journal = self.dir.join(JOURNAL_FILE);
        let contents = match fs::read_to_string(&journal) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        match parse_journal(&contents) {
            Some(marks) => {
                for (name, len) in marks {
                    let path = self.dir.join(name);
                    if file_len(&path)? > len {
                        warn!("rolling back incomplete append to {}", path.display());
                        OpenOptions::new().write(true).open(&path)?.set_len(len)?;
                    }
                }
            }
            // Written before either append, so nothing to undo.
            None => warn!("discarding unreadable {}", journal.display()),
        }

        fs::remove_file(&journal)?;
        Ok(true)
    }
}

fn parse_journal(contents: &str) -> Option<Vec<(&'static str, u64)>> {
    let mut marks = Vec::new();
    for line in contents.lines() {
        let (name, len) = line.split_once(' ')?;
        let name = [ExerciseRecord::FILE_NAME, CaloriesRecord::FILE_NAME]
            .into_iter()
            .find(|known| *known == name)?;
        marks.push((name, len.trim().parse().ok()?));
    }
    let complete = marks.len() == 2
        && [ExerciseRecord::FILE_NAME, CaloriesRecord::FILE_NAME]
            .iter()
            .all(|name| marks.iter().any(|(seen, _)| seen == name));
    complete.then_some(marks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise_row(userid: &str) -> ExerciseRecord {
        ExerciseRecord {
            userid: userid.to_string(),
            gender: Gender::Female,
            age: 31,
            height: 165,
            weight: 58,
            duration: 40,
            heart_rate: 135,
            body_temp: 37.4,
            exercise: Exercise::JumpRope,
        }
    }

    fn line_count(path: &Path) -> usize {
        fs::read_to_string(path).unwrap().lines().count()
    }

    #[test]
    fn initialize_writes_header_once() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.initialize().unwrap();
        assert!(!store.initialize_table::<HistoryRecord>().unwrap());

        let exercise = fs::read_to_string(store.path_of::<ExerciseRecord>()).unwrap();
        assert_eq!(
            exercise,
            "userid,gender,age,height,weight,duration,heart_rate,body_temp,exercise\n"
        );
        let history = fs::read_to_string(store.path_of::<HistoryRecord>()).unwrap();
        assert!(history.contains("Body Temperature (°C)"));
        assert_eq!(history.lines().count(), 1);
    }

    #[test]
    fn empty_file_gets_header() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CaloriesRecord::FILE_NAME), "").unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert_eq!(
            fs::read_to_string(store.path_of::<CaloriesRecord>()).unwrap(),
            "userid,calories\n"
        );
    }

    #[test]
    fn append_writes_header_on_first_write_only() {
        let dir = tempdir().unwrap();
        let store = Store { dir: dir.path().to_path_buf() };
        for i in 0..3 {
            store
                .append(&CaloriesRecord {
                    userid: format!("u{i}"),
                    calories: 100.5,
                })
                .unwrap();
        }
        let contents = fs::read_to_string(store.path_of::<CaloriesRecord>()).unwrap();
        assert_eq!(contents, "userid,calories\nu0,100.5\nu1,100.5\nu2,100.5\n");
    }

    #[test]
    fn read_all_round_trips_rows() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert!(store.read_all::<ExerciseRecord>().unwrap().is_empty());

        store.append(&exercise_row("abc12345")).unwrap();
        let rows = store.read_all::<ExerciseRecord>().unwrap();
        assert_eq!(rows, vec![exercise_row("abc12345")]);
    }

    #[test]
    fn paired_append_leaves_no_journal() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store
            .append_prediction(
                &exercise_row("pair0001"),
                &CaloriesRecord {
                    userid: "pair0001".into(),
                    calories: 321.0,
                },
            )
            .unwrap();
        assert!(!dir.path().join(JOURNAL_FILE).exists());
        assert_eq!(line_count(&store.path_of::<ExerciseRecord>()), 2);
        assert_eq!(line_count(&store.path_of::<CaloriesRecord>()), 2);
    }

    #[test]
    fn open_rolls_back_interrupted_pair() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let header_len = fs::metadata(store.path_of::<ExerciseRecord>()).unwrap().len();
        let calories_len = fs::metadata(store.path_of::<CaloriesRecord>()).unwrap().len();

        // Simulate a crash after the exercise row but before the calories row.
        fs::write(
            dir.path().join(JOURNAL_FILE),
            format!("exercise.csv {header_len}\ncalories.csv {calories_len}\n"),
        )
        .unwrap();
        store.append(&exercise_row("crashed1")).unwrap();

        let reopened = Store::open(dir.path()).unwrap();
        assert!(reopened.read_all::<ExerciseRecord>().unwrap().is_empty());
        assert!(!dir.path().join(JOURNAL_FILE).exists());
    }

    #[test]
    fn unreadable_journal_is_discarded() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.append(&exercise_row("kept0001")).unwrap();
        fs::write(dir.path().join(JOURNAL_FILE), "exercise.csv").unwrap();

        assert!(store.recover().unwrap());
        assert_eq!(store.read_all::<ExerciseRecord>().unwrap().len(), 1);
    }

    #[test]
    fn journal_rejects_unknown_files() {
        assert!(parse_journal("../etc/passwd 0\ncalories.csv 10\n").is_none());
        assert_eq!(
            parse_journal("exercise.csv 5\ncalories.csv 10\n"),
            Some(vec![("exercise.csv", 5), ("calories.csv", 10)])
        );
    }

    #[test]
    fn journal_needs_both_tables() {
        assert!(parse_journal("exercise.csv 5\nexercise.csv 9\n").is_none());
        assert!(parse_journal("calories.csv 5\ncalories.csv 9\n").is_none());
        assert!(parse_journal("exercise.csv 5\n").is_none());
    }

    #[test]
    fn duplicate_journal_entry_is_discarded_on_open() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.append(&exercise_row("kept0001")).unwrap();
        fs::write(
            dir.path().join(JOURNAL_FILE),
            "exercise.csv 5\nexercise.csv 9\n",
        )
        .unwrap();

        let reopened = Store::open(dir.path()).unwrap();
        assert!(!dir.path().join(JOURNAL_FILE).exists());
        assert_eq!(reopened.read_all::<ExerciseRecord>().unwrap().len(), 1);
    }
}
