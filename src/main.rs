use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fitness_tracker::{
    BmiStatus, CalorieMethod, Config, Exercise, Gender, HistoryRecord, Tracker, TrainingStatus,
    WorkoutInput,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fitness-tracker", version, about = "Personal fitness tracker")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true, default_value = "fitness.toml")]
    config: PathBuf,

    /// Directory for the CSV tables and model bundle (overrides the config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Estimate calories burned and BMI, and record the workout
    Predict {
        #[command(flatten)]
        workout: WorkoutArgs,

        /// Calculation method: "Heart Rate-Based" or "MET-Based"
        #[arg(long, default_value = "Heart Rate-Based", value_parser = parse_method)]
        method: CalorieMethod,

        /// Also save the entry to the history and retrain the models
        #[arg(long)]
        save: bool,
    },
    /// Show previously saved entries
    History,
    /// Retrain the models on the accumulated history
    Train,
    /// Show what each trained model predicts for a workout
    Models {
        #[command(flatten)]
        workout: WorkoutArgs,
    },
}

#[derive(Args)]
struct WorkoutArgs {
    #[arg(long, default_value = "Male", value_parser = parse_gender)]
    gender: Gender,
    #[arg(long, default_value_t = 25)]
    age: u32,
    /// Height in centimeters
    #[arg(long, default_value_t = 170)]
    height: u32,
    /// Weight in kilograms
    #[arg(long, default_value_t = 70)]
    weight: u32,
    /// Exercise duration in minutes
    #[arg(long, default_value_t = 30)]
    duration: u32,
    /// Heart rate in beats per minute
    #[arg(long, default_value_t = 120)]
    heart_rate: u32,
    /// Body temperature in °C
    #[arg(long, default_value_t = 37.0)]
    body_temp: f64,
    #[arg(long, default_value = "Cycling", value_parser = parse_exercise)]
    exercise: Exercise,
}

impl From<WorkoutArgs> for WorkoutInput {
    fn from(args: WorkoutArgs) -> Self {
        WorkoutInput {
            gender: args.gender,
            age: args.age,
            height_cm: args.height,
            weight_kg: args.weight,
            duration_min: args.duration,
            heart_rate: args.heart_rate,
            body_temp: args.body_temp,
            exercise: args.exercise,
        }
    }
}

fn parse_gender(s: &str) -> Result<Gender, String> {
    s.parse().map_err(|e: fitness_tracker::FitnessError| e.to_string())
}

fn parse_exercise(s: &str) -> Result<Exercise, String> {
    s.parse().map_err(|e: fitness_tracker::FitnessError| e.to_string())
}

fn parse_method(s: &str) -> Result<CalorieMethod, String> {
    s.parse().map_err(|e: fitness_tracker::FitnessError| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    let mut tracker = Tracker::open(&config)
        .with_context(|| format!("failed to open data in {}", config.data_dir.display()))?;

    match cli.command {
        Command::Predict {
            workout,
            method,
            save,
        } => {
            let input = WorkoutInput::from(workout);
            println!("ℹ️  {method}: {}", method.description());

            let prediction = tracker.predict(&input, method).context("prediction failed")?;
            println!("🔹 Your unique user ID: {}", prediction.userid);
            print_inputs(&prediction.userid, &input, method);
            println!("🔥 Estimated calories burned: {:.2} kcal", prediction.calories);
            let status = match prediction.bmi_status {
                BmiStatus::Healthy => "healthy",
                BmiStatus::Unhealthy => "outside the healthy range",
            };
            println!("⚖️  BMI: {:.2} ({status})", prediction.bmi);

            if save {
                let outcome = tracker.save_entry().context("saving entry failed")?;
                println!("💾 Entry saved at {}", outcome.entry.timestamp);
                match outcome.training {
                    TrainingStatus::Trained { models } => println!("🧠 Retrained {models} models"),
                    TrainingStatus::Skipped => println!("🧠 Not enough history to train models yet"),
                    TrainingStatus::Failed(reason) => println!("⚠️  Model training failed: {reason}"),
                }
            }
        }
        Command::History => {
            let history = tracker.history().context("failed to read history")?;
            if history.is_empty() {
                println!("⚠️  No previous entries found.");
            } else {
                print_history(&history);
            }
        }
        Command::Train => match tracker.train().context("training failed")? {
            Some(models) => println!("💾 Trained and saved {models} models"),
            None => println!("🧠 Not enough history to train models yet"),
        },
        Command::Models { workout } => {
            let input = WorkoutInput::from(workout);
            input.validate()?;
            match tracker.model_estimates(&input)? {
                Some(estimates) => {
                    if let Some(evaluation) = tracker.models().and_then(|m| m.evaluation.as_ref()) {
                        println!("Holdout rows: {}", evaluation.holdout_rows);
                    }
                    for (kind, kcal) in estimates {
                        let rmse = tracker
                            .models()
                            .and_then(|m| m.evaluation.as_ref())
                            .and_then(|e| e.rmse.get(&kind))
                            .map(|r| format!(" (holdout RMSE {r:.2})"))
                            .unwrap_or_default();
                        println!("{:>18} | {kcal:>8.2} kcal{rmse}", kind.name());
                    }
                }
                None => println!("⚠️  No trained models available."),
            }
        }
    }

    Ok(())
}

fn print_inputs(userid: &str, input: &WorkoutInput, method: CalorieMethod) {
    let rows = [
        ("User ID", userid.to_string()),
        ("Gender", input.gender.to_string()),
        ("Age", input.age.to_string()),
        ("Height (cm)", input.height_cm.to_string()),
        ("Weight (kg)", input.weight_kg.to_string()),
        ("Duration (minutes)", input.duration_min.to_string()),
        ("Heart Rate (bpm)", input.heart_rate.to_string()),
        ("Body Temperature (°C)", input.body_temp.to_string()),
        ("Exercise Type", input.exercise.to_string()),
        ("Calculation Method", method.to_string()),
    ];

    println!("📝 User inputs");
    for (parameter, value) in rows {
        println!("{parameter:>22} | {value}");
    }
}

fn print_history(history: &[HistoryRecord]) {
    println!("📊 Previous entries");
    println!(
        "{:<19} | {:<8} | {:<6} | {:>3} | {:>4} | {:>4} | {:>6} | {:>4} | {:>4} | {:>5} | {:<9} | {:>8} | {}",
        "DateTime", "Userid", "Gender", "Age", "cm", "kg", "BMI", "min", "bpm", "°C", "Exercise", "kcal", "Method"
    );
    for h in history {
        println!(
            "{:<19} | {:<8} | {:<6} | {:>3} | {:>4} | {:>4} | {:>6.2} | {:>4} | {:>4} | {:>5.1} | {:<9} | {:>8.2} | {}",
            h.timestamp,
            h.userid,
            h.gender,
            h.age,
            h.height,
            h.weight,
            h.bmi,
            h.duration,
            h.heart_rate,
            h.body_temp,
            h.exercise,
            h.calories,
            h.method
        );
    }
}
