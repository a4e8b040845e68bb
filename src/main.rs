//! fitline - Workout calendar timeline in the terminal

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use tracing_appender::{
    non_blocking,
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};

use fitline::calendar::{DateSequenceStore, WorkoutStatus};
use fitline::config::CalendarConfig;
use fitline::db::{Database, NewWorkout, WorkoutStore};
use fitline::stats::{self, SetRecord};
use fitline::timeline::CalendarTimelineController;
use fitline::tui::App;

#[derive(Parser)]
#[command(name = "fitline")]
#[command(author, version, about = "Workout calendar timeline")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct GlobalArgs {
    /// SQLite database path
    #[arg(long, env = "FITLINE_DB", default_value = "fitline.db", global = true)]
    db: String,

    /// User whose workouts are shown
    #[arg(short, long, env = "FITLINE_USER", global = true)]
    user: Option<String>,

    /// JSON file with calendar settings
    #[arg(long, env = "FITLINE_CONFIG", global = true)]
    config: Option<String>,

    /// Weeks of history loaded on start
    #[arg(long, env = "FITLINE_INITIAL_WEEKS", global = true)]
    initial_weeks: Option<u32>,

    /// Weeks prepended per history load
    #[arg(long, env = "FITLINE_LAZY_WEEKS", global = true)]
    lazy_weeks: Option<u32>,

    /// Load more history when the top row is this many days from the oldest
    #[arg(long, env = "FITLINE_LAZY_THRESHOLD", global = true)]
    threshold_days: Option<usize>,

    /// Log file for the TUI (stderr is used otherwise)
    #[arg(long, env = "FITLINE_LOG", default_value = "fitline.log", global = true)]
    log_file: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the calendar timeline
    Tui,

    /// Schedule a workout sheet
    Log {
        /// Workout name (e.g., "Push day")
        name: String,

        /// Date, YYYY-MM-DD (defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// pending, active or completed
        #[arg(short, long, default_value = "pending")]
        status: WorkoutStatus,
    },

    /// List recent workouts
    List {
        /// Number of records to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Mark a workout completed
    Done {
        /// Workout id
        id: i64,
    },

    /// Estimate a one-rep max
    OneRepMax {
        /// Weight lifted
        weight: f64,

        /// Reps performed
        reps: u32,
    },

    /// Summarize sets of one exercise
    Sets {
        /// Sets as REPSxWEIGHT (e.g., 8x70 6x80)
        #[arg(required = true)]
        sets: Vec<SetRecord>,

        /// Previous best volume, to check for a record
        #[arg(short, long)]
        previous_best: Option<f64>,
    },

    /// Print the effective calendar configuration as JSON
    Config,
}

impl GlobalArgs {
    fn calendar_config(&self) -> Result<CalendarConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("reading config {path}"))?;
                serde_json::from_str(&raw).with_context(|| format!("parsing config {path}"))?
            }
            None => CalendarConfig::default(),
        };
        if let Some(weeks) = self.initial_weeks {
            config.initial_window_weeks = weeks;
        }
        if let Some(weeks) = self.lazy_weeks {
            config.lazy_load_window_weeks = weeks;
        }
        if let Some(days) = self.threshold_days {
            config.lazy_load_threshold_days = days;
        }
        Ok(config.normalized())
    }

    fn require_user(&self) -> Result<&str> {
        self.user
            .as_deref()
            .context("no user given; pass --user or set FITLINE_USER")
    }
}

/// Directory and file name for the log; bare names land in the working directory
fn split_log_path(log_file: &str) -> (PathBuf, String) {
    let path = Path::new(log_file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = path
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or("fitline.log");
    (dir.to_path_buf(), file_name.to_string())
}

/// The returned guard flushes the log file when dropped
fn init_logging(tui: bool, log_file: &str) -> Result<Option<WorkerGuard>> {
    if !tui {
        tracing_subscriber::fmt().with_writer(std::io::stderr).init();
        return Ok(None);
    }

    // The terminal belongs to the TUI
    let (dir, file_name) = split_log_path(log_file);
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(&file_name)
        .build(dir)
        .with_context(|| format!("opening log file {log_file}"))?;
    let (writer, guard) = non_blocking(appender);
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(writer)
        .init();
    Ok(Some(guard))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let is_tui = matches!(cli.command, None | Some(Commands::Tui));
    let _log_guard = init_logging(is_tui, &cli.global.log_file)?;

    match cli.command {
        Some(Commands::Tui) | None => {
            let config = cli.global.calendar_config()?;
            let db = Database::open(&cli.global.db)?;
            let store = DateSequenceStore::new(cli.global.user.clone(), &config);
            let today = store.today();
            let controller = CalendarTimelineController::new(store, &config, today);
            let mut app = App::new(controller, WorkoutStore::new(db));
            app.run().await?;
        }

        Some(Commands::Log { name, date, status }) => {
            let db = Database::open(&cli.global.db)?;
            let workout = NewWorkout {
                user_id: cli.global.require_user()?.to_string(),
                date: date.unwrap_or_else(|| Local::now().date_naive()),
                name,
                status,
            };
            let id = db.add_workout(&workout)?;
            println!("Logged: {} on {} [{}] (id: {})", workout.name, workout.date, workout.status, id);
        }

        Some(Commands::List { limit }) => {
            let db = Database::open(&cli.global.db)?;
            let workouts = db.get_recent_workouts(cli.global.require_user()?, limit)?;
            println!("Recent workouts:");
            println!("{:-<60}", "");
            for w in &workouts {
                println!("{:>5} | {} | {:30} | {}", w.id, w.date, w.name, w.status);
            }
        }

        Some(Commands::Done { id }) => {
            let db = Database::open(&cli.global.db)?;
            db.set_status(id, WorkoutStatus::Completed)?;
            println!("Completed workout {}", id);
        }

        Some(Commands::OneRepMax { weight, reps }) => {
            let estimate = stats::estimate_one_rep_max(weight, reps);
            println!("Estimated 1RM: {:.1}", estimate);
        }

        Some(Commands::Sets { sets, previous_best }) => {
            let volume = stats::total_volume(&sets);
            println!("Sets: {}", sets.len());
            println!("Total volume: {:.1}", volume);
            if let Some(best) = stats::best_one_rep_max(&sets) {
                println!("Best estimated 1RM: {:.1}", best);
            }
            if stats::is_personal_record(volume, previous_best) {
                println!("New personal record!");
            }
        }

        Some(Commands::Config) => {
            let config = cli.global.calendar_config()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
