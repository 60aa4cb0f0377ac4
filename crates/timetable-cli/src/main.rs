//! `timetable` CLI: expand recurrence rules and check schedules for venue
//! conflicts from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Print every occurrence of a rule across a semester as JSON
//! timetable expand --rule "FREQ=WEEKLY;BYDAY=MO,WE" --start-time 09:00 \
//!     --duration 60 --from 2025-09-01 --to 2025-12-31
//!
//! # Check a create request against a store snapshot (stdin or -i)
//! timetable check -i snapshot.json
//!
//! # Check a replacement of an existing schedule
//! timetable check -i snapshot.json --update 4f0c...e21
//!
//! # Interpret wall-clock times in another zone
//! TIMETABLE_ENGINE__TIMEZONE=Africa/Lagos timetable expand ...
//! ```
//!
//! `check` exits with status 2 when the request conflicts with an existing
//! booking and 1 on any other failure.

mod settings;

use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use timetable_engine::{
    Expander, RecurrenceRule, ScheduleId, ScheduleRequest, ScheduleService, ScheduleSpec,
    Snapshot, TimetableError, VenueId,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::settings::Settings;

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFLICT: u8 = 2;

#[derive(Parser)]
#[command(
    name = "timetable",
    version,
    about = "Recurring timetable expansion and venue conflict checks"
)]
struct Cli {
    /// Configuration file (defaults to ./timetable.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Expand a recurrence rule over a date window and print the occurrences
    Expand {
        /// Recurrence rule text, e.g. "FREQ=WEEKLY;BYDAY=MO,WE"
        #[arg(long)]
        rule: String,
        /// Wall-clock start of every occurrence (HH:MM)
        #[arg(long, value_parser = parse_time)]
        start_time: NaiveTime,
        /// Length of every occurrence in minutes
        #[arg(long)]
        duration: u32,
        /// First day of the window (YYYY-MM-DD, inclusive)
        #[arg(long)]
        from: NaiveDate,
        /// Last day of the window (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to: NaiveDate,
    },
    /// Run a create (or update) against a JSON store snapshot
    Check {
        /// Snapshot file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Replace this existing schedule instead of creating a new one
        #[arg(long)]
        update: Option<ScheduleId>,
    },
}

/// A store snapshot plus the request to run against it.
#[derive(Deserialize)]
struct CheckInput {
    #[serde(flatten)]
    snapshot: Snapshot,
    request: ScheduleRequest,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(&settings.logging.level);
    tracing::debug!(settings = ?settings, "configuration loaded");

    match cli.command {
        Commands::Expand {
            rule,
            start_time,
            duration,
            from,
            to,
        } => {
            let rule: RecurrenceRule = rule.parse()?;
            let expander = Expander::from_options(&settings.engine)?;
            let spec = ScheduleSpec::new(VenueId::new(), start_time, duration, rule, from, to)?;
            let occurrences = expander.expand(&spec)?;
            println!("{}", serde_json::to_string_pretty(&occurrences)?);
        }
        Commands::Check { input, update } => {
            let raw = read_input(input.as_deref())?;
            let CheckInput { snapshot, request } =
                serde_json::from_str(&raw).context("Failed to parse snapshot JSON")?;
            let (catalog, store) = snapshot
                .into_stores()
                .context("Failed to load snapshot into the store")?;

            let service = ScheduleService::new(catalog, store, &settings.engine)?;
            let schedule = match update {
                Some(id) => service.update(id, &request)?,
                None => service.create(&request)?,
            };
            println!("{}", serde_json::to_string_pretty(&schedule)?);
        }
    }

    Ok(())
}

/// `RUST_LOG` wins over the configured level; logs go to stderr so stdout
/// stays machine-readable.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .init();
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<TimetableError>() {
        Some(TimetableError::Conflict(_)) => EXIT_CONFLICT,
        _ => EXIT_FAILURE,
    }
}

fn parse_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| format!("expected HH:MM, got '{}'", value))
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}
