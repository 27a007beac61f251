//! Stepwriter CLI - Command-line interface for the Stepwriter step tracker
//!
//! Commands:
//! - metrics: Compute distance, energy and pace for a step total
//! - replay: Run recorded accelerometer samples through the tracker
//! - profiles: List activity profiles
//! - summary: Summarise a week of stored day records
//! - doctor: Diagnose configuration and environment

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use stepwriter::activity::{ActivityKind, ActivityProfile};
use stepwriter::config::TrackerConfig;
use stepwriter::device::StaticProbe;
use stepwriter::history::WeeklySummary;
use stepwriter::metrics::{self, MetricsRequest};
use stepwriter::store::{MemoryStepStore, RemoteStepRecord};
use stepwriter::sync::{self, PushDisposition, SyncCoordinator};
use stepwriter::tracker::StepTracker;
use stepwriter::types::{BodyParams, Gender, SampleVector, TrackerState, UserId};
use stepwriter::{TrackerError, PRODUCER_NAME, STEPWRITER_VERSION};

/// Stepwriter - motion-derived step tracking
#[derive(Parser)]
#[command(name = "stepwriter")]
#[command(version = STEPWRITER_VERSION)]
#[command(about = "Count steps from accelerometer data and derive walking metrics", long_about = None)]
struct Cli {
    /// Tracker configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute metrics for a step total
    Metrics {
        /// Total steps
        #[arg(short, long)]
        steps: u32,

        /// Active time in seconds
        #[arg(long, default_value = "0")]
        active_seconds: u64,

        #[command(flatten)]
        profile: ProfileArgs,

        /// Estimate duration from the activity's nominal cadence instead
        #[arg(long)]
        estimate: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Replay recorded samples (NDJSON: {"t_ms", "x", "y", "z"}) through the tracker
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        profile: ProfileArgs,

        /// Simulate saves for this user against an in-memory store
        #[arg(long)]
        user: Option<String>,

        /// Day the saves are filed under (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print every detected step as an NDJSON line
        #[arg(long)]
        events: bool,

        /// Output format for the final report
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,
    },

    /// List activity profiles
    Profiles {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarise the week ending at a date from a JSON array of day records
    Summary {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Last day of the week (defaults to today)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct ProfileArgs {
    /// Activity kind (e.g. "Brisk Walking")
    #[arg(short, long, default_value = "Brisk Walking")]
    activity: String,

    /// Height in centimetres
    #[arg(long, default_value = "170")]
    height: f64,

    /// Weight in kilograms
    #[arg(long, default_value = "70")]
    weight: f64,

    #[arg(long, value_enum, default_value = "male")]
    gender: GenderArg,

    /// Daily step goal (0 disables goal tracking)
    #[arg(long, default_value = "10000")]
    goal: i64,
}

impl ProfileArgs {
    fn kind(&self) -> Result<ActivityKind, StepCliError> {
        Ok(self.activity.parse()?)
    }

    fn body(&self) -> Result<BodyParams, StepCliError> {
        let body = BodyParams {
            height_cm: self.height,
            weight_kg: self.weight,
            gender: self.gender.into(),
        };
        body.validate()?;
        Ok(body)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum GenderArg {
    Male,
    Female,
}

impl From<GenderArg> for Gender {
    fn from(g: GenderArg) -> Self {
        match g {
            GenderArg::Male => Gender::Male,
            GenderArg::Female => Gender::Female,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Single-line JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<(), StepCliError> {
    match cli.command {
        Commands::Metrics {
            steps,
            active_seconds,
            profile,
            estimate,
            json,
        } => cmd_metrics(steps, active_seconds, &profile, estimate, json),
        Commands::Replay {
            input,
            profile,
            user,
            date,
            events,
            output_format,
        } => cmd_replay(
            &input,
            load_config(cli.config.as_deref())?,
            &profile,
            user.map(UserId::new),
            date.unwrap_or_else(|| Local::now().date_naive()),
            events,
            output_format,
        ),
        Commands::Profiles { json } => cmd_profiles(json),
        Commands::Summary { input, end, json } => {
            cmd_summary(&input, end.unwrap_or_else(|| Local::now().date_naive()), json)
        }
        Commands::Doctor { json } => cmd_doctor(cli.config.as_deref(), json),
    }
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig, StepCliError> {
    match path {
        Some(path) => {
            let json = fs::read_to_string(path)?;
            Ok(TrackerConfig::from_json(&json)?)
        }
        None => Ok(TrackerConfig::default()),
    }
}

fn read_input(input: &Path) -> Result<Box<dyn BufRead>, StepCliError> {
    if input.to_string_lossy() == "-" {
        Ok(Box::new(BufReader::new(io::stdin())))
    } else {
        Ok(Box::new(BufReader::new(fs::File::open(input)?)))
    }
}

fn cmd_metrics(
    steps: u32,
    active_seconds: u64,
    profile: &ProfileArgs,
    estimate: bool,
    json: bool,
) -> Result<(), StepCliError> {
    let kind = profile.kind()?;
    let body = profile.body()?;

    if estimate {
        let walk = metrics::estimate_walk_metrics(steps, &body, kind.profile());
        if json {
            println!("{}", serde_json::to_string_pretty(&walk)?);
        } else {
            println!("Walk Estimate ({})", kind);
            println!("=============");
            println!("Steps:          {}", steps);
            println!("Distance:       {:.2} km", walk.kilometers);
            println!("Calories:       {:.2} kcal", walk.calories_burned);
            println!("Duration:       {} min", walk.spend_minutes);
            println!("Steps per hour: {:.0}", walk.avg_steps_per_hour);
        }
        return Ok(());
    }

    let request = MetricsRequest {
        total_steps: steps,
        active_seconds,
        activity: kind.as_str().to_string(),
        body,
        daily_goal: profile.goal,
    };
    let result = request.evaluate()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Metrics ({})", kind);
        println!("=======");
        println!("Steps:           {}", steps);
        println!("Distance:        {:.3} km", result.kilometers);
        println!("Calories:        {:.2} kcal", result.calories_burned);
        println!("Steps per hour:  {:.0}", result.avg_steps_per_hour);
        println!("Minutes per step: {:.4}", result.minutes_per_step);
        println!("Goal reached:    {}", result.goal_reached);
    }
    Ok(())
}

/// One recorded accelerometer reading
#[derive(serde::Deserialize)]
struct ReplaySample {
    t_ms: u64,
    x: f64,
    y: f64,
    z: f64,
}

#[derive(serde::Serialize)]
struct StepLine {
    t_ms: u64,
    step_count: u32,
}

/// Offline driver: the tracker, the save coordinator and an in-memory store
/// advanced on the recording's own timestamps.
struct Replay {
    tracker: StepTracker,
    sync: SyncCoordinator,
    store: MemoryStepStore,
    probe: StaticProbe,
    runtime: tokio::runtime::Runtime,
    tick_ms: u64,
    next_tick_ms: u64,
    date: NaiveDate,
    saves: usize,
    failed_saves: usize,
}

impl Replay {
    /// Fire every tick and save due at or before `t_ms`, in time order
    fn advance_to(&mut self, t_ms: u64) {
        loop {
            let save_at = self.sync.debounce_deadline_ms().filter(|d| *d <= t_ms);
            let tick_at = Some(self.next_tick_ms).filter(|t| *t <= t_ms);

            match (tick_at, save_at) {
                (Some(tick), Some(save)) if tick <= save => self.tick(tick),
                (_, Some(save)) => self.save(save),
                (Some(tick), None) => self.tick(tick),
                (None, None) => break,
            }
        }
    }

    fn tick(&mut self, at_ms: u64) {
        self.tracker.tick(at_ms);
        self.next_tick_ms = at_ms + self.tick_ms;
    }

    fn save(&mut self, at_ms: u64) {
        let Some(request) = self.sync.take_due_push(&self.tracker, at_ms, self.date) else {
            return;
        };
        let result = self
            .runtime
            .block_on(sync::execute_push(&self.store, &self.probe, request));
        match self.sync.complete(&mut self.tracker, result) {
            PushDisposition::Saved => self.saves += 1,
            PushDisposition::Retained(_) => self.failed_saves += 1,
            PushDisposition::Skipped | PushDisposition::Superseded => {}
        }
    }
}

#[derive(serde::Serialize)]
struct ReplayReport {
    producer: String,
    version: String,
    samples: usize,
    steps_detected: usize,
    saves: usize,
    failed_saves: usize,
    state: TrackerState,
    saved_record: Option<RemoteStepRecord>,
}

fn cmd_replay(
    input: &Path,
    config: TrackerConfig,
    profile: &ProfileArgs,
    user: Option<UserId>,
    date: NaiveDate,
    events: bool,
    output_format: OutputFormat,
) -> Result<(), StepCliError> {
    let kind = profile.kind()?;
    let body = profile.body()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let tick_ms = config.active_tick_secs.saturating_mul(1_000);
    let coordinator = SyncCoordinator::new(user.clone(), config.save_debounce_ms);
    let mut replay = Replay {
        tracker: StepTracker::new(config, kind, body, profile.goal),
        sync: coordinator,
        store: MemoryStepStore::new(),
        probe: StaticProbe::physical(),
        runtime,
        tick_ms,
        next_tick_ms: tick_ms,
        date,
        saves: 0,
        failed_saves: 0,
    };

    let mut stdout = io::stdout();
    let mut samples = 0usize;
    let mut steps_detected = 0usize;
    let mut last_t_ms = 0u64;

    for (index, line) in read_input(input)?.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let sample: ReplaySample = serde_json::from_str(trimmed).map_err(|e| {
            StepCliError::ParseError(format!("Failed to parse sample on line {}: {}", index + 1, e))
        })?;
        if sample.t_ms < last_t_ms {
            return Err(StepCliError::ParseError(format!(
                "Timestamps must not decrease (line {})",
                index + 1
            )));
        }
        last_t_ms = sample.t_ms;
        samples += 1;

        replay.advance_to(sample.t_ms);
        let vector = SampleVector::new(sample.x, sample.y, sample.z);
        if replay.tracker.on_sample(&vector, sample.t_ms).is_some() {
            replay.sync.record_step(sample.t_ms);
            steps_detected += 1;
            if events {
                let step = StepLine {
                    t_ms: sample.t_ms,
                    step_count: replay.tracker.state().step_count,
                };
                writeln!(stdout, "{}", serde_json::to_string(&step)?)?;
            }
        }
    }

    if samples == 0 {
        return Err(StepCliError::NoSamples);
    }

    // let the last scheduled save run
    if let Some(deadline) = replay.sync.debounce_deadline_ms() {
        replay.advance_to(deadline);
    }

    let saved_record = match &user {
        Some(user) => replay.runtime.block_on(replay.store.get(user, date)),
        None => None,
    };
    let report = ReplayReport {
        producer: PRODUCER_NAME.to_string(),
        version: STEPWRITER_VERSION.to_string(),
        samples,
        steps_detected,
        saves: replay.saves,
        failed_saves: replay.failed_saves,
        state: replay.tracker.state().clone(),
        saved_record,
    };

    let output = match output_format {
        OutputFormat::Json => serde_json::to_string(&report)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&report)?,
    };
    writeln!(stdout, "{}", output)?;
    stdout.flush()?;
    Ok(())
}

#[derive(serde::Serialize)]
struct ProfileRow {
    name: &'static str,
    #[serde(flatten)]
    profile: ActivityProfile,
}

fn cmd_profiles(json: bool) -> Result<(), StepCliError> {
    let rows: Vec<ProfileRow> = ActivityKind::ALL
        .iter()
        .map(|kind| ProfileRow {
            name: kind.as_str(),
            profile: *kind.profile(),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!(
            "{:<14} {:>9} {:>12} {:>5} {:>9}",
            "Activity", "Threshold", "Step factor", "MET", "Steps/min"
        );
        for row in &rows {
            println!(
                "{:<14} {:>9.1} {:>12.3} {:>5.1} {:>9.0}",
                row.name,
                row.profile.threshold,
                row.profile.step_length_factor,
                row.profile.met,
                row.profile.steps_per_minute
            );
        }
    }
    Ok(())
}

fn cmd_summary(input: &Path, end: NaiveDate, json: bool) -> Result<(), StepCliError> {
    let mut data = String::new();
    read_input(input)?.read_to_string(&mut data)?;
    let records: Vec<RemoteStepRecord> = serde_json::from_str(&data)?;

    let summary = WeeklySummary::from_records(end, &records);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Weekly Summary {} to {}", summary.start, summary.end);
        println!("==============");
        for day in &summary.days {
            let marker = if day.goal_reached { " *" } else { "" };
            println!("  {}  {:>6}{}", day.date.format("%a %d"), day.steps, marker);
        }
        println!();
        println!("Total steps:    {}", summary.total_steps);
        println!("Daily average:  {:.0}", summary.daily_average_steps);
        println!("Distance:       {:.2} km", summary.total_kilometers);
        println!("Calories:       {:.0} kcal", summary.total_calories);
        println!("Goal reached:   {} days", summary.days_goal_reached);
        if let Some(best) = summary.best_day {
            println!("Best day:       {}", best);
        }
    }
    Ok(())
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), StepCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "stepwriter_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Stepwriter version {}", STEPWRITER_VERSION),
    });

    checks.push(match config_path {
        Some(path) if !path.exists() => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: format!("Config file {} does not exist", path.display()),
        },
        Some(path) => match load_config(Some(path)) {
            Ok(config) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "Config valid (debounce {} ms, tick {} s, clamp {:?})",
                    config.save_debounce_ms, config.active_tick_secs, config.clamp_policy
                ),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: format!("Invalid config: {}", CliError::from(e).message),
            },
        },
        None => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "No config file given, using defaults".to_string(),
        },
    });

    checks.push(DoctorCheck {
        name: "profiles".to_string(),
        status: CheckStatus::Ok,
        message: format!("{} activity profiles available", ActivityKind::ALL.len()),
    });

    // Check stdin is available (for replay from a pipe)
    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (replay from - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let failed = checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: STEPWRITER_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Stepwriter Doctor Report");
        println!("========================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");
        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    if failed {
        Err(StepCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum StepCliError {
    Io(io::Error),
    Tracker(TrackerError),
    Json(serde_json::Error),
    NoSamples,
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for StepCliError {
    fn from(e: io::Error) -> Self {
        StepCliError::Io(e)
    }
}

impl From<TrackerError> for StepCliError {
    fn from(e: TrackerError) -> Self {
        StepCliError::Tracker(e)
    }
}

impl From<serde_json::Error> for StepCliError {
    fn from(e: serde_json::Error) -> Self {
        StepCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StepCliError> for CliError {
    fn from(e: StepCliError) -> Self {
        match e {
            StepCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StepCliError::Tracker(TrackerError::UnknownActivity(name)) => CliError {
                code: "UNKNOWN_ACTIVITY".to_string(),
                message: format!("Unknown activity kind: {}", name),
                hint: Some("Run 'stepwriter profiles' to list activities".to_string()),
            },
            StepCliError::Tracker(e) => CliError {
                code: "TRACKER_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            StepCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StepCliError::NoSamples => CliError {
                code: "NO_SAMPLES".to_string(),
                message: "No samples found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            StepCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            StepCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some(
                    "Expected one {\"t_ms\", \"x\", \"y\", \"z\"} object per line".to_string(),
                ),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
