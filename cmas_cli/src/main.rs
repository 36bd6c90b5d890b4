use cmas_core::history::paginate;
use cmas_core::registry::NewPatient;
use cmas_core::submission::{load_submission, parse_date, parse_score_list};
use cmas_core::trend::{exercise_breakdown, summarize_measurements};
use cmas_core::*;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "cmas")]
#[command(about = "Childhood Myositis Assessment Scale tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use a specific config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Score and record a complete 14-exercise assessment
    Record {
        /// Patient id (JDM-YYYY-NNN)
        #[arg(long)]
        patient: Option<String>,

        /// Comma-separated scores in assessment order
        #[arg(long, conflicts_with = "file")]
        scores: Option<String>,

        /// JSON submission file
        #[arg(long)]
        file: Option<PathBuf>,

        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,

        /// Measurement date (YYYY-MM-DD or RFC 3339), defaults to now
        #[arg(long)]
        date: Option<String>,

        /// Score only - don't record the measurement
        #[arg(long)]
        dry_run: bool,
    },

    /// Interpret a total score
    Interpret {
        /// Total CMAS score
        score: f64,

        /// Maximum achievable score
        #[arg(long, default_value_t = cmas_core::catalog::CMAS_MAX_TOTAL)]
        max: f64,
    },

    /// List a patient's measurements with trend
    History {
        #[arg(long)]
        patient: String,

        /// First date to include (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,

        /// Last date to include (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Summary statistics and per-exercise breakdown
    Stats {
        #[arg(long)]
        patient: String,

        #[arg(long)]
        from: Option<String>,

        #[arg(long)]
        to: Option<String>,
    },

    /// Register a new patient profile
    Register {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// patient, doctor or admin
        #[arg(long, default_value = "patient")]
        role: String,

        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        dob: Option<String>,

        /// Diagnosis date (YYYY-MM-DD)
        #[arg(long)]
        diagnosed: Option<String>,
    },

    /// List registered patients
    Patients,

    /// Roll up WAL measurements to CSV
    Rollup {
        /// Clean up processed WAL files after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

/// File locations under the data directory
struct DataPaths {
    wal_dir: PathBuf,
    wal: PathBuf,
    csv: PathBuf,
    registry: PathBuf,
}

impl DataPaths {
    fn new(data_dir: &Path) -> Self {
        let wal_dir = data_dir.join("wal");
        Self {
            wal: wal_dir.join("measurements.wal"),
            wal_dir,
            csv: data_dir.join("measurements.csv"),
            registry: data_dir.join("patients.json"),
        }
    }
}

fn main() -> ExitCode {
    cmas_core::logging::init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if e.is_validation() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| config.data.data_dir.clone());
    let paths = DataPaths::new(&data_dir);
    let json = cli.json;

    match cli.command {
        Commands::Record {
            patient,
            scores,
            file,
            notes,
            date,
            dry_run,
        } => cmd_record(
            &paths,
            &config,
            RecordArgs {
                patient,
                scores,
                file,
                notes,
                date,
                dry_run,
            },
            json,
        ),
        Commands::Interpret { score, max } => cmd_interpret(score, max, json),
        Commands::History {
            patient,
            from,
            to,
            page,
            limit,
        } => cmd_history(&paths, &config, &patient, date_range(from, to)?, page, limit, json),
        Commands::Stats { patient, from, to } => {
            cmd_stats(&paths, &config, &patient, date_range(from, to)?, json)
        }
        Commands::Register {
            name,
            email,
            role,
            dob,
            diagnosed,
        } => {
            let new = NewPatient {
                name,
                email,
                role: parse_role(&role)?,
                date_of_birth: dob.as_deref().map(parse_date).transpose()?,
                diagnosis_date: diagnosed.as_deref().map(parse_date).transpose()?,
            };
            cmd_register(&paths, &config, new, json)
        }
        Commands::Patients => cmd_patients(&paths, &config, json),
        Commands::Rollup { cleanup } => cmd_rollup(&paths, cleanup),
    }
}

struct RecordArgs {
    patient: Option<String>,
    scores: Option<String>,
    file: Option<PathBuf>,
    notes: Option<String>,
    date: Option<String>,
    dry_run: bool,
}

fn cmd_record(paths: &DataPaths, config: &Config, args: RecordArgs, json: bool) -> Result<()> {
    let mut submission = match (&args.file, &args.scores) {
        (Some(file), _) => load_submission(file)?,
        (None, Some(scores)) => {
            let patient = args.patient.clone().ok_or_else(|| {
                Error::Validation("--patient is required with --scores".into())
            })?;
            MeasurementSubmission::from_score_list(patient, &parse_score_list(scores)?)?
        }
        (None, None) => {
            return Err(Error::Validation(
                "either --scores or --file is required".into(),
            ))
        }
    };

    // Flags take precedence over the file contents
    if let Some(patient) = args.patient {
        submission.patient_id = patient;
    }
    if args.notes.is_some() {
        submission.notes = args.notes;
    }
    if args.date.is_some() {
        submission.measurement_date = args.date;
    }

    let registry = open_registry(paths, config)?;
    if registry.is_empty() {
        tracing::warn!("Patient registry is empty; accepting any patient id");
    } else if registry.get(submission.patient_id.trim()).is_none() {
        return Err(Error::Validation(format!(
            "Unknown patient '{}'",
            submission.patient_id
        )));
    }

    let now = chrono::Utc::now();
    let assessed = if args.dry_run {
        assess(&submission, config, now)?
    } else {
        std::fs::create_dir_all(&paths.wal_dir)?;
        let mut sink = JsonlSink::new(&paths.wal);
        record(&submission, config, &mut sink, now)?
    };

    if json {
        let out = serde_json::json!({
            "measurement_id": assessed.measurement.id,
            "patient_id": assessed.measurement.patient_id,
            "recorded_at": assessed.measurement.recorded_at,
            "recorded": !args.dry_run,
            "total_score": assessed.summary.total_score,
            "max_score": assessed.summary.max_score,
            "percentage": assessed.summary.percentage,
            "severity": assessed.summary.severity,
            "interpretation": assessed.summary.interpretation,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    display_summary(&assessed.summary);
    if args.dry_run {
        println!("\n[Dry run - not recording measurement]");
    } else {
        println!("\n✓ Measurement recorded!");
        println!("  Id: {}", assessed.measurement.id);
    }

    Ok(())
}

fn cmd_interpret(score: f64, max: f64, json: bool) -> Result<()> {
    if !score.is_finite() || score < 0.0 || score > max {
        return Err(Error::Validation(format!(
            "score {} outside 0 to {}",
            score, max
        )));
    }
    let summary = cmas_core::assessment::summarize_total(score, max)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        display_summary(&summary);
    }
    Ok(())
}

fn cmd_history(
    paths: &DataPaths,
    config: &Config,
    patient: &str,
    range: DateRange,
    page: usize,
    limit: usize,
    json: bool,
) -> Result<()> {
    let measurements = load_patient_history(&paths.wal, &paths.csv, patient, range)?;
    let stats = summarize_measurements(&measurements, &config.trend);
    let listing = paginate(&measurements, page, limit);

    if json {
        let out = serde_json::json!({
            "patient_id": patient,
            "measurements": listing.items,
            "pagination": {
                "page": listing.page,
                "limit": listing.limit,
                "total": listing.total,
                "pages": listing.pages,
            },
            "trend": stats.as_ref().map(|s| s.trend),
            "average_score": stats.as_ref().map(|s| s.average_score),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let Some(stats) = stats else {
        println!("No measurements found for {}.", patient);
        return Ok(());
    };

    println!("Measurements for {}", patient);
    println!();
    for m in &listing.items {
        println!(
            "  {}  {:>5}  {}",
            m.recorded_at.format("%Y-%m-%d"),
            m.total_score,
            interpret(m.total_score)
        );
    }
    println!();
    println!(
        "  Page {} of {} ({} total)",
        listing.page, listing.pages, listing.total
    );
    println!("  Average: {:.2}", stats.average_score);
    println!("  Trend: {}", stats.trend);

    Ok(())
}

fn cmd_stats(
    paths: &DataPaths,
    config: &Config,
    patient: &str,
    range: DateRange,
    json: bool,
) -> Result<()> {
    let measurements = load_patient_history(&paths.wal, &paths.csv, patient, range)?;
    let stats = summarize_measurements(&measurements, &config.trend);
    let breakdown = exercise_breakdown(&measurements);

    if json {
        let out = serde_json::json!({
            "patient_id": patient,
            "statistics": stats,
            "exercise_breakdown": breakdown,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let Some(stats) = stats else {
        println!("No measurements found for {}.", patient);
        return Ok(());
    };

    println!("Statistics for {}", patient);
    println!();
    println!("  Measurements: {}", stats.total_measurements);
    println!("  Average: {:.2}", stats.average_score);
    println!("  Highest: {}", stats.highest_score);
    println!("  Lowest: {}", stats.lowest_score);
    println!(
        "  Latest: {} ({})",
        stats.latest_score,
        interpret(stats.latest_score)
    );
    match stats.improvement_rate {
        Some(rate) => println!("  Improvement rate: {:+.1}%", rate),
        None => println!("  Improvement rate: n/a"),
    }
    println!("  Trend: {}", stats.trend);
    println!();
    println!("  Exercise breakdown:");
    for row in &breakdown {
        println!(
            "    {:<20} avg {:.2} / {}  (min {}, max {})",
            row.name, row.average_score, row.max_score, row.lowest_score, row.highest_score
        );
    }

    Ok(())
}

fn cmd_register(paths: &DataPaths, config: &Config, new: NewPatient, json: bool) -> Result<()> {
    let now = chrono::Utc::now();
    let profile = PatientRegistry::update(&paths.registry, |registry| {
        registry.seed(&config.patients, now)?;
        registry.register(new, now)
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("✓ Registered {} ({})", profile.name, profile.email);
        println!("  Patient id: {}", profile.patient_id);
    }
    Ok(())
}

fn cmd_patients(paths: &DataPaths, config: &Config, json: bool) -> Result<()> {
    let registry = open_registry(paths, config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&registry.patients)?);
        return Ok(());
    }

    if registry.is_empty() {
        println!("No patients registered.");
        return Ok(());
    }
    for p in &registry.patients {
        let role = format!("{:?}", p.role);
        println!("  {}  {:<24} {:<8} {}", p.patient_id, p.name, role, p.email);
    }
    Ok(())
}

fn cmd_rollup(paths: &DataPaths, cleanup: bool) -> Result<()> {
    if !paths.wal.exists() {
        println!("No WAL file found - nothing to roll up.");
        return Ok(());
    }

    let count = cmas_core::csv_rollup::wal_to_csv_and_archive(&paths.wal, &paths.csv)?;

    println!("✓ Rolled up {} measurements to CSV", count);
    println!("  CSV: {}", paths.csv.display());

    if cleanup {
        let cleaned = cmas_core::csv_rollup::cleanup_processed_wals(&paths.wal_dir)?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed WAL files", cleaned);
        }
    }

    Ok(())
}

/// Load the registry, adding any config-declared profiles it lacks
fn open_registry(paths: &DataPaths, config: &Config) -> Result<PatientRegistry> {
    let registry = PatientRegistry::load(&paths.registry)?;
    if config
        .patients
        .iter()
        .all(|seed| registry.get(&seed.patient_id).is_some())
    {
        return Ok(registry);
    }

    PatientRegistry::update(&paths.registry, |registry| {
        registry.seed(&config.patients, chrono::Utc::now())?;
        Ok(registry.clone())
    })
}

fn date_range(from: Option<String>, to: Option<String>) -> Result<DateRange> {
    Ok(DateRange {
        from: from.as_deref().map(parse_date).transpose()?,
        to: to.as_deref().map(parse_date).transpose()?,
    })
}

fn parse_role(s: &str) -> Result<Role> {
    match s.to_lowercase().as_str() {
        "patient" => Ok(Role::Patient),
        "doctor" => Ok(Role::Doctor),
        "admin" => Ok(Role::Admin),
        other => Err(Error::Validation(format!("Unknown role: {}", other))),
    }
}

fn display_summary(summary: &AssessmentSummary) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  CMAS ASSESSMENT");
    println!("╰─────────────────────────────────────────╯");
    println!();
    println!(
        "  Total score: {} / {}",
        summary.total_score, summary.max_score
    );
    println!("  Percentage: {}%", summary.percentage);
    println!("  Interpretation: {}", summary.interpretation);
}
