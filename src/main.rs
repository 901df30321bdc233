use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use student_early_warning::config::{Config, LogFormat};
use student_early_warning::dashboard::{
    build_academic_insights, build_institutional_stats, build_score_distributions,
};
use student_early_warning::models::StudentRecord;
use student_early_warning::normalize::{normalize_batch, parse_risk_level, Mode, NormalizedBatch};
use student_early_warning::report::{build_report, ReportInput};
use student_early_warning::risk::rank_students;
use student_early_warning::sources::postgres::DEFAULT_RELATION;
use student_early_warning::sources::{CsvSource, FixtureSource, HttpSource, PgSource, RecordSource};
use student_early_warning::compute_histogram;

#[derive(Parser)]
#[command(name = "early-warning")]
#[command(about = "Risk analytics for the student early warning dashboard", long_about = None)]
#[command(group(
    ArgGroup::new("source")
        .args(["fixture", "csv", "api", "database"])
        .multiple(false)
))]
struct Cli {
    /// Read raw student records from a JSON file
    #[arg(long)]
    fixture: Option<PathBuf>,
    /// Read raw student records from a CSV export
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Fetch from the backend API (the default source)
    #[arg(long)]
    api: bool,
    /// Override EARLY_WARNING_API_URL
    #[arg(long, requires = "api")]
    api_url: Option<String>,
    /// Read from Postgres using DATABASE_URL
    #[arg(long)]
    database: bool,
    /// Table or view holding one student payload per row
    #[arg(long, default_value = DEFAULT_RELATION)]
    table: String,
    /// strict aborts on the first malformed record, tolerant skips it
    #[arg(long)]
    mode: Option<Mode>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the canonical student records
    Normalize,
    /// Print grade and risk distributions
    Distributions,
    /// Print academic insights (subjects at risk, barrier impact)
    Insights,
    /// Print institution-wide counts and chart data
    Institutional,
    /// Bin risk scores or average grades
    Histogram {
        #[arg(long, value_enum)]
        field: HistogramField,
        #[arg(long, default_value_t = 10)]
        bins: usize,
        #[arg(long)]
        min: Option<f64>,
        #[arg(long)]
        max: Option<f64>,
    },
    /// List the highest-risk students
    Top {
        #[arg(long)]
        limit: Option<usize>,
        /// Only students at this level (Critical/Medium/Low or Alto/Medio/Bajo)
        #[arg(long)]
        level: Option<String>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum HistogramField {
    Risk,
    Grade,
}

#[derive(Serialize)]
struct RejectedView {
    index: usize,
    id: Option<String>,
    error: String,
}

#[derive(Serialize)]
struct NormalizeView<'a> {
    records: &'a [StudentRecord],
    rejected: Vec<RejectedView>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(config.log_format);

    let mode = cli.mode.unwrap_or(config.mode);
    let source = build_source(&cli, &config).await?;
    let raws = source.fetch_raw().await?;
    info!(source = %source.describe(), raw = raws.len(), ?mode, "fetched student records");

    let batch = normalize_batch(&raws, mode)?;
    let NormalizedBatch { records, rejected } = &batch;

    match cli.command {
        Commands::Normalize => {
            let view = NormalizeView {
                records,
                rejected: rejected
                    .iter()
                    .map(|err| RejectedView {
                        index: err.index,
                        id: err.id.clone(),
                        error: err.source.to_string(),
                    })
                    .collect(),
            };
            print_json(&view)?;
        }
        Commands::Distributions => {
            print_json(&build_score_distributions(records, mode)?)?;
        }
        Commands::Insights => {
            print_json(&build_academic_insights(records))?;
        }
        Commands::Institutional => {
            print_json(&build_institutional_stats(records, &config.thresholds))?;
        }
        Commands::Histogram {
            field,
            bins,
            min,
            max,
        } => {
            let values: Vec<f64> = match field {
                HistogramField::Risk => records.iter().map(|r| r.risk_score).collect(),
                HistogramField::Grade => records.iter().filter_map(|r| r.average_grade()).collect(),
            };
            print_json(&compute_histogram(&values, bins, min, max)?)?;
        }
        Commands::Top { limit, level } => {
            let level = level
                .as_deref()
                .map(|raw| parse_risk_level("level", raw))
                .transpose()?;
            let limit = limit.unwrap_or(config.max_students_return);
            let ranked = rank_students(records, level, limit);

            if ranked.is_empty() {
                println!("No students match.");
                return Ok(());
            }

            println!("Top students by risk score:");
            for entry in &ranked {
                println!(
                    "- {} ({}, {}) score {:.1} [{}]",
                    entry.name, entry.id, entry.course, entry.risk_score, entry.risk_level
                );
            }
        }
        Commands::Report { out } => {
            let distributions = build_score_distributions(records, mode)?;
            let insights = build_academic_insights(records);
            let institutional = build_institutional_stats(records, &config.thresholds);
            let priority = rank_students(records, None, 10);
            let report = build_report(&ReportInput {
                source: &source.describe(),
                generated_at: Utc::now(),
                rejected: rejected.len(),
                distributions: &distributions,
                insights: &insights,
                institutional: &institutional,
                priority: &priority,
            });
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

async fn build_source(cli: &Cli, config: &Config) -> anyhow::Result<Box<dyn RecordSource>> {
    if let Some(path) = &cli.fixture {
        return Ok(Box::new(FixtureSource::new(path)));
    }
    if let Some(path) = &cli.csv {
        return Ok(Box::new(CsvSource::new(path)));
    }
    if cli.database {
        let database_url = config
            .database_url
            .as_deref()
            .context("DATABASE_URL must be set to read from Postgres")?;
        return Ok(Box::new(PgSource::connect(database_url, &cli.table).await?));
    }
    let base_url = cli.api_url.as_deref().unwrap_or(&config.api_url);
    Ok(Box::new(HttpSource::new(base_url, config.api_timeout)?))
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
