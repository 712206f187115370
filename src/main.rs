use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod artifacts;
mod batch;
mod error;
mod features;
mod inference;
mod models;
mod pipeline;
mod recommend;
mod report;

use artifacts::ModelContext;

const MODELS_PATH_ENV: &str = "OUTCOME_MODELS_PATH";
const DEFAULT_MODELS_PATH: &str = "models/outcome_models.json";

#[derive(Parser)]
#[command(name = "outcome-predictor")]
#[command(about = "Student grade and risk prediction for Group Scholar", long_about = None)]
struct Cli {
    /// Model artifact bundle (falls back to OUTCOME_MODELS_PATH)
    #[arg(long, global = true)]
    models: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Predict one student from a JSON request (`-` reads stdin)
    Predict {
        #[arg(long)]
        input: PathBuf,
    },
    /// Show which models are loaded and how requests will be shaped
    Models,
    /// Score every student in a CSV file
    Batch {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown report for a CSV file
    Report {
        #[arg(long)]
        csv: PathBuf,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

fn resolve_models_path(flag: Option<PathBuf>) -> PathBuf {
    flag.or_else(|| std::env::var_os(MODELS_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_PATH))
}

fn read_input(input: &Path) -> anyhow::Result<String> {
    if input == Path::new("-") {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("failed to read request from stdin")?;
        Ok(body)
    } else {
        std::fs::read_to_string(input)
            .with_context(|| format!("failed to read request from {}", input.display()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "groupscholar_outcome_predictor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let models_path = resolve_models_path(cli.models);
    let context = Arc::new(
        ModelContext::from_path(&models_path).context("failed to load prediction models")?,
    );

    match cli.command {
        Commands::Predict { input } => {
            let body = read_input(&input)?;
            let (status, response) = pipeline::handle_request(&context, &body);
            println!("{}", serde_json::to_string_pretty(&response)?);
            if status != 200 {
                anyhow::bail!("prediction failed with status {status}");
            }
        }
        Commands::Models => {
            let mode = inference::select_mode(context.grade());
            if let Some(source) = context.source() {
                println!("Models loaded from {}.", source.display());
            }
            println!(
                "- grade classifier width: {}",
                context
                    .grade()
                    .expected_input_width()
                    .map(|w| w.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            );
            println!(
                "- risk classifier width: {}",
                context
                    .risk()
                    .expected_input_width()
                    .map(|w| w.to_string())
                    .unwrap_or_else(|| "unknown".to_string())
            );
            println!("- feature mode: {} ({} features)", mode.label(), mode.width());
            let reloaded = context.reload().context("artifact file no longer loads")?;
            if inference::select_mode(reloaded.grade()) != mode {
                println!("- artifact file on disk now selects a different feature mode");
            }
        }
        Commands::Batch { csv, limit } => {
            let rows = batch::read_rows(&csv)?;
            let scored = batch::score_rows(Arc::clone(&context), rows).await?;

            if scored.outcomes.is_empty() {
                println!("No students could be scored from {}.", csv.display());
                return Ok(());
            }

            println!("Top students by risk:");
            for outcome in batch::rank_by_risk(&scored.outcomes).iter().take(limit) {
                println!(
                    "- {}: {} ({}, predicted grade {:.1})",
                    outcome.student,
                    outcome.result.risk_level,
                    outcome.result.predicted_grade,
                    outcome.result.predicted_grade_value
                );
            }
            if !scored.failures.is_empty() {
                println!("Skipped {} rows that failed to score.", scored.failures.len());
            }
        }
        Commands::Report { csv, out } => {
            let rows = batch::read_rows(&csv)?;
            let scored = batch::score_rows(Arc::clone(&context), rows).await?;
            let report = report::build_report(
                &csv.display().to_string(),
                chrono::Utc::now().date_naive(),
                &scored.outcomes,
                &scored.failures,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
