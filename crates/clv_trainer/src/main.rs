//! CLV Trainer CLI
//!
//! Fits customer lifetime value models from a CSV order log.

use anyhow::{Context, Result};
use clap::Parser;
use clv_core::{ClvConfig, ScoreBasis};
use clv_trainer::output::{write_churn_csv, write_report, CHURN_FILE};
use clv_trainer::{load_transactions, ClvPipeline, ColumnMapping};
use std::path::PathBuf;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "clv-train")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Customer lifetime value trainer: BG/NBD + Gamma-Gamma", long_about = None)]
struct Args {
    /// Input CSV with customer id, order date and order amount columns
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for tables and model blobs
    #[arg(short, long, default_value = "models/clv")]
    output: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scoring horizon in time units
    #[arg(long)]
    horizon: Option<f64>,

    /// Number of value tiers
    #[arg(long)]
    tiers: Option<u32>,

    /// Column holding the order amount
    #[arg(long)]
    monetary_column: Option<String>,

    /// Frequency model penalizer
    #[arg(long)]
    penalizer: Option<f64>,

    /// Also write churn labels and pre-cutoff features
    #[arg(long)]
    churn: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn resolve_config(&self) -> Result<ClvConfig> {
        let mut config = match &self.config {
            Some(path) => ClvConfig::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ClvConfig::default(),
        };

        if let Some(horizon) = self.horizon {
            config.scoring.horizon = horizon;
        }
        if let Some(tiers) = self.tiers {
            config.scoring.tiers = tiers;
        }
        if let Some(column) = &self.monetary_column {
            config.summary.monetary_column = column.clone();
        }
        if let Some(penalizer) = self.penalizer {
            config.frequency.penalizer = penalizer;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("CLV Trainer v{}", env!("CARGO_PKG_VERSION"));

    let config = args.resolve_config()?;
    info!("Configuration:");
    info!("  Time unit: {}", config.summary.time_unit);
    info!("  Horizon: {}", config.scoring.horizon);
    info!("  Tiers: {}", config.scoring.tiers);
    info!("  Frequency penalizer: {}", config.frequency.penalizer);
    info!("  Monetary penalizer: {}", config.monetary.penalizer);

    let columns = ColumnMapping::from(&config.summary);
    let transactions = load_transactions(&args.input, &columns).context("Failed to load transactions")?;
    info!("Loaded {} transactions", transactions.len());

    let pipeline = ClvPipeline::new(config)?;
    let report = pipeline.run(&transactions).context("CLV training failed")?;

    for warning in &report.warnings {
        warn!("{}", warning);
    }
    if report.scores.basis == ScoreBasis::FrequencyOnly {
        warn!("Scores are expected transaction counts, not currency");
    }

    let written = write_report(&args.output, &report).context("Failed to write outputs")?;

    if args.churn {
        let dataset = pipeline
            .churn_dataset(&transactions)
            .context("Failed to build churn dataset")?;
        write_churn_csv(&args.output.join(CHURN_FILE), &dataset).context("Failed to write churn dataset")?;
    }

    info!("✓ Training completed successfully");
    info!("  Summary: {}", written.summary.display());
    info!("  Scores: {}", written.scores.display());
    info!(
        "  Frequency model: {} ({})",
        written.frequency_model.display(),
        written.frequency_hash
    );
    if let Some((path, hash)) = &written.monetary_model {
        info!("  Monetary model: {} ({})", path.display(), hash);
    }

    Ok(())
}
