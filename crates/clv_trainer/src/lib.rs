//! CLV batch trainer
//!
//! Loads a CSV order log, fits the frequency and monetary models, scores
//! every customer and writes the tables and hashed model blobs to disk.

pub mod dataset;
pub mod errors;
pub mod output;
pub mod pipeline;

use clv_core::ClvConfig;
use std::path::Path;

pub use dataset::{load_transactions, read_transactions, ColumnMapping};
pub use errors::TrainerError;
pub use output::{write_report, WrittenArtifacts};
pub use pipeline::{ClvPipeline, PipelineReport};

/// Run the whole pipeline on a CSV file and write the artifacts to `output_dir`.
pub fn train_from_csv(
    path: &Path,
    output_dir: &Path,
    config: ClvConfig,
) -> Result<(PipelineReport, WrittenArtifacts), TrainerError> {
    let columns = ColumnMapping::from(&config.summary);
    let transactions = load_transactions(path, &columns)?;
    let pipeline = ClvPipeline::new(config)?;
    let report = pipeline.run(&transactions)?;
    let written = write_report(output_dir, &report)?;
    Ok((report, written))
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
