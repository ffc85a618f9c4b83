//! Writes run artifacts to an output directory

use clv_core::{encode_model, ChurnExample, CustomerId, ModelBlob, ScoreTable, SummaryTable};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::Result;
use crate::pipeline::PipelineReport;

pub const SUMMARY_FILE: &str = "summary.csv";
pub const SCORES_FILE: &str = "scores.csv";
pub const CHURN_FILE: &str = "churn_dataset.csv";
pub const WARNINGS_FILE: &str = "warnings.json";
pub const FREQUENCY_MODEL_FILE: &str = "frequency_model.json";
pub const MONETARY_MODEL_FILE: &str = "monetary_model.json";

/// Paths written for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WrittenArtifacts {
    pub summary: PathBuf,
    pub scores: PathBuf,
    pub warnings: PathBuf,
    pub frequency_model: PathBuf,
    pub frequency_hash: String,
    /// Absent when scoring fell back to frequency-only
    pub monetary_model: Option<(PathBuf, String)>,
}

/// Write tables, warnings and model blobs for a finished run
pub fn write_report(dir: &Path, report: &PipelineReport) -> Result<WrittenArtifacts> {
    std::fs::create_dir_all(dir)?;

    let summary = dir.join(SUMMARY_FILE);
    write_summary_csv(&summary, &report.summary)?;

    let scores = dir.join(SCORES_FILE);
    write_scores_csv(&scores, &report.scores)?;

    let warnings = dir.join(WARNINGS_FILE);
    std::fs::write(&warnings, serde_json::to_vec_pretty(&report.warnings).map_err(clv_core::ClvError::from)?)?;

    let frequency_model = dir.join(FREQUENCY_MODEL_FILE);
    let frequency_hash = write_model(&frequency_model, &report.frequency)?;

    let monetary_model = match &report.monetary {
        Some(model) => {
            let path = dir.join(MONETARY_MODEL_FILE);
            let hash = write_model(&path, model)?;
            Some((path, hash))
        }
        None => None,
    };

    Ok(WrittenArtifacts {
        summary,
        scores,
        warnings,
        frequency_model,
        frequency_hash,
        monetary_model,
    })
}

/// Write a model blob and a sibling `.hash` file holding the BLAKE3 hex of the blob bytes
pub fn write_model<M: ModelBlob>(path: &Path, model: &M) -> Result<String> {
    let blob = encode_model(model)?;
    std::fs::write(path, &blob)?;

    let hash_hex = hex::encode(blake3::hash(&blob).as_bytes());
    let hash_path = path.with_extension("hash");
    std::fs::write(&hash_path, &hash_hex)?;

    info!("Saved {} model to {} ({})", M::KIND, path.display(), hash_hex);
    Ok(hash_hex)
}

/// Check a blob against its sibling `.hash` file
pub fn verify_model_file(path: &Path) -> Result<bool> {
    let blob = std::fs::read(path)?;
    let expected = std::fs::read_to_string(path.with_extension("hash"))?;
    Ok(hex::encode(blake3::hash(&blob).as_bytes()) == expected.trim())
}

pub fn write_summary_csv(path: &Path, table: &SummaryTable) -> Result<()> {
    write_rows(path, &table.rows)?;
    info!("Wrote {} summary rows to {}", table.rows.len(), path.display());
    Ok(())
}

pub fn write_scores_csv(path: &Path, table: &ScoreTable) -> Result<()> {
    write_rows(path, &table.rows)?;
    info!("Wrote {} scores to {}", table.rows.len(), path.display());
    Ok(())
}

#[derive(Serialize)]
struct ChurnRecord<'a> {
    customer_id: &'a CustomerId,
    orders: u32,
    total_sales: f64,
    avg_order_value: f64,
    recency: f64,
    churned: bool,
}

pub fn write_churn_csv(path: &Path, dataset: &[ChurnExample]) -> Result<()> {
    let records: Vec<ChurnRecord<'_>> = dataset
        .iter()
        .map(|example| ChurnRecord {
            customer_id: &example.features.customer_id,
            orders: example.features.orders,
            total_sales: example.features.total_sales,
            avg_order_value: example.features.avg_order_value,
            recency: example.features.recency,
            churned: example.churned,
        })
        .collect();
    write_rows(path, &records)?;
    info!("Wrote {} churn examples to {}", records.len(), path.display());
    Ok(())
}

fn write_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clv_core::{BetaGeoParams, FrequencyModel};

    #[test]
    fn test_model_hash_file_matches_blob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FREQUENCY_MODEL_FILE);
        let model = FrequencyModel::from_params(BetaGeoParams {
            r: 0.243,
            alpha: 4.414,
            a: 0.793,
            b: 2.426,
        })
        .unwrap();

        let hash = write_model(&path, &model).unwrap();
        assert_eq!(hash.len(), 64);
        assert!(verify_model_file(&path).unwrap());

        std::fs::write(&path, b"{}").unwrap();
        assert!(!verify_model_file(&path).unwrap());
    }

    #[test]
    fn test_churn_rows_are_flat() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CHURN_FILE);
        let dataset = vec![ChurnExample {
            features: clv_core::ChurnFeatures {
                customer_id: "c1".into(),
                orders: 2,
                total_sales: 30.0,
                avg_order_value: 15.0,
                recency: 4.0,
            },
            churned: true,
        }];

        write_churn_csv(&path, &dataset).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("customer_id,orders,total_sales,avg_order_value,recency,churned")
        );
        assert_eq!(lines.next(), Some("c1,2,30.0,15.0,4.0,true"));
    }
}
