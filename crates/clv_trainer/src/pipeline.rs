//! End-to-end batch run: summarize, fit, score
//!
//! A frequency fit failure aborts the run. A monetary fit failure is
//! recorded as a warning and scoring continues frequency-only.

use clv_core::{
    build_churn_dataset, cap_monetary_values, summarize, ChurnExample, ClvConfig, DataWarning,
    FrequencyModel, MonetaryModel, ScoreTable, SummaryTable, Transaction, ValueScorer,
};
use tracing::{info, warn};

use crate::errors::Result;

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub summary: SummaryTable,
    /// Threshold applied to `monetary_value` before the monetary fit
    pub cap_threshold: Option<f64>,
    pub frequency: FrequencyModel,
    pub monetary: Option<MonetaryModel>,
    pub scores: ScoreTable,
    pub warnings: Vec<DataWarning>,
}

/// Batch CLV pipeline driven by a validated [`ClvConfig`]
#[derive(Debug, Clone)]
pub struct ClvPipeline {
    config: ClvConfig,
}

impl ClvPipeline {
    pub fn new(config: ClvConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClvConfig {
        &self.config
    }

    pub fn run(&self, transactions: &[Transaction]) -> Result<PipelineReport> {
        let config = &self.config;

        let summary = summarize(transactions, &config.summary_options())?;
        let mut warnings = summary.diagnostics();
        info!(
            "Summary: {} customers, {} repeat buyers",
            summary.len(),
            summary.repeat_customers()
        );

        let fitted = FrequencyModel::fit(&summary.rows, &config.frequency_fit_options())?;
        let frequency = fitted.model;
        for warning in fitted.warnings {
            if !warnings.contains(&warning) {
                warnings.push(warning);
            }
        }

        let (monetary_rows, cap_threshold) = match config.monetary.cap_quantile {
            Some(q) => cap_monetary_values(&summary.rows, q)?,
            None => (summary.rows.clone(), None),
        };
        if let Some(threshold) = cap_threshold {
            info!("Monetary values capped at {:.4}", threshold);
        }

        let monetary = match MonetaryModel::fit(&monetary_rows, &config.monetary_fit_options()) {
            Ok(fitted) => {
                warnings.extend(fitted.warnings);
                Some(fitted.model)
            }
            Err(err) => {
                warn!("Monetary model unavailable, scoring frequency-only: {}", err);
                warnings.push(DataWarning::MonetaryModelUnavailable {
                    reason: err.to_string(),
                });
                None
            }
        };

        let scorer = ValueScorer::new(&frequency, monetary.as_ref(), config.scoring.horizon)?;
        let scores = scorer.score_population(&summary.rows, config.scoring.tiers)?;

        if !warnings.is_empty() {
            info!("Run finished with {} data warnings", warnings.len());
        }

        Ok(PipelineReport {
            summary,
            cap_threshold,
            frequency,
            monetary,
            scores,
            warnings,
        })
    }

    /// Churn labels and pre-cutoff features over the same transaction log
    pub fn churn_dataset(&self, transactions: &[Transaction]) -> Result<Vec<ChurnExample>> {
        let dataset = build_churn_dataset(
            transactions,
            self.config.churn.label_window,
            self.config.summary.time_unit,
        )?;
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::TrainerError;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
    use clv_core::{FitError, ScoreBasis};

    fn day(n: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
            + TimeDelta::days(n)
    }

    fn relaxed_config() -> ClvConfig {
        let mut config = ClvConfig::default();
        config.monetary.penalizer = 0.001;
        config
    }

    /// Deterministic log with a spread of purchase rates and spends
    fn transactions() -> Vec<Transaction> {
        let mut out = Vec::new();
        for customer in 0..60i64 {
            let id = format!("cust-{customer:03}");
            let start = customer % 20;
            let gap = 3 + customer % 11;
            let orders = 1 + customer % 6;
            for k in 0..orders {
                let amount = 10.0 + ((customer * 7 + k * 13) % 40) as f64;
                out.push(Transaction::new(id.as_str(), day(start + k * gap), amount));
            }
        }
        out
    }

    #[test]
    fn test_run_produces_monetary_scores() {
        let pipeline = ClvPipeline::new(relaxed_config()).unwrap();
        let report = pipeline.run(&transactions()).unwrap();

        assert_eq!(report.summary.len(), 60);
        assert_eq!(report.scores.rows.len(), 60);
        assert!(report.monetary.is_some());
        assert_eq!(report.scores.basis, ScoreBasis::Monetary);
        assert!(report.cap_threshold.is_some());
    }

    #[test]
    fn test_default_config_runs_end_to_end() {
        let report = ClvPipeline::new(ClvConfig::default())
            .unwrap()
            .run(&transactions())
            .unwrap();

        let params = report.frequency.params();
        assert!(params.a + params.b > 1.0);
        assert_eq!(report.scores.rows.len(), 60);
        assert!(report.scores.rows.iter().all(|s| s.expected_value.is_finite()));
    }

    #[test]
    fn test_monetary_failure_degrades_to_frequency_only() {
        // Repeat orders all worth zero leave nothing for the monetary model
        let mut log = transactions();
        for tx in log.iter_mut() {
            tx.order_amount = 0.0;
        }

        let report = ClvPipeline::new(relaxed_config()).unwrap().run(&log).unwrap();
        assert!(report.monetary.is_none());
        assert_eq!(report.scores.basis, ScoreBasis::FrequencyOnly);
        assert!(report
            .warnings
            .iter()
            .any(|w| matches!(w, DataWarning::MonetaryModelUnavailable { .. })));
    }

    #[test]
    fn test_frequency_failure_aborts() {
        let log = vec![
            Transaction::new("a", day(0), 5.0),
            Transaction::new("b", day(1), 5.0),
            Transaction::new("c", day(2), 5.0),
        ];
        let err = ClvPipeline::new(relaxed_config()).unwrap().run(&log).unwrap_err();
        assert!(matches!(err, TrainerError::Fit(FitError::InsufficientVariance { .. })));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ClvConfig::default();
        config.scoring.tiers = 0;
        assert!(matches!(ClvPipeline::new(config), Err(TrainerError::Clv(_))));
    }

    #[test]
    fn test_churn_dataset_covers_every_customer() {
        let pipeline = ClvPipeline::new(relaxed_config()).unwrap();
        let dataset = pipeline.churn_dataset(&transactions()).unwrap();
        assert_eq!(dataset.len(), 60);
    }
}
