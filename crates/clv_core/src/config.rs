//! Configuration for summarizing, fitting and scoring

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::errors::{ClvError, Result};
use crate::frequency::{FrequencyFitOptions, DEFAULT_PENALIZER};
use crate::monetary::MonetaryFitOptions;
use crate::optimizer::OptimizerOptions;
use crate::summary::SummaryOptions;
use crate::types::TimeUnit;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClvConfig {
    pub summary: SummaryConfig,
    pub frequency: FrequencyConfig,
    pub monetary: MonetaryConfig,
    pub scoring: ScoringConfig,
    pub churn: ChurnConfig,
}

/// Input columns and the observation window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub customer_id_column: String,
    pub order_date_column: String,
    /// Column holding the order amount
    pub monetary_column: String,
    pub time_unit: TimeUnit,
    /// Explicit snapshot; defaults to one period past the latest order
    pub observation_end: Option<NaiveDateTime>,
}

/// Frequency model fitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrequencyConfig {
    pub penalizer: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub min_repeat_customers: usize,
}

/// Monetary model fitting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonetaryConfig {
    pub penalizer: f64,
    /// Quantile at which monetary values are capped before fitting; `None` disables capping
    pub cap_quantile: Option<f64>,
    pub max_iterations: usize,
    pub tolerance: f64,
}

/// Scoring horizon and tiering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Horizon in periods of `summary.time_unit`
    pub horizon: f64,
    pub tiers: u32,
}

/// Churn label window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChurnConfig {
    /// Label window in periods of `summary.time_unit`
    pub label_window: i64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            customer_id_column: "customer_id".to_string(),
            order_date_column: "order_date".to_string(),
            monetary_column: "order_amount".to_string(),
            time_unit: TimeUnit::Days,
            observation_end: None,
        }
    }
}

impl Default for FrequencyConfig {
    fn default() -> Self {
        Self {
            penalizer: DEFAULT_PENALIZER,
            max_iterations: 10_000,
            tolerance: 1e-7,
            min_repeat_customers: 2,
        }
    }
}

impl Default for MonetaryConfig {
    fn default() -> Self {
        Self {
            penalizer: 0.01,
            cap_quantile: Some(0.99),
            max_iterations: 10_000,
            tolerance: 1e-7,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            horizon: 90.0,
            tiers: 4,
        }
    }
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self { label_window: 30 }
    }
}

impl ClvConfig {
    /// Parse a TOML document; missing fields take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ClvConfig =
            toml::from_str(content).map_err(|e| ClvError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Serialize as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ClvError::Config(format!("failed to serialize config: {e}")))
    }

    /// Reject values no run can succeed with
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        for (name, column) in [
            ("customer_id_column", &self.summary.customer_id_column),
            ("order_date_column", &self.summary.order_date_column),
            ("monetary_column", &self.summary.monetary_column),
        ] {
            if column.trim().is_empty() {
                problems.push(format!("summary.{name} is empty"));
            }
        }

        for (name, penalizer) in [
            ("frequency", self.frequency.penalizer),
            ("monetary", self.monetary.penalizer),
        ] {
            if !penalizer.is_finite() || penalizer < 0.0 {
                problems.push(format!("{name}.penalizer must be a non-negative number"));
            }
        }

        for (name, iterations, tolerance) in [
            ("frequency", self.frequency.max_iterations, self.frequency.tolerance),
            ("monetary", self.monetary.max_iterations, self.monetary.tolerance),
        ] {
            if iterations == 0 {
                problems.push(format!("{name}.max_iterations must be at least 1"));
            }
            if !(tolerance > 0.0 && tolerance.is_finite()) {
                problems.push(format!("{name}.tolerance must be positive"));
            }
        }

        if let Some(q) = self.monetary.cap_quantile {
            if !(q > 0.0 && q <= 1.0) {
                problems.push("monetary.cap_quantile must be in (0, 1]".to_string());
            }
        }
        if !self.scoring.horizon.is_finite() || self.scoring.horizon < 0.0 {
            problems.push("scoring.horizon must be a non-negative number".to_string());
        }
        if self.scoring.tiers == 0 {
            problems.push("scoring.tiers must be at least 1".to_string());
        }
        if self.churn.label_window <= 0 {
            problems.push("churn.label_window must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ClvError::Config(problems.join("; ")))
        }
    }

    pub fn summary_options(&self) -> SummaryOptions {
        SummaryOptions {
            time_unit: self.summary.time_unit,
            observation_end: self.summary.observation_end,
        }
    }

    pub fn frequency_fit_options(&self) -> FrequencyFitOptions {
        FrequencyFitOptions {
            penalizer: self.frequency.penalizer,
            min_repeat_customers: self.frequency.min_repeat_customers,
            optimizer: OptimizerOptions {
                max_iterations: self.frequency.max_iterations,
                tolerance: self.frequency.tolerance,
                ..OptimizerOptions::default()
            },
        }
    }

    pub fn monetary_fit_options(&self) -> MonetaryFitOptions {
        MonetaryFitOptions {
            penalizer: self.monetary.penalizer,
            optimizer: OptimizerOptions {
                max_iterations: self.monetary.max_iterations,
                tolerance: self.monetary.tolerance,
                ..OptimizerOptions::default()
            },
        }
    }
}
