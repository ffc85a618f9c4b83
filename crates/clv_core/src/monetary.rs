//! Monetary Model: Gamma-Gamma spend model
//!
//! Each transaction value is `Gamma(p, ν)` with a customer-level rate
//! `ν ~ Gamma(q, v)`. The model is fitted only on customers with repeat
//! purchases and positive average spend, and predicts a shrinkage estimate
//! of each customer's true mean transaction value.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{FitError, ModelKind, Result};
use crate::frequency::FitDiagnostics;
use crate::optimizer::{nelder_mead, OptimizerOptions};
use crate::special::ln_gamma;
use crate::types::{CustomerSummary, Fitted};

/// Largest monetary value after internal rescaling
const VALUE_SCALE_TARGET: f64 = 10.0;

/// Fitting controls for the monetary model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonetaryFitOptions {
    /// Weight of the `p² + q² + v²` penalty (on rescaled values)
    pub penalizer: f64,
    pub optimizer: OptimizerOptions,
}

impl Default for MonetaryFitOptions {
    fn default() -> Self {
        Self {
            penalizer: 0.01,
            optimizer: OptimizerOptions::default(),
        }
    }
}

/// Gamma-Gamma parameters, `v` expressed in the input currency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GammaGammaParams {
    pub p: f64,
    pub q: f64,
    pub v: f64,
}

/// Fitted Gamma-Gamma model. Immutable; query it, do not inspect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonetaryModel {
    params: GammaGammaParams,
    diagnostics: FitDiagnostics,
}

impl MonetaryModel {
    /// Fit over the subset with `frequency > 0` and `monetary_value > 0`.
    ///
    /// Outliers should already be capped by the caller. A failure here is
    /// recoverable: scoring can continue frequency-only.
    pub fn fit(
        rows: &[CustomerSummary],
        options: &MonetaryFitOptions,
    ) -> std::result::Result<Fitted<MonetaryModel>, FitError> {
        let population: Vec<(f64, f64)> = rows
            .iter()
            .filter(|row| row.is_monetary_eligible())
            .filter_map(|row| row.monetary_value.map(|m| (row.frequency as f64, m)))
            .filter(|(_, m)| m.is_finite())
            .collect();

        debug!(
            "Monetary fitting population: {} of {} customers",
            population.len(),
            rows.len()
        );

        if population.is_empty() {
            return Err(FitError::EmptyPopulation {
                model: ModelKind::Monetary,
            });
        }

        let max_value = population.iter().map(|(_, m)| *m).fold(0.0, f64::max);
        let scale = VALUE_SCALE_TARGET / max_value;
        let scaled: Vec<(f64, f64)> = population.iter().map(|(x, m)| (*x, m * scale)).collect();
        let penalizer = options.penalizer;

        info!("Fitting monetary model on {} customers", scaled.len());

        let objective = |log_params: &[f64]| {
            let params = [log_params[0].exp(), log_params[1].exp(), log_params[2].exp()];
            let [p, q, v] = params;
            let ll: f64 = scaled
                .iter()
                .map(|&(x, m)| {
                    ln_gamma(p * x + q) - ln_gamma(p * x) - ln_gamma(q) + q * v.ln()
                        + (p * x - 1.0) * m.ln()
                        + p * x * x.ln()
                        - (p * x + q) * (x * m + v).ln()
                })
                .sum();
            let penalty: f64 = params.iter().map(|p| p * p).sum();
            -ll / scaled.len() as f64 + penalizer * penalty
        };

        let minimum = nelder_mead(objective, &[0.0; 3], &options.optimizer);
        if !minimum.converged {
            return Err(FitError::NonConvergence {
                model: ModelKind::Monetary,
                iterations: minimum.iterations,
            });
        }
        if !minimum.value.is_finite() {
            return Err(FitError::InvalidParameters {
                model: ModelKind::Monetary,
                reason: "objective is not finite at the optimum".to_string(),
            });
        }

        let params = GammaGammaParams {
            p: minimum.x[0].exp(),
            q: minimum.x[1].exp(),
            v: minimum.x[2].exp() / scale,
        };
        validate_params(&params)?;

        info!(
            "Monetary model fitted in {} iterations: p={:.4} q={:.4} v={:.4}",
            minimum.iterations, params.p, params.q, params.v
        );

        Ok(Fitted {
            model: MonetaryModel {
                params,
                diagnostics: FitDiagnostics {
                    customers: population.len(),
                    excluded: rows.len() - population.len(),
                    iterations: minimum.iterations,
                    objective: Some(minimum.value),
                    penalizer,
                },
            },
            warnings: Vec::new(),
        })
    }

    /// Build a model from known parameters
    pub fn from_params(params: GammaGammaParams) -> Result<Self> {
        validate_params(&params)?;
        Ok(Self {
            params,
            diagnostics: FitDiagnostics {
                customers: 0,
                excluded: 0,
                iterations: 0,
                objective: None,
                penalizer: 0.0,
            },
        })
    }

    pub fn params(&self) -> GammaGammaParams {
        self.params
    }

    pub fn diagnostics(&self) -> &FitDiagnostics {
        &self.diagnostics
    }

    /// Population mean transaction value `p v / (q - 1)`
    pub fn population_mean(&self) -> f64 {
        let GammaGammaParams { p, q, v } = self.params;
        v * p / (q - 1.0)
    }

    /// Shrinkage estimate of a customer's mean transaction value.
    ///
    /// Blends the observed `monetary_value` with the population mean, with
    /// weight `p x / (p x + q - 1)` on the observation. The weight tends to
    /// 1 as `frequency` grows. Customers without repeat evidence (frequency
    /// 0, or a non-positive value) get the population mean.
    pub fn predict_expected_value(&self, frequency: u32, monetary_value: f64) -> f64 {
        let population_mean = self.population_mean();
        if frequency == 0 || !monetary_value.is_finite() || monetary_value <= 0.0 {
            return population_mean;
        }

        let GammaGammaParams { p, q, .. } = self.params;
        let px = p * frequency as f64;
        let weight = px / (px + q - 1.0);
        (1.0 - weight) * population_mean + weight * monetary_value
    }
}

fn validate_params(params: &GammaGammaParams) -> std::result::Result<(), FitError> {
    let values = [params.p, params.q, params.v];
    if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(FitError::InvalidParameters {
            model: ModelKind::Monetary,
            reason: format!("parameters must be finite and positive, got {params:?}"),
        });
    }
    if params.q <= 1.0 {
        return Err(FitError::InvalidParameters {
            model: ModelKind::Monetary,
            reason: format!("q = {:.4} must exceed 1 for a finite population mean", params.q),
        });
    }
    Ok(())
}
