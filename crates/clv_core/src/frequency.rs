//! Frequency Model: BG/NBD (beta-geometric / negative binomial distribution)
//!
//! While alive, a customer purchases as a Poisson process with rate
//! `λ ~ Gamma(r, α)`; after each repeat purchase the customer drops out with
//! probability `p ~ Beta(a, b)`. Parameters are fitted jointly over the whole
//! population by penalized maximum likelihood.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::{ClvError, DataWarning, FitError, ModelKind, Result};
use crate::optimizer::{nelder_mead, OptimizerOptions};
use crate::special::{ln_gamma, ln_hyp2f1, log_sum_exp, logistic};
use crate::types::{CustomerSummary, Fitted};

/// Largest observation length after internal rescaling
const TIME_SCALE_TARGET: f64 = 10.0;
/// Default penalty weight on the rescaled parameters
pub const DEFAULT_PENALIZER: f64 = 0.001;
/// Closest `a` may get to 1 in the conditional expectation (removable singularity)
const SINGULARITY_GUARD: f64 = 1e-6;

/// Fitting controls for the frequency model
///
/// The penalty applies to parameters on rescaled time (max T = 10), where
/// weights much above 0.01 drag `a + b` below 1 and the fit is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyFitOptions {
    /// Weight of the `r² + α² + a² + b²` penalty (on rescaled time)
    pub penalizer: f64,
    /// Minimum number of customers with `frequency > 0`
    pub min_repeat_customers: usize,
    pub optimizer: OptimizerOptions,
}

impl Default for FrequencyFitOptions {
    fn default() -> Self {
        Self {
            penalizer: DEFAULT_PENALIZER,
            min_repeat_customers: 2,
            optimizer: OptimizerOptions::default(),
        }
    }
}

/// BG/NBD parameters, `alpha` expressed in the summary's time unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaGeoParams {
    pub r: f64,
    pub alpha: f64,
    pub a: f64,
    pub b: f64,
}

/// Bookkeeping from a successful fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    /// Customers that entered the likelihood
    pub customers: usize,
    /// Rows excluded as degenerate
    pub excluded: usize,
    pub iterations: usize,
    /// Penalized mean negative log-likelihood at the optimum; `None` for
    /// models built from known parameters
    pub objective: Option<f64>,
    pub penalizer: f64,
}

/// Fitted BG/NBD model. Immutable; query it, do not inspect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyModel {
    params: BetaGeoParams,
    diagnostics: FitDiagnostics,
}

/// One collapsed likelihood row: identical (x, t_x, T) customers share a weight
#[derive(Debug, Clone, Copy)]
struct WeightedRow {
    x: f64,
    recency: f64,
    t: f64,
    weight: f64,
}

impl FrequencyModel {
    /// Fit over the full customer population.
    ///
    /// Rows with `T <= 0` are excluded with a [`DataWarning`]. Fails when
    /// fewer than `min_repeat_customers` customers have repeat purchases,
    /// when the optimizer hits its iteration cap, or when the optimum is not
    /// a usable parameter set.
    pub fn fit(
        rows: &[CustomerSummary],
        options: &FrequencyFitOptions,
    ) -> std::result::Result<Fitted<FrequencyModel>, FitError> {
        let mut warnings = Vec::new();
        let mut usable: Vec<&CustomerSummary> = Vec::with_capacity(rows.len());

        for row in rows {
            if !(row.t > 0.0) || !row.t.is_finite() {
                warn!("Excluding customer {} from frequency fit: T = {}", row.customer_id, row.t);
                warnings.push(DataWarning::ZeroObservationLength {
                    customer_id: row.customer_id.clone(),
                });
            } else if !(0.0..=row.t).contains(&row.recency) {
                warn!(
                    "Excluding customer {} from frequency fit: recency {} outside [0, {}]",
                    row.customer_id, row.recency, row.t
                );
            } else {
                usable.push(row);
            }
        }

        if usable.is_empty() {
            return Err(FitError::EmptyPopulation {
                model: ModelKind::Frequency,
            });
        }

        let repeat_customers = usable.iter().filter(|row| row.frequency > 0).count();
        if repeat_customers < options.min_repeat_customers.max(1) {
            return Err(FitError::InsufficientVariance {
                model: ModelKind::Frequency,
                repeat_customers,
                required: options.min_repeat_customers.max(1),
            });
        }

        let max_t = usable.iter().map(|row| row.t).fold(0.0, f64::max);
        let scale = TIME_SCALE_TARGET / max_t;
        let weighted = collapse_rows(&usable, scale);
        let total_weight: f64 = weighted.iter().map(|row| row.weight).sum();
        let penalizer = options.penalizer;

        info!(
            "Fitting frequency model on {} customers ({} distinct rows, {} repeat buyers)",
            usable.len(),
            weighted.len(),
            repeat_customers
        );

        let objective = |log_params: &[f64]| {
            let params = [
                log_params[0].exp(),
                log_params[1].exp(),
                log_params[2].exp(),
                log_params[3].exp(),
            ];
            let [r, alpha, a, b] = params;
            let ll: f64 = weighted
                .iter()
                .map(|row| row.weight * log_likelihood(r, alpha, a, b, row))
                .sum();
            let penalty: f64 = params.iter().map(|p| p * p).sum();
            -ll / total_weight + penalizer * penalty
        };

        let minimum = nelder_mead(objective, &[0.0; 4], &options.optimizer);
        if !minimum.converged {
            return Err(FitError::NonConvergence {
                model: ModelKind::Frequency,
                iterations: minimum.iterations,
            });
        }
        if !minimum.value.is_finite() {
            return Err(FitError::InvalidParameters {
                model: ModelKind::Frequency,
                reason: "objective is not finite at the optimum".to_string(),
            });
        }

        let params = BetaGeoParams {
            r: minimum.x[0].exp(),
            alpha: minimum.x[1].exp() / scale,
            a: minimum.x[2].exp(),
            b: minimum.x[3].exp(),
        };
        validate_params(&params)?;

        info!(
            "Frequency model fitted in {} iterations: r={:.4} alpha={:.4} a={:.4} b={:.4}",
            minimum.iterations, params.r, params.alpha, params.a, params.b
        );

        Ok(Fitted {
            model: FrequencyModel {
                params,
                diagnostics: FitDiagnostics {
                    customers: usable.len(),
                    excluded: rows.len() - usable.len(),
                    iterations: minimum.iterations,
                    objective: Some(minimum.value),
                    penalizer,
                },
            },
            warnings,
        })
    }

    /// Build a model from known parameters
    pub fn from_params(params: BetaGeoParams) -> Result<Self> {
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

    pub fn params(&self) -> BetaGeoParams {
        self.params
    }

    pub fn diagnostics(&self) -> &FitDiagnostics {
        &self.diagnostics
    }

    /// Expected number of repeat transactions in the next `horizon` periods
    /// for a customer with history (frequency, recency, T).
    ///
    /// Non-decreasing in `horizon`; zero for `horizon <= 0`.
    pub fn predict_expected_transactions(
        &self,
        frequency: u32,
        recency: f64,
        t: f64,
        horizon: f64,
    ) -> Result<f64> {
        check_history(recency, t)?;
        if !horizon.is_finite() {
            return Err(ClvError::InvalidInput(format!("horizon {horizon} is not finite")));
        }
        if horizon <= 0.0 {
            return Ok(0.0);
        }

        let BetaGeoParams { r, alpha, a, b } = self.params;
        let a = away_from_one(a);
        let x = frequency as f64;
        let c = a + b + x - 1.0;
        let z = horizon / (alpha + t + horizon);

        let ln_hyp = ln_hyp2f1(r + x, b + x, c, z).ok_or_else(|| {
            ClvError::InvalidInput(format!(
                "hypergeometric term undefined for frequency={frequency} T={t} horizon={horizon}"
            ))
        })?;

        let first = c / (a - 1.0);
        let second = -(ln_hyp + (r + x) * ((alpha + t) / (alpha + t + horizon)).ln()).exp_m1();
        let numerator = first * second;

        let denominator = if frequency > 0 {
            1.0 + a / (b + x - 1.0) * ((alpha + t) / (alpha + recency)).powf(r + x)
        } else {
            1.0
        };

        let expected = numerator / denominator;
        debug!(
            "E[X({horizon})] for (x={frequency}, t_x={recency}, T={t}) = {expected:.6}"
        );
        finite_expectation(expected, || {
            format!("frequency={frequency} recency={recency} T={t} horizon={horizon}")
        })
    }

    /// Probability the customer is still active at the end of observation.
    /// Customers without repeat purchases are alive with probability 1.
    pub fn probability_alive(&self, frequency: u32, recency: f64, t: f64) -> Result<f64> {
        check_history(recency, t)?;
        if frequency == 0 {
            return Ok(1.0);
        }

        let BetaGeoParams { r, alpha, a, b } = self.params;
        let x = frequency as f64;
        let log_odds_dead =
            (r + x) * ((alpha + t) / (alpha + recency)).ln() + (a / (b + x - 1.0)).ln();
        Ok(logistic(-log_odds_dead))
    }

    /// Expected repeat transactions over `horizon` for a customer with no
    /// history: the population-average purchase expectation.
    pub fn expected_transactions_new_customer(&self, horizon: f64) -> Result<f64> {
        if !horizon.is_finite() {
            return Err(ClvError::InvalidInput(format!("horizon {horizon} is not finite")));
        }
        if horizon <= 0.0 {
            return Ok(0.0);
        }

        let BetaGeoParams { r, alpha, a, b } = self.params;
        let a = away_from_one(a);
        let c = a + b - 1.0;
        let z = horizon / (alpha + horizon);
        let ln_hyp = ln_hyp2f1(r, b, c, z).ok_or_else(|| {
            ClvError::InvalidInput(format!("hypergeometric term undefined for horizon={horizon}"))
        })?;

        let expected = c / (a - 1.0) * -(ln_hyp + r * (alpha / (alpha + horizon)).ln()).exp_m1();
        finite_expectation(expected, || format!("new customer, horizon={horizon}"))
    }
}

/// Individual BG/NBD log-likelihood (times already rescaled)
fn log_likelihood(r: f64, alpha: f64, a: f64, b: f64, row: &WeightedRow) -> f64 {
    let x = row.x;
    let a1 = ln_gamma(r + x) - ln_gamma(r) + r * alpha.ln();
    let a2 = ln_gamma(a + b) + ln_gamma(b + x) - ln_gamma(b) - ln_gamma(a + b + x);
    let a3 = -(r + x) * (alpha + row.t).ln();

    if x > 0.0 {
        let a4 = a.ln() - (b + x - 1.0).ln() - (r + x) * (alpha + row.recency).ln();
        a1 + a2 + log_sum_exp(a3, a4)
    } else {
        a1 + a2 + a3
    }
}

/// Collapse identical (frequency, recency, T) rows into weighted rows, rescaling time
fn collapse_rows(rows: &[&CustomerSummary], scale: f64) -> Vec<WeightedRow> {
    let mut keyed: Vec<(u32, f64, f64)> = rows
        .iter()
        .map(|row| (row.frequency, row.recency, row.t))
        .collect();
    keyed.sort_by(|l, r| {
        l.0.cmp(&r.0)
            .then(l.1.total_cmp(&r.1))
            .then(l.2.total_cmp(&r.2))
    });

    let mut weighted: Vec<WeightedRow> = Vec::new();
    let mut previous: Option<(u32, f64, f64)> = None;
    for key in keyed {
        match weighted.last_mut() {
            Some(last) if previous == Some(key) => last.weight += 1.0,
            _ => weighted.push(WeightedRow {
                x: key.0 as f64,
                recency: key.1 * scale,
                t: key.2 * scale,
                weight: 1.0,
            }),
        }
        previous = Some(key);
    }
    weighted
}

fn validate_params(params: &BetaGeoParams) -> std::result::Result<(), FitError> {
    let values = [params.r, params.alpha, params.a, params.b];
    if values.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(FitError::InvalidParameters {
            model: ModelKind::Frequency,
            reason: format!("parameters must be finite and positive, got {params:?}"),
        });
    }
    if params.a + params.b <= 1.0 {
        return Err(FitError::InvalidParameters {
            model: ModelKind::Frequency,
            reason: format!(
                "a + b = {:.4} must exceed 1 for the conditional expectation; lower the penalizer",
                params.a + params.b
            ),
        });
    }
    Ok(())
}

/// Clamp rounding noise below zero; a non-finite expectation is an error, never a score
fn finite_expectation(expected: f64, context: impl FnOnce() -> String) -> Result<f64> {
    if expected.is_finite() {
        Ok(expected.max(0.0))
    } else {
        Err(ClvError::InvalidInput(format!(
            "expected transactions evaluated to {expected} for {}",
            context()
        )))
    }
}

fn check_history(recency: f64, t: f64) -> Result<()> {
    if !t.is_finite() || t < 0.0 || !(0.0..=t).contains(&recency) {
        return Err(ClvError::InvalidInput(format!(
            "customer history must satisfy 0 <= recency <= T, got recency={recency} T={t}"
        )));
    }
    Ok(())
}

fn away_from_one(a: f64) -> f64 {
    if (a - 1.0).abs() >= SINGULARITY_GUARD {
        a
    } else if a >= 1.0 {
        1.0 + SINGULARITY_GUARD
    } else {
        1.0 - SINGULARITY_GUARD
    }
}
