//! Data hygiene applied before model fitting

use tracing::debug;

use crate::errors::{ClvError, Result};
use crate::types::CustomerSummary;

/// Rows usable for the monetary model: `frequency > 0` and `monetary_value > 0`
pub fn monetary_fitting_population(rows: &[CustomerSummary]) -> Vec<CustomerSummary> {
    rows.iter()
        .filter(|row| row.is_monetary_eligible())
        .cloned()
        .collect()
}

/// Quantile of `values` using linear interpolation between order statistics
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;

    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Cap `monetary_value` at the given quantile of the monetary fitting population.
///
/// Only `monetary_value` changes; `frequency`, `recency` and `T` are copied
/// through untouched. Returns the capped rows and the threshold used
/// (`None` when no row is eligible for monetary fitting).
pub fn cap_monetary_values(
    rows: &[CustomerSummary],
    cap_quantile: f64,
) -> Result<(Vec<CustomerSummary>, Option<f64>)> {
    if !(cap_quantile > 0.0 && cap_quantile <= 1.0) {
        return Err(ClvError::InvalidInput(format!(
            "cap quantile must be in (0, 1], got {cap_quantile}"
        )));
    }

    let eligible: Vec<f64> = rows
        .iter()
        .filter(|row| row.is_monetary_eligible())
        .filter_map(|row| row.monetary_value)
        .collect();

    let Some(threshold) = quantile(&eligible, cap_quantile) else {
        return Ok((rows.to_vec(), None));
    };

    let mut capped_count = 0usize;
    let capped = rows
        .iter()
        .map(|row| {
            let mut row = row.clone();
            if let Some(value) = row.monetary_value {
                if value > threshold {
                    row.monetary_value = Some(threshold);
                    capped_count += 1;
                }
            }
            row
        })
        .collect();

    debug!(
        "Capped {} monetary values at {:.4} (q={})",
        capped_count, threshold, cap_quantile
    );

    Ok((capped, Some(threshold)))
}
