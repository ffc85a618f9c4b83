//! Value Scorer
//!
//! Combines the frequency and monetary models into an expected customer
//! value over a horizon, then ranks customers into ordinal tiers.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{info, warn};

use crate::errors::{ClvError, Result};
use crate::frequency::FrequencyModel;
use crate::monetary::MonetaryModel;
use crate::types::{CustomerId, CustomerSummary};

/// Unit of `expected_value` in a score table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBasis {
    /// Expected transactions × expected value per transaction (currency)
    Monetary,
    /// Expected transactions only (a count, not currency); used when the
    /// monetary model is unavailable
    FrequencyOnly,
}

/// Score for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerScore {
    pub customer_id: CustomerId,
    pub expected_transactions: f64,
    /// Expected value per transaction; `None` under [`ScoreBasis::FrequencyOnly`]
    pub expected_order_value: Option<f64>,
    pub probability_alive: f64,
    pub expected_value: f64,
    /// 1 is the highest-value tier; 0 until tiers are assigned
    pub tier: u32,
}

/// Ranked scores, highest `expected_value` first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTable {
    pub basis: ScoreBasis,
    pub horizon: f64,
    pub tiers: u32,
    pub rows: Vec<CustomerScore>,
}

impl ScoreTable {
    pub fn get(&self, customer_id: &CustomerId) -> Option<&CustomerScore> {
        self.rows.iter().find(|row| &row.customer_id == customer_id)
    }

    /// Customers in the given tier, in rank order
    pub fn tier(&self, tier: u32) -> impl Iterator<Item = &CustomerScore> {
        self.rows.iter().filter(move |row| row.tier == tier)
    }
}

/// Scores customers against a fitted frequency model and, when available,
/// a fitted monetary model.
///
/// Customers without repeat purchases are scored on their own observation
/// length: without a monetary model, zero-history customers sharing the same
/// `T` get equal scores, but a longer silent `T` lowers the expectation. Use
/// [`FrequencyModel::expected_transactions_new_customer`] for the
/// population-average rate that ignores `T`.
#[derive(Debug, Clone, Copy)]
pub struct ValueScorer<'a> {
    frequency: &'a FrequencyModel,
    monetary: Option<&'a MonetaryModel>,
    horizon: f64,
}

impl<'a> ValueScorer<'a> {
    /// Create a scorer. Without a monetary model, scores fall back to
    /// expected transaction counts ([`ScoreBasis::FrequencyOnly`]).
    pub fn new(
        frequency: &'a FrequencyModel,
        monetary: Option<&'a MonetaryModel>,
        horizon: f64,
    ) -> Result<Self> {
        if !horizon.is_finite() || horizon < 0.0 {
            return Err(ClvError::InvalidInput(format!(
                "scoring horizon must be a non-negative number, got {horizon}"
            )));
        }
        if monetary.is_none() {
            warn!("No monetary model: scores are expected transaction counts, not currency");
        }
        Ok(Self {
            frequency,
            monetary,
            horizon,
        })
    }

    pub fn basis(&self) -> ScoreBasis {
        match self.monetary {
            Some(_) => ScoreBasis::Monetary,
            None => ScoreBasis::FrequencyOnly,
        }
    }

    /// Expected value of one customer over the horizon
    pub fn score(&self, summary: &CustomerSummary) -> Result<f64> {
        Ok(self.score_customer(summary)?.expected_value)
    }

    /// Full score breakdown for one customer (tier left at 0)
    pub fn score_customer(&self, summary: &CustomerSummary) -> Result<CustomerScore> {
        let expected_transactions = self.frequency.predict_expected_transactions(
            summary.frequency,
            summary.recency,
            summary.t,
            self.horizon,
        )?;
        let probability_alive =
            self.frequency
                .probability_alive(summary.frequency, summary.recency, summary.t)?;

        let expected_order_value = self.monetary.map(|model| {
            model.predict_expected_value(summary.frequency, summary.monetary_value.unwrap_or(0.0))
        });
        let expected_value = match expected_order_value {
            Some(value) => expected_transactions * value,
            None => expected_transactions,
        };

        Ok(CustomerScore {
            customer_id: summary.customer_id.clone(),
            expected_transactions,
            expected_order_value,
            probability_alive,
            expected_value,
            tier: 0,
        })
    }

    /// Score, rank and tier a whole population
    pub fn score_population(&self, rows: &[CustomerSummary], tiers: u32) -> Result<ScoreTable> {
        if tiers == 0 {
            return Err(ClvError::InvalidInput("tier count must be at least 1".to_string()));
        }

        let mut scores = rows
            .iter()
            .map(|row| self.score_customer(row))
            .collect::<Result<Vec<_>>>()?;
        assign_tiers(&mut scores, tiers);

        let total: f64 = scores.iter().map(|s| s.expected_value).sum();
        info!(
            "Scored {} customers over horizon {} ({:?}), total expected value {:.2}",
            scores.len(),
            self.horizon,
            self.basis(),
            total
        );

        Ok(ScoreTable {
            basis: self.basis(),
            horizon: self.horizon,
            tiers,
            rows: scores,
        })
    }
}

/// Expected value of one customer: expected transactions × expected
/// transaction value, or expected transactions alone when `monetary` is `None`.
pub fn score(
    frequency: &FrequencyModel,
    monetary: Option<&MonetaryModel>,
    summary: &CustomerSummary,
    horizon: f64,
) -> Result<f64> {
    ValueScorer::new(frequency, monetary, horizon)?.score(summary)
}

/// Sort by `expected_value` descending (ties by `customer_id` ascending) and
/// bucket into `tiers` equal-count tiers, tier 1 highest.
pub fn assign_tiers(scores: &mut [CustomerScore], tiers: u32) {
    scores.sort_by(|a, b| match b.expected_value.total_cmp(&a.expected_value) {
        Ordering::Equal => a.customer_id.cmp(&b.customer_id),
        other => other,
    });

    let n = scores.len() as u64;
    for (rank, score) in scores.iter_mut().enumerate() {
        score.tier = 1 + (rank as u64 * tiers as u64 / n) as u32;
    }
}
