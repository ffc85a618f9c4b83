//! Time-split churn labeling and leakage-safe feature windows
//!
//! Produces the inputs a churn classifier trains on; the classifier itself
//! lives outside this crate. Features only ever see orders at or before the
//! cutoff, labels only orders after it.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

use crate::errors::{ClvError, Result};
use crate::types::{CustomerId, TimeUnit, Transaction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChurnLabel {
    pub customer_id: CustomerId,
    /// No order in (cutoff, snapshot]
    pub churned: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnLabels {
    /// Latest order date in the log
    pub snapshot: NaiveDateTime,
    /// `snapshot - label_window`
    pub cutoff: NaiveDateTime,
    pub labels: Vec<ChurnLabel>,
}

/// Aggregates over a customer's orders at or before the cutoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnFeatures {
    pub customer_id: CustomerId,
    pub orders: u32,
    pub total_sales: f64,
    pub avg_order_value: f64,
    /// Whole periods between the last pre-cutoff order and the cutoff
    pub recency: f64,
}

/// Features joined with their label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnExample {
    pub features: ChurnFeatures,
    pub churned: bool,
}

/// Label every customer in the log as churned or retained.
///
/// `label_window` is measured in periods of `unit`.
pub fn label_churn(transactions: &[Transaction], label_window: i64, unit: TimeUnit) -> Result<ChurnLabels> {
    if label_window <= 0 {
        return Err(ClvError::InvalidInput(format!(
            "churn label window must be positive, got {label_window}"
        )));
    }
    let snapshot = transactions
        .iter()
        .map(|tx| tx.order_date)
        .max()
        .ok_or_else(|| ClvError::InvalidInput("transaction set is empty".to_string()))?;
    let cutoff = snapshot - unit.span(label_window);

    let active: BTreeSet<&CustomerId> = transactions
        .iter()
        .filter(|tx| tx.order_date > cutoff)
        .map(|tx| &tx.customer_id)
        .collect();
    let customers: BTreeSet<&CustomerId> = transactions.iter().map(|tx| &tx.customer_id).collect();

    let labels: Vec<ChurnLabel> = customers
        .into_iter()
        .map(|customer_id| ChurnLabel {
            customer_id: customer_id.clone(),
            churned: !active.contains(customer_id),
        })
        .collect();

    let churned = labels.iter().filter(|l| l.churned).count();
    info!(
        "Churn labels: {} of {} customers churned (cutoff {}, snapshot {})",
        churned,
        labels.len(),
        cutoff,
        snapshot
    );

    Ok(ChurnLabels {
        snapshot,
        cutoff,
        labels,
    })
}

/// Per-customer features using only orders at or before `cutoff`.
///
/// Every customer in the log gets a row; customers whose first order is
/// after the cutoff get zeros.
pub fn build_churn_features(
    transactions: &[Transaction],
    cutoff: NaiveDateTime,
    unit: TimeUnit,
) -> Vec<ChurnFeatures> {
    let mut windows: BTreeMap<&CustomerId, (u32, f64, Option<NaiveDateTime>)> = BTreeMap::new();

    for tx in transactions {
        let entry = windows.entry(&tx.customer_id).or_insert((0, 0.0, None));
        if tx.order_date <= cutoff {
            entry.0 += 1;
            entry.1 += tx.order_amount;
            entry.2 = entry.2.max(Some(tx.order_date));
        }
    }

    let cutoff_period = unit.period_index(&cutoff);
    windows
        .into_iter()
        .map(|(customer_id, (orders, total_sales, last_order))| ChurnFeatures {
            customer_id: customer_id.clone(),
            orders,
            total_sales,
            avg_order_value: if orders > 0 { total_sales / orders as f64 } else { 0.0 },
            recency: last_order
                .map(|last| (cutoff_period - unit.period_index(&last)) as f64)
                .unwrap_or(0.0),
        })
        .collect()
}

/// Label the log and build the matching leakage-safe features
pub fn build_churn_dataset(
    transactions: &[Transaction],
    label_window: i64,
    unit: TimeUnit,
) -> Result<Vec<ChurnExample>> {
    let labels = label_churn(transactions, label_window, unit)?;
    let features = build_churn_features(transactions, labels.cutoff, unit);

    Ok(features
        .into_iter()
        .zip(labels.labels)
        .map(|(features, label)| ChurnExample {
            churned: label.churned,
            features,
        })
        .collect())
}
