//! Transaction Summarizer
//!
//! Reduces a raw order log into one recency/frequency/monetary row per
//! customer, measured against a single global snapshot so that the same
//! transaction set always yields the same table.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::errors::{ClvError, DataWarning, Result};
use crate::types::{CustomerId, CustomerSummary, TimeUnit, Transaction};

/// Options controlling how the snapshot and elapsed times are computed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryOptions {
    pub time_unit: TimeUnit,
    /// Explicit observation end. Defaults to one period past the latest
    /// order; orders after an explicit end are ignored.
    pub observation_end: Option<NaiveDateTime>,
}

/// Per-customer summary table, sorted by customer id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryTable {
    pub snapshot: NaiveDateTime,
    pub time_unit: TimeUnit,
    pub rows: Vec<CustomerSummary>,
}

impl SummaryTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a customer's row
    pub fn get(&self, customer_id: &CustomerId) -> Option<&CustomerSummary> {
        self.rows
            .binary_search_by(|row| row.customer_id.cmp(customer_id))
            .ok()
            .map(|idx| &self.rows[idx])
    }

    /// Number of customers with at least one repeat purchase
    pub fn repeat_customers(&self) -> usize {
        self.rows.iter().filter(|row| row.frequency > 0).count()
    }

    /// Degenerate-data warnings for this table
    pub fn diagnostics(&self) -> Vec<DataWarning> {
        let mut warnings: Vec<DataWarning> = self
            .rows
            .iter()
            .filter(|row| row.t <= 0.0)
            .map(|row| DataWarning::ZeroObservationLength {
                customer_id: row.customer_id.clone(),
            })
            .collect();

        if !self.rows.is_empty() && self.repeat_customers() == 0 {
            warnings.push(DataWarning::AllZeroFrequency {
                customers: self.rows.len(),
            });
        }

        warnings
    }
}

/// Summarize a transaction log into one row per customer.
///
/// * `frequency` = number of transactions - 1
/// * `recency` = last period - first period
/// * `T` = snapshot period - first period
/// * `monetary_value` = mean amount over every transaction except the first
///
/// Same-date duplicates are distinct events. Fails with
/// [`ClvError::InvalidInput`] on empty input, blank customer ids or
/// negative/non-finite amounts.
pub fn summarize(transactions: &[Transaction], options: &SummaryOptions) -> Result<SummaryTable> {
    if transactions.is_empty() {
        return Err(ClvError::InvalidInput("transaction set is empty".to_string()));
    }

    for tx in transactions {
        if tx.customer_id.as_str().trim().is_empty() {
            return Err(ClvError::InvalidInput(format!(
                "transaction on {} has an empty customer_id",
                tx.order_date
            )));
        }
        if !tx.order_amount.is_finite() || tx.order_amount < 0.0 {
            return Err(ClvError::InvalidInput(format!(
                "customer {}: order_amount {} is not a non-negative number",
                tx.customer_id, tx.order_amount
            )));
        }
    }

    let unit = options.time_unit;
    let (snapshot_period, in_window): (i64, Vec<&Transaction>) = match options.observation_end {
        Some(end) => {
            let kept: Vec<&Transaction> = transactions.iter().filter(|tx| tx.order_date <= end).collect();
            debug!(
                "Observation end {}: dropped {} later transactions",
                end,
                transactions.len() - kept.len()
            );
            (unit.period_index(&end), kept)
        }
        None => {
            let latest = transactions
                .iter()
                .map(|tx| unit.period_index(&tx.order_date))
                .max()
                .unwrap_or_default();
            (latest + 1, transactions.iter().collect())
        }
    };

    if in_window.is_empty() {
        return Err(ClvError::InvalidInput(
            "no transactions at or before the observation end".to_string(),
        ));
    }

    let snapshot = unit
        .period_start(snapshot_period)
        .ok_or_else(|| ClvError::InvalidInput("snapshot date out of range".to_string()))?;

    let mut groups: BTreeMap<&CustomerId, Vec<&Transaction>> = BTreeMap::new();
    for tx in in_window.iter().copied() {
        groups.entry(&tx.customer_id).or_default().push(tx);
    }

    let rows: Vec<CustomerSummary> = groups
        .into_iter()
        .map(|(customer_id, mut orders)| {
            orders.sort_by_key(|tx| tx.order_date);
            summarize_customer(customer_id, &orders, snapshot_period, unit)
        })
        .collect();

    info!(
        "Summarized {} transactions into {} customers (snapshot {}, unit {})",
        in_window.len(),
        rows.len(),
        snapshot,
        unit
    );

    Ok(SummaryTable {
        snapshot,
        time_unit: unit,
        rows,
    })
}

/// Summarize one customer's date-sorted orders
fn summarize_customer(
    customer_id: &CustomerId,
    orders: &[&Transaction],
    snapshot_period: i64,
    unit: TimeUnit,
) -> CustomerSummary {
    let first = unit.period_index(&orders[0].order_date);
    let last = unit.period_index(&orders[orders.len() - 1].order_date);
    let repeats = &orders[1..];

    let monetary_value = if repeats.is_empty() {
        None
    } else {
        let total: f64 = repeats.iter().map(|tx| tx.order_amount).sum();
        Some(total / repeats.len() as f64)
    };

    CustomerSummary {
        customer_id: customer_id.clone(),
        frequency: repeats.len() as u32,
        recency: (last - first) as f64,
        t: (snapshot_period - first) as f64,
        monetary_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(n: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap()
            + TimeUnit::Days.span(n)
    }

    #[test]
    fn test_three_order_customer() {
        let txs = vec![
            Transaction::new("C1", day(0), 10.0),
            Transaction::new("C1", day(10), 20.0),
            Transaction::new("C1", day(20), 30.0),
        ];

        let table = summarize(&txs, &SummaryOptions::default()).unwrap();
        assert_eq!(table.len(), 1);

        let row = &table.rows[0];
        assert_eq!(row.frequency, 2);
        assert_eq!(row.recency, 20.0);
        assert_eq!(row.t, 21.0);
        assert_eq!(row.monetary_value, Some(25.0));
        assert_eq!(table.snapshot.date(), day(21).date());
    }

    #[test]
    fn test_single_order_customer() {
        let txs = vec![
            Transaction::new("A", day(0), 10.0),
            Transaction::new("B", day(5), 40.0),
        ];

        let table = summarize(&txs, &SummaryOptions::default()).unwrap();
        let a = table.get(&"A".into()).unwrap();
        assert_eq!(a.frequency, 0);
        assert_eq!(a.recency, 0.0);
        assert_eq!(a.t, 6.0);
        assert_eq!(a.monetary_value, None);
        assert!(!a.is_monetary_eligible());
    }

    #[test]
    fn test_unsorted_input_and_same_day_duplicates() {
        let txs = vec![
            Transaction::new("C", day(4), 0.0),
            Transaction::new("C", day(0), 100.0),
            Transaction::new("C", day(4), 8.0),
        ];

        let table = summarize(&txs, &SummaryOptions::default()).unwrap();
        let row = &table.rows[0];
        assert_eq!(row.frequency, 2);
        assert_eq!(row.recency, 4.0);
        // zero-amount orders count toward the mean
        assert_eq!(row.monetary_value, Some(4.0));
    }

    #[test]
    fn test_explicit_observation_end_drops_later_orders() {
        let txs = vec![
            Transaction::new("A", day(0), 10.0),
            Transaction::new("A", day(3), 10.0),
            Transaction::new("B", day(9), 10.0),
        ];
        let options = SummaryOptions {
            time_unit: TimeUnit::Days,
            observation_end: Some(day(5)),
        };

        let table = summarize(&txs, &options).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].t, 5.0);
    }

    #[test]
    fn test_zero_observation_length_is_flagged() {
        let txs = vec![
            Transaction::new("A", day(0), 10.0),
            Transaction::new("B", day(5), 10.0),
        ];
        let options = SummaryOptions {
            time_unit: TimeUnit::Days,
            observation_end: Some(day(5)),
        };

        let table = summarize(&txs, &options).unwrap();
        let warnings = table.diagnostics();
        assert!(warnings.contains(&DataWarning::ZeroObservationLength {
            customer_id: "B".into()
        }));
        assert!(warnings.contains(&DataWarning::AllZeroFrequency { customers: 2 }));
    }

    #[test]
    fn test_weekly_unit() {
        let txs = vec![
            Transaction::new("A", day(0), 10.0),
            Transaction::new("A", day(14), 10.0),
        ];
        let options = SummaryOptions {
            time_unit: TimeUnit::Weeks,
            observation_end: None,
        };

        let table = summarize(&txs, &options).unwrap();
        assert_eq!(table.rows[0].recency, 2.0);
        assert_eq!(table.rows[0].t, 3.0);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            summarize(&[], &SummaryOptions::default()),
            Err(ClvError::InvalidInput(_))
        ));

        let negative = vec![Transaction::new("A", day(0), -1.0)];
        assert!(matches!(
            summarize(&negative, &SummaryOptions::default()),
            Err(ClvError::InvalidInput(_))
        ));

        let nan = vec![Transaction::new("A", day(0), f64::NAN)];
        assert!(summarize(&nan, &SummaryOptions::default()).is_err());

        let blank = vec![Transaction::new(" ", day(0), 1.0)];
        assert!(summarize(&blank, &SummaryOptions::default()).is_err());
    }
}
