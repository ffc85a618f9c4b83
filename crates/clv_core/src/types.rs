//! Common data structures: transactions, customer summaries and time units

use chrono::{DateTime, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque customer identifier
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CustomerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CustomerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Period in which recency, T and horizons are measured.
///
/// Timestamps are floored to their period before differencing, so all
/// elapsed-time metrics are whole numbers of periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Hours,
    #[default]
    Days,
    Weeks,
}

impl TimeUnit {
    /// Length of one period in seconds
    pub fn seconds(self) -> i64 {
        match self {
            TimeUnit::Hours => 3_600,
            TimeUnit::Days => 86_400,
            TimeUnit::Weeks => 7 * 86_400,
        }
    }

    /// Index of the period containing `instant` (periods counted from the Unix epoch)
    pub fn period_index(self, instant: &NaiveDateTime) -> i64 {
        instant.and_utc().timestamp().div_euclid(self.seconds())
    }

    /// First instant of the period with the given index
    pub fn period_start(self, index: i64) -> Option<NaiveDateTime> {
        let secs = index.checked_mul(self.seconds())?;
        DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
    }

    /// Duration of `periods` whole periods
    pub fn span(self, periods: i64) -> TimeDelta {
        TimeDelta::seconds(periods.saturating_mul(self.seconds()))
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::Hours => f.write_str("hours"),
            TimeUnit::Days => f.write_str("days"),
            TimeUnit::Weeks => f.write_str("weeks"),
        }
    }
}

/// One order in the raw transaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub customer_id: CustomerId,
    pub order_date: NaiveDateTime,
    /// Non-negative order amount
    pub order_amount: f64,
}

impl Transaction {
    pub fn new(customer_id: impl Into<CustomerId>, order_date: NaiveDateTime, order_amount: f64) -> Self {
        Self {
            customer_id: customer_id.into(),
            order_date,
            order_amount,
        }
    }
}

/// Recency/frequency/monetary summary for one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub customer_id: CustomerId,
    /// Number of repeat (non-first) transactions
    pub frequency: u32,
    /// Periods between first and last transaction
    pub recency: f64,
    /// Periods between first transaction and the snapshot
    #[serde(rename = "T")]
    pub t: f64,
    /// Mean amount over repeat transactions; `None` without repeats
    pub monetary_value: Option<f64>,
}

impl CustomerSummary {
    /// Whether this row belongs in the monetary fitting population
    pub fn is_monetary_eligible(&self) -> bool {
        self.frequency > 0 && self.monetary_value.is_some_and(|m| m > 0.0)
    }
}

/// A fitted model together with the degenerate-data warnings raised while fitting
#[derive(Debug, Clone, PartialEq)]
pub struct Fitted<M> {
    pub model: M,
    pub warnings: Vec<crate::errors::DataWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_period_index_floors_within_day() {
        let morning = at(2024, 3, 1, 1);
        let evening = at(2024, 3, 1, 23);
        let next = at(2024, 3, 2, 0);

        assert_eq!(TimeUnit::Days.period_index(&morning), TimeUnit::Days.period_index(&evening));
        assert_eq!(TimeUnit::Days.period_index(&next), TimeUnit::Days.period_index(&morning) + 1);
        assert_eq!(TimeUnit::Hours.period_index(&evening) - TimeUnit::Hours.period_index(&morning), 22);
    }

    #[test]
    fn test_period_start_roundtrip() {
        let instant = at(2023, 11, 5, 13);
        let index = TimeUnit::Days.period_index(&instant);
        let start = TimeUnit::Days.period_start(index).unwrap();
        assert_eq!(start, at(2023, 11, 5, 0));
    }

    #[test]
    fn test_time_unit_serde_names() {
        let unit: TimeUnit = serde_json::from_str("\"weeks\"").unwrap();
        assert_eq!(unit, TimeUnit::Weeks);
        assert_eq!(TimeUnit::default(), TimeUnit::Days);
    }

    #[test]
    fn test_monetary_eligibility() {
        let mut row = CustomerSummary {
            customer_id: "c1".into(),
            frequency: 2,
            recency: 10.0,
            t: 20.0,
            monetary_value: Some(12.5),
        };
        assert!(row.is_monetary_eligible());

        row.monetary_value = Some(0.0);
        assert!(!row.is_monetary_eligible());

        row.frequency = 0;
        row.monetary_value = None;
        assert!(!row.is_monetary_eligible());
    }
}
