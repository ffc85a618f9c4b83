//! CSV transaction loading
//!
//! Reads an order log with configurable column names and coerces each row
//! into a [`Transaction`]. Extra columns are ignored.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use clv_core::config::SummaryConfig;
use clv_core::{ClvError, Transaction};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::errors::{Result, TrainerError};

const DATE_TIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Names of the columns carrying the transaction fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    pub customer_id: String,
    pub order_date: String,
    pub order_amount: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self::from(&SummaryConfig::default())
    }
}

impl From<&SummaryConfig> for ColumnMapping {
    fn from(config: &SummaryConfig) -> Self {
        Self {
            customer_id: config.customer_id_column.clone(),
            order_date: config.order_date_column.clone(),
            order_amount: config.monetary_column.clone(),
        }
    }
}

/// Load transactions from a CSV file with a header row
pub fn load_transactions<P: AsRef<Path>>(path: P, columns: &ColumnMapping) -> Result<Vec<Transaction>> {
    let path = path.as_ref();
    info!("Loading transactions from: {}", path.display());
    let file = std::fs::File::open(path)?;
    read_transactions(file, columns)
}

/// Read transactions from any CSV source with a header row
pub fn read_transactions<R: Read>(source: R, columns: &ColumnMapping) -> Result<Vec<Transaction>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let position = |name: &str| {
        headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| TrainerError::from(ClvError::InvalidInput(format!("missing required column '{name}'"))))
    };
    let id_idx = position(&columns.customer_id)?;
    let date_idx = position(&columns.order_date)?;
    let amount_idx = position(&columns.order_amount)?;

    let mut transactions = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        // Header is line 1
        let line = row_idx + 2;
        let field = |idx: usize| record.get(idx).unwrap_or_default();

        let customer_id = field(id_idx);
        if customer_id.is_empty() {
            return Err(invalid(line, &columns.customer_id, "empty customer id"));
        }

        let raw_date = field(date_idx);
        let order_date = parse_order_date(raw_date)
            .ok_or_else(|| invalid(line, &columns.order_date, &format!("unparseable date '{raw_date}'")))?;

        let raw_amount = field(amount_idx);
        let order_amount = parse_amount(raw_amount)
            .ok_or_else(|| invalid(line, &columns.order_amount, &format!("unparseable amount '{raw_amount}'")))?;

        transactions.push(Transaction::new(customer_id, order_date, order_amount));
    }

    if transactions.is_empty() {
        return Err(ClvError::InvalidInput("no transactions found".to_string()).into());
    }

    debug!("Read {} transactions", transactions.len());
    Ok(transactions)
}

/// Parse an order timestamp. Accepts RFC 3339 (converted to UTC), common
/// date-time layouts and bare dates (midnight).
pub fn parse_order_date(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.naive_utc());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(instant) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(instant);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Parse a non-negative finite amount
fn parse_amount(raw: &str) -> Option<f64> {
    raw.parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite() && *amount >= 0.0)
}

fn invalid(line: usize, column: &str, reason: &str) -> TrainerError {
    ClvError::InvalidInput(format!("line {line}, column '{column}': {reason}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const SAMPLE: &str = "\
customer_id,order_date,order_amount,channel
C1,2024-01-01,10.00,web
C1,2024-01-11 08:30:00,20.50,store
C2,2024-01-05T12:00:00Z,7,web
";

    #[test]
    fn test_reads_default_columns() {
        let transactions = read_transactions(SAMPLE.as_bytes(), &ColumnMapping::default()).unwrap();
        assert_eq!(transactions.len(), 3);
        assert_eq!(transactions[0].customer_id.as_str(), "C1");
        assert_eq!(transactions[1].order_amount, 20.5);
        assert_eq!(transactions[1].order_date.hour(), 8);
        assert_eq!(transactions[2].order_date.hour(), 12);
    }

    #[test]
    fn test_custom_column_names() {
        let csv = "buyer,ts,revenue\nb1,2024-02-01,3.5\n";
        let columns = ColumnMapping {
            customer_id: "buyer".to_string(),
            order_date: "ts".to_string(),
            order_amount: "revenue".to_string(),
        };
        let transactions = read_transactions(csv.as_bytes(), &columns).unwrap();
        assert_eq!(transactions[0].order_amount, 3.5);
    }

    #[test]
    fn test_missing_column_is_reported() {
        let csv = "customer_id,order_date\nC1,2024-01-01\n";
        let err = read_transactions(csv.as_bytes(), &ColumnMapping::default()).unwrap_err();
        assert!(matches!(err, TrainerError::Clv(ClvError::InvalidInput(ref msg)) if msg.contains("order_amount")));
    }

    #[test]
    fn test_bad_cells_are_invalid_input() {
        let bad_date = "customer_id,order_date,order_amount\nC1,yesterday,1.0\n";
        let err = read_transactions(bad_date.as_bytes(), &ColumnMapping::default()).unwrap_err();
        assert!(matches!(err, TrainerError::Clv(ClvError::InvalidInput(ref msg)) if msg.contains("line 2")));

        let bad_amount = "customer_id,order_date,order_amount\nC1,2024-01-01,-4\n";
        let err = read_transactions(bad_amount.as_bytes(), &ColumnMapping::default()).unwrap_err();
        assert!(matches!(err, TrainerError::Clv(ClvError::InvalidInput(_))));
    }

    #[test]
    fn test_header_only_is_empty_dataset() {
        let csv = "customer_id,order_date,order_amount\n";
        let err = read_transactions(csv.as_bytes(), &ColumnMapping::default()).unwrap_err();
        assert!(matches!(err, TrainerError::Clv(ClvError::InvalidInput(_))));
    }

    #[test]
    fn test_date_layouts() {
        let midnight = parse_order_date("2024-03-05").unwrap();
        assert_eq!(midnight.hour(), 0);
        assert_eq!(parse_order_date("2024/03/05"), Some(midnight));
        assert!(parse_order_date("2024-03-05 17:45").is_some());
        assert_eq!(
            parse_order_date("2024-03-05T10:00:00+02:00").unwrap().hour(),
            8
        );
        assert!(parse_order_date("05.03.2024").is_none());
    }
}
