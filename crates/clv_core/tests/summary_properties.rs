use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use clv_core::{
    cap_monetary_values, monetary_fitting_population, summarize, SummaryOptions, TimeUnit,
    Transaction,
};
use proptest::prelude::*;
use std::collections::HashSet;

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn transaction() -> impl Strategy<Value = Transaction> {
    (0u8..12, 0i64..400 * 24, 0u32..50_000).prop_map(|(customer, hours, cents)| {
        Transaction::new(
            format!("cust-{customer:02}"),
            base() + TimeDelta::hours(hours),
            cents as f64 / 100.0,
        )
    })
}

fn time_unit() -> impl Strategy<Value = TimeUnit> {
    prop_oneof![
        Just(TimeUnit::Hours),
        Just(TimeUnit::Days),
        Just(TimeUnit::Weeks)
    ]
}

proptest! {
    #[test]
    fn customers_are_unique_and_recency_bounded(
        transactions in prop::collection::vec(transaction(), 1..80),
        unit in time_unit(),
    ) {
        let options = SummaryOptions { time_unit: unit, observation_end: None };
        let table = summarize(&transactions, &options).unwrap();

        let mut seen = HashSet::new();
        for row in &table.rows {
            prop_assert!(seen.insert(row.customer_id.clone()), "duplicate {}", row.customer_id);
            prop_assert!(row.recency >= 0.0);
            prop_assert!(row.recency <= row.t);
            prop_assert!(row.t > 0.0);
        }

        let input_ids: HashSet<_> = transactions.iter().map(|tx| tx.customer_id.clone()).collect();
        prop_assert_eq!(seen, input_ids);

        let total_repeats: u32 = table.rows.iter().map(|row| row.frequency).sum();
        prop_assert_eq!(total_repeats as usize + table.len(), transactions.len());
    }

    #[test]
    fn single_order_customers_are_not_monetary_candidates(
        transactions in prop::collection::vec(transaction(), 1..60),
    ) {
        let table = summarize(&transactions, &SummaryOptions::default()).unwrap();
        let population = monetary_fitting_population(&table.rows);

        for row in &table.rows {
            let orders = transactions.iter().filter(|tx| tx.customer_id == row.customer_id).count();
            if orders == 1 {
                prop_assert_eq!(row.frequency, 0);
                prop_assert_eq!(row.monetary_value, None);
                prop_assert!(population.iter().all(|candidate| candidate.customer_id != row.customer_id));
            }
        }
    }

    #[test]
    fn summarizing_is_idempotent(
        transactions in prop::collection::vec(transaction(), 1..60),
        end_offset in 0i64..420,
    ) {
        let options = SummaryOptions {
            time_unit: TimeUnit::Days,
            observation_end: Some(base() + TimeDelta::days(end_offset)),
        };

        match (summarize(&transactions, &options), summarize(&transactions, &options)) {
            (Ok(first), Ok(second)) => prop_assert_eq!(first, second),
            (Err(first), Err(second)) => prop_assert_eq!(first.to_string(), second.to_string()),
            _ => prop_assert!(false, "runs disagreed on success"),
        }
    }

    #[test]
    fn capping_only_touches_monetary_value(
        transactions in prop::collection::vec(transaction(), 1..80),
        cap_quantile in 0.05f64..=1.0,
    ) {
        let table = summarize(&transactions, &SummaryOptions::default()).unwrap();
        let (capped, threshold) = cap_monetary_values(&table.rows, cap_quantile).unwrap();

        prop_assert_eq!(capped.len(), table.rows.len());
        for (before, after) in table.rows.iter().zip(&capped) {
            prop_assert_eq!(&before.customer_id, &after.customer_id);
            prop_assert_eq!(before.frequency, after.frequency);
            prop_assert_eq!(before.recency, after.recency);
            prop_assert_eq!(before.t, after.t);
            prop_assert_eq!(before.monetary_value.is_some(), after.monetary_value.is_some());

            if let (Some(raw), Some(cut), Some(limit)) = (before.monetary_value, after.monetary_value, threshold) {
                prop_assert_eq!(cut, raw.min(limit));
            }
        }
    }
}
