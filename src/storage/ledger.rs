//! Daily ledger: per local calendar day accumulation of tracked time.

use tracing::warn;

use super::entities::DailyRecord;

/// Folds `delta_seconds` into the record for `date`. An existing record is incremented in place,
/// otherwise a new record is appended. Other records keep their values and their order.
pub fn merge(mut records: Vec<DailyRecord>, date: &str, delta_seconds: f64) -> Vec<DailyRecord> {
    match records.iter_mut().find(|r| r.date == date) {
        Some(record) => record.seconds += delta_seconds,
        None => records.push(DailyRecord::new(date, delta_seconds)),
    }
    records
}

pub fn ledger_sum(records: &[DailyRecord]) -> f64 {
    records.iter().map(|r| r.seconds).sum()
}

/// Collapses records sharing a date into the first of them. Only hand edited logs contain
/// duplicates.
pub fn coalesce(records: Vec<DailyRecord>) -> Vec<DailyRecord> {
    let before = records.len();
    let coalesced = records
        .into_iter()
        .fold(Vec::with_capacity(before), |acc, record| {
            merge(acc, &record.date, record.seconds)
        });
    if coalesced.len() != before {
        warn!(
            "Daily ledger had {} duplicate day entries, merged them",
            before - coalesced.len()
        );
    }
    coalesced
}
