//! Lookback window restriction over normalized records.

use chrono::{Days, NaiveDate};
use tracing::info;

use crate::records::TransactionRecord;

/// Keeps only records dated within the last `lookback_days` calendar days,
/// counted back from the latest date present in `records`.
///
/// `lookback_days <= 0` returns the input untouched. When filtering is active,
/// undated records never fall inside the window, and input with no dated record
/// yields an empty result.
pub fn apply_lookback(
    records: Vec<TransactionRecord>,
    lookback_days: i64,
) -> Vec<TransactionRecord> {
    if lookback_days <= 0 {
        return records;
    }

    let before = records.len();
    let Some(min_keep) = window_start(&records, lookback_days) else {
        info!(
            component = "lookback",
            event = "lookback.apply.no_dates",
            lookback_days,
            before
        );
        return Vec::new();
    };

    let kept: Vec<TransactionRecord> = records
        .into_iter()
        .filter(|record| record.date.is_some_and(|date| date >= min_keep))
        .collect();

    info!(
        component = "lookback",
        event = "lookback.apply.finish",
        lookback_days,
        window_start = %min_keep,
        before,
        after = kept.len()
    );

    kept
}

/// First date inside the window, or `None` when no record carries a date.
pub fn window_start(records: &[TransactionRecord], lookback_days: i64) -> Option<NaiveDate> {
    let max_date = records.iter().filter_map(|record| record.date).max()?;
    let span = u64::try_from(lookback_days.saturating_sub(1)).unwrap_or(0);
    Some(
        max_date
            .checked_sub_days(Days::new(span))
            .unwrap_or(NaiveDate::MIN),
    )
}
