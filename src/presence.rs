//! Per store-day presence signal.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::records::TransactionRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDayStatus {
    pub date: NaiveDate,
    pub store_id: String,
    pub has_record: bool,
    pub any_event: bool,
}

/// Groups records by `(date, store_id)`, one row per observed pair, ordered by
/// date then store. Undated records are not grouped.
pub fn build_store_day_status(records: &[TransactionRecord]) -> Vec<StoreDayStatus> {
    let mut groups: BTreeMap<(NaiveDate, &str), (usize, bool)> = BTreeMap::new();

    for record in records {
        let Some(date) = record.date else {
            continue;
        };
        let entry = groups
            .entry((date, record.store_id.as_str()))
            .or_insert((0, false));
        entry.0 += 1;
        entry.1 |= record.event_count.unwrap_or(0.0) > 0.0;
    }

    let out: Vec<StoreDayStatus> = groups
        .into_iter()
        .map(|((date, store_id), (rows, any_event))| StoreDayStatus {
            date,
            store_id: store_id.to_string(),
            has_record: rows > 0,
            any_event,
        })
        .collect();

    debug!(
        component = "presence",
        event = "presence.build.finish",
        store_days = out.len()
    );

    out
}
