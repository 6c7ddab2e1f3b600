//! Per device-day rollup of event counts and transaction values.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::records::TransactionRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceDaily {
    pub date: NaiveDate,
    pub store_id: String,
    pub device_id: String,
    pub event_count: f64,
    pub total_value: f64,
}

/// Sums `event_count` and `total_value` per `(date, store_id, device_id)`.
///
/// Null cells are left out of the sum, so a group with only null cells sums to
/// zero. Undated records are not grouped.
pub fn build_device_daily(records: &[TransactionRecord]) -> Vec<DeviceDaily> {
    let mut groups: BTreeMap<(NaiveDate, &str, &str), (f64, f64)> = BTreeMap::new();

    for record in records {
        let Some(date) = record.date else {
            continue;
        };
        let sums = groups
            .entry((date, record.store_id.as_str(), record.device_id.as_str()))
            .or_insert((0.0, 0.0));
        if let Some(event_count) = record.event_count {
            sums.0 += event_count;
        }
        if let Some(total_value) = record.total_value {
            sums.1 += total_value;
        }
    }

    let out: Vec<DeviceDaily> = groups
        .into_iter()
        .map(
            |((date, store_id, device_id), (event_count, total_value))| DeviceDaily {
                date,
                store_id: store_id.to_string(),
                device_id: device_id.to_string(),
                event_count,
                total_value,
            },
        )
        .collect();

    debug!(
        component = "daily",
        event = "daily.build.finish",
        device_days = out.len()
    );

    out
}
