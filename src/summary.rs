//! Per-device lifetime summary over the store business-day calendar.
//!
//! Business days come from store presence, not device presence: every device
//! seen at a store is evaluated against every business day of that store, so a
//! device that logged nothing on a day the store was open counts as stopped.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::daily::DeviceDaily;
use crate::presence::StoreDayStatus;

pub const DEFAULT_ALWAYS_ON_THRESHOLD: f64 = 0.95;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSummary {
    pub device_id: String,
    pub store_id: String,
    pub active_days: u32,
    pub business_days: u32,
    pub activity_rate: Option<f64>,
    pub max_consecutive_stops: u32,
    pub is_always_on: bool,
    pub first_seen_date: NaiveDate,
    pub last_seen_date: NaiveDate,
}

/// One business day of one store, as seen by one device.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DeviceDay {
    has_record: bool,
    is_active: bool,
}

impl DeviceDay {
    fn stopped(self) -> bool {
        self.has_record && !self.is_active
    }
}

/// Builds one summary row per `(store_id, device_id)` present in `daily`,
/// ordered by store then device.
pub fn build_device_summary(
    daily: &[DeviceDaily],
    store_days: &[StoreDayStatus],
    always_on_threshold: f64,
) -> Vec<DeviceSummary> {
    let calendar = store_calendar(store_days);

    let mut devices: BTreeMap<(&str, &str), BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for row in daily {
        *devices
            .entry((row.store_id.as_str(), row.device_id.as_str()))
            .or_default()
            .entry(row.date)
            .or_insert(0.0) += row.event_count;
    }

    let mut out = Vec::with_capacity(devices.len());
    for ((store_id, device_id), events) in devices {
        let (Some(first_seen_date), Some(last_seen_date)) = (
            events.keys().next().copied(),
            events.keys().next_back().copied(),
        ) else {
            continue;
        };

        let days: Vec<DeviceDay> = calendar
            .get(store_id)
            .map(|store_calendar| {
                store_calendar
                    .iter()
                    .map(|(date, has_record)| {
                        let event_count = events.get(date).copied().unwrap_or(0.0);
                        DeviceDay {
                            has_record: *has_record,
                            is_active: *has_record && event_count > 0.0,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let active_days = days.iter().filter(|day| day.is_active).count() as u32;
        let business_days = days.iter().filter(|day| day.has_record).count() as u32;
        let activity_rate = activity_rate(active_days, business_days);

        out.push(DeviceSummary {
            device_id: device_id.to_string(),
            store_id: store_id.to_string(),
            active_days,
            business_days,
            activity_rate,
            max_consecutive_stops: longest_run(days.iter().map(|day| day.stopped())),
            is_always_on: is_always_on(activity_rate, always_on_threshold),
            first_seen_date,
            last_seen_date,
        });
    }

    info!(
        component = "summary",
        event = "summary.build.finish",
        devices = out.len(),
        always_on = out.iter().filter(|row| row.is_always_on).count(),
        always_on_threshold
    );

    out
}

pub fn activity_rate(active_days: u32, business_days: u32) -> Option<f64> {
    if business_days == 0 {
        None
    } else {
        Some(f64::from(active_days) / f64::from(business_days))
    }
}

/// `false` whenever the rate is undefined.
pub fn is_always_on(activity_rate: Option<f64>, threshold: f64) -> bool {
    activity_rate.is_some_and(|rate| rate >= threshold)
}

/// Length of the longest run of consecutive `true` values.
pub fn longest_run(flags: impl IntoIterator<Item = bool>) -> u32 {
    let mut longest = 0u32;
    let mut current = 0u32;
    for flag in flags {
        if flag {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

/// Date-ordered business-day calendar per store. A date listed twice for the
/// same store collapses into one day.
fn store_calendar(store_days: &[StoreDayStatus]) -> BTreeMap<&str, BTreeMap<NaiveDate, bool>> {
    let mut calendar: BTreeMap<&str, BTreeMap<NaiveDate, bool>> = BTreeMap::new();
    for day in store_days {
        *calendar
            .entry(day.store_id.as_str())
            .or_default()
            .entry(day.date)
            .or_insert(false) |= day.has_record;
    }
    calendar
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).expect("valid test date")
    }

    fn store_day(day: u32, store_id: &str) -> StoreDayStatus {
        StoreDayStatus {
            date: date(day),
            store_id: store_id.to_string(),
            has_record: true,
            any_event: true,
        }
    }

    fn daily(day: u32, store_id: &str, device_id: &str, event_count: f64) -> DeviceDaily {
        DeviceDaily {
            date: date(day),
            store_id: store_id.to_string(),
            device_id: device_id.to_string(),
            event_count,
            total_value: 0.0,
        }
    }

    #[test]
    fn longest_run_handles_edges() {
        assert_eq!(longest_run(std::iter::empty::<bool>()), 0);
        assert_eq!(longest_run([false, false]), 0);
        assert_eq!(longest_run([true, true, false, true]), 2);
        assert_eq!(longest_run([false, true, true, true]), 3);
    }

    #[test]
    fn rate_is_undefined_without_business_days() {
        assert_eq!(activity_rate(0, 0), None);
        assert_eq!(activity_rate(3, 4), Some(0.75));
        assert!(!is_always_on(None, 0.95));
    }

    #[test]
    fn silent_business_days_count_against_the_device() {
        let store_days: Vec<StoreDayStatus> = (1..=4).map(|d| store_day(d, "S1")).collect();
        let rows = vec![daily(1, "S1", "D1", 2.0), daily(4, "S1", "D1", 1.0)];

        let summary = build_device_summary(&rows, &store_days, 0.95);
        assert_eq!(summary.len(), 1);
        let row = &summary[0];
        assert_eq!(row.active_days, 2);
        assert_eq!(row.business_days, 4);
        assert_eq!(row.activity_rate, Some(0.5));
        assert_eq!(row.max_consecutive_stops, 2);
        assert_eq!(row.first_seen_date, date(1));
        assert_eq!(row.last_seen_date, date(4));
    }

    #[test]
    fn stores_without_devices_emit_nothing() {
        let store_days = vec![store_day(1, "S1"), store_day(1, "S2")];
        let rows = vec![daily(1, "S1", "D1", 1.0)];
        let summary = build_device_summary(&rows, &store_days, 0.95);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].store_id, "S1");
    }

    #[test]
    fn device_days_outside_the_calendar_leave_rate_undefined() {
        let rows = vec![daily(1, "S9", "D1", 1.0)];
        let summary = build_device_summary(&rows, &[], 0.95);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].business_days, 0);
        assert_eq!(summary[0].active_days, 0);
        assert_eq!(summary[0].activity_rate, None);
        assert_eq!(summary[0].max_consecutive_stops, 0);
        assert!(!summary[0].is_always_on);
    }

    #[test]
    fn non_business_day_breaks_a_stop_run() {
        let mut closed = store_day(2, "S1");
        closed.has_record = false;
        let store_days = vec![store_day(1, "S1"), closed, store_day(3, "S1"), store_day(4, "S1")];
        let rows = vec![daily(4, "S1", "D1", 0.0), daily(1, "S1", "D1", 0.0)];

        let summary = build_device_summary(&rows, &store_days, 0.95);
        assert_eq!(summary[0].business_days, 3);
        assert_eq!(summary[0].active_days, 0);
        assert_eq!(summary[0].max_consecutive_stops, 2);
    }

    #[test]
    fn output_is_sorted_by_store_then_device() {
        let store_days = vec![store_day(1, "S1"), store_day(1, "S2")];
        let rows = vec![
            daily(1, "S2", "A", 1.0),
            daily(1, "S1", "B", 1.0),
            daily(1, "S1", "A", 1.0),
        ];
        let keys: Vec<(String, String)> = build_device_summary(&rows, &store_days, 0.95)
            .into_iter()
            .map(|row| (row.store_id, row.device_id))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("S1".to_string(), "A".to_string()),
                ("S1".to_string(), "B".to_string()),
                ("S2".to_string(), "A".to_string()),
            ]
        );
    }
}
