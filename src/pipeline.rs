//! End-to-end report run: load, narrow, aggregate, write.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::ResolvedPaths;
use crate::daily::{build_device_daily, DeviceDaily};
use crate::lookback::apply_lookback;
use crate::observability::RunLog;
use crate::output::{
    write_activity_workbook, write_device_daily_csv, write_device_summary_csv, WriteError,
};
use crate::presence::{build_store_day_status, StoreDayStatus};
use crate::records::{load_transactions, LoadError, TransactionRecord};
use crate::summary::{build_device_summary, DeviceSummary, DEFAULT_ALWAYS_ON_THRESHOLD};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub lookback_days: i64,
    pub always_on_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback_days: 0,
            always_on_threshold: DEFAULT_ALWAYS_ON_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityReport {
    pub input_rows: usize,
    pub filtered_rows: usize,
    pub store_day_status: Vec<StoreDayStatus>,
    pub device_daily: Vec<DeviceDaily>,
    pub device_summary: Vec<DeviceSummary>,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to load transactions: {0}")]
    Load(#[from] LoadError),
    #[error("failed to write outputs: {0}")]
    Write(#[from] WriteError),
}

pub fn build_activity_report(
    records: Vec<TransactionRecord>,
    cfg: &PipelineConfig,
) -> ActivityReport {
    let input_rows = records.len();
    let filtered = apply_lookback(records, cfg.lookback_days);
    let filtered_rows = filtered.len();

    let device_daily = build_device_daily(&filtered);
    let store_day_status = build_store_day_status(&filtered);
    let device_summary =
        build_device_summary(&device_daily, &store_day_status, cfg.always_on_threshold);

    info!(
        component = "pipeline",
        event = "pipeline.build.finish",
        input_rows,
        filtered_rows,
        store_days = store_day_status.len(),
        device_days = device_daily.len(),
        devices = device_summary.len()
    );

    ActivityReport {
        input_rows,
        filtered_rows,
        store_day_status,
        device_daily,
        device_summary,
    }
}

/// Loads the input named in `paths`, builds the report and writes the
/// workbook plus both CSVs, narrating progress into `run_log`.
///
/// Nothing is written when loading fails. A write failure leaves whatever
/// files were already produced in place.
pub fn run_report(
    paths: &ResolvedPaths,
    cfg: &PipelineConfig,
    run_log: &mut RunLog,
) -> Result<ActivityReport, ReportError> {
    info!(
        component = "pipeline",
        event = "pipeline.run.start",
        input_csv = %paths.input_csv.display(),
        lookback_days = cfg.lookback_days,
        always_on_threshold = cfg.always_on_threshold
    );

    let records = load_transactions(&paths.input_csv)?;
    run_log.line(format!("input_rows: {}", records.len()));

    let report = build_activity_report(records, cfg);
    if cfg.lookback_days > 0 {
        run_log.line(format!(
            "lookback_days={}: {} -> {} rows",
            cfg.lookback_days, report.input_rows, report.filtered_rows
        ));
    }

    write_activity_workbook(
        &paths.excel_output,
        &report.device_daily,
        &report.device_summary,
    )?;
    write_device_daily_csv(&paths.device_daily_csv, &report.device_daily)?;
    write_device_summary_csv(&paths.device_summary_csv, &report.device_summary)?;

    run_log.line(format!("excel_written: {}", paths.excel_output.display()));
    run_log.line(format!("csv_written: {}", paths.device_daily_csv.display()));
    run_log.line(format!("csv_written: {}", paths.device_summary_csv.display()));

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(
        day: u32,
        store_id: &str,
        device_id: &str,
        event_count: Option<f64>,
    ) -> TransactionRecord {
        TransactionRecord {
            date: NaiveDate::from_ymd_opt(2024, 9, day),
            device_id: device_id.to_string(),
            store_id: store_id.to_string(),
            device_class: "POS".to_string(),
            store_name: "Main".to_string(),
            total_value: Some(1.0),
            event_count,
        }
    }

    #[test]
    fn lookback_narrows_every_derived_table() {
        let records = vec![
            record(1, "S1", "D1", Some(1.0)),
            record(2, "S1", "D1", Some(1.0)),
            record(3, "S1", "D1", Some(0.0)),
            record(3, "S1", "D2", Some(2.0)),
        ];
        let cfg = PipelineConfig {
            lookback_days: 2,
            ..PipelineConfig::default()
        };

        let report = build_activity_report(records, &cfg);
        assert_eq!(report.input_rows, 4);
        assert_eq!(report.filtered_rows, 3);
        assert_eq!(report.store_day_status.len(), 2);
        assert_eq!(report.device_daily.len(), 3);
        assert_eq!(report.device_summary.len(), 2);
        assert_eq!(report.device_summary[0].business_days, 2);
        assert_eq!(report.device_summary[0].active_days, 1);
    }

    #[test]
    fn empty_input_yields_empty_tables() {
        let report = build_activity_report(Vec::new(), &PipelineConfig::default());
        assert_eq!(report.input_rows, 0);
        assert!(report.store_day_status.is_empty());
        assert!(report.device_daily.is_empty());
        assert!(report.device_summary.is_empty());
    }
}
