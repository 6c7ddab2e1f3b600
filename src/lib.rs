//! Device activity report crate.
//!
//! Turns a per-transaction activity log into:
//! - a per store-day presence signal
//! - per device-day event/value rollups
//! - a per-device summary (activity rate, always-on flag, longest stop run)
//!
//! and writes the rollups and summary as CSV files and a two-sheet workbook.

mod config;
mod daily;
mod lookback;
mod observability;
mod output;
mod pipeline;
mod presence;
mod records;
mod summary;

pub use config::{
    apply_overrides, base_dir_from_executable, load_report_config, ConfigSource, LoadedConfig,
    ReportConfig, ResolvedPaths, CONFIG_FILE_NAME,
};
pub use daily::{build_device_daily, DeviceDaily};
pub use lookback::{apply_lookback, window_start};
pub use observability::{
    format_run_log_line, init_logging, log_run_finish, log_run_start, logging_config_from_env,
    run_log_timestamp, LogFormat, LoggingConfig, LoggingInitError, RunLog, RUN_LOG_TAG,
};
pub use output::{
    file_sha256_hex, write_activity_workbook, write_device_daily_csv, write_device_summary_csv,
    WriteError, WrittenFile, DEVICE_DAILY_HEADERS, DEVICE_DAILY_SHEET, DEVICE_SUMMARY_HEADERS,
    DEVICE_SUMMARY_SHEET,
};
pub use pipeline::{build_activity_report, run_report, ActivityReport, PipelineConfig, ReportError};
pub use presence::{build_store_day_status, StoreDayStatus};
pub use records::{
    load_transactions, normalize_headers, normalize_rows, parse_date, parse_number,
    parse_transactions, sniff_delimiter, Delimiter, LoadError, TransactionRecord,
    REQUIRED_COLUMNS,
};
pub use summary::{
    activity_rate, build_device_summary, is_always_on, longest_run, DeviceSummary,
    DEFAULT_ALWAYS_ON_THRESHOLD,
};
