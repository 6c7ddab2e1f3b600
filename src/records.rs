//! Transaction log loading and record normalization.
//!
//! Input rules:
//! - the field delimiter is sniffed from the first line: tab wins over comma,
//!   comma is the fallback when neither occurs
//! - a header that arrives as one run-on cell is re-split on the sniffed
//!   delimiter, and single-cell data rows are re-split the same way
//! - all seven required columns must be present after header normalization
//! - unparseable dates and numbers become `None` instead of failing the load

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub const REQUIRED_COLUMNS: [&str; 7] = [
    "date",
    "device_id",
    "store_id",
    "device_class",
    "store_name",
    "total_value",
    "event_count",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 6] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delimiter {
    Tab,
    Comma,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Self::Tab => b'\t',
            Self::Comma => b',',
        }
    }

    fn as_char(self) -> char {
        self.as_byte() as char
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub date: Option<NaiveDate>,
    pub device_id: String,
    pub store_id: String,
    pub device_class: String,
    pub store_name: String,
    pub total_value: Option<f64>,
    pub event_count: Option<f64>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("input has no header line")]
    EmptyInput,
    #[error("missing CSV headers: {missing:?} / found: {found:?}")]
    Schema {
        missing: Vec<String>,
        found: Vec<String>,
    },
}

/// Reads and normalizes the transaction log at `path`.
pub fn load_transactions(path: &Path) -> Result<Vec<TransactionRecord>, LoadError> {
    let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let records = parse_transactions(&text)?;

    let null_dates = records.iter().filter(|r| r.date.is_none()).count();
    let null_event_counts = records.iter().filter(|r| r.event_count.is_none()).count();
    let null_total_values = records.iter().filter(|r| r.total_value.is_none()).count();
    if null_dates > 0 || null_event_counts > 0 || null_total_values > 0 {
        warn!(
            component = "records",
            event = "records.parse.degraded",
            path = %path.display(),
            null_dates,
            null_event_counts,
            null_total_values
        );
    }

    info!(
        component = "records",
        event = "records.load.finish",
        path = %path.display(),
        rows = records.len()
    );

    Ok(records)
}

/// Parses an in-memory delimited table into normalized records.
pub fn parse_transactions(text: &str) -> Result<Vec<TransactionRecord>, LoadError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let first_line = text
        .lines()
        .next()
        .filter(|line| !line.trim().is_empty())
        .ok_or(LoadError::EmptyInput)?;
    let delimiter = sniff_delimiter(first_line);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter.as_byte())
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let raw_headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let run_on = is_run_on(&raw_headers);
    let headers = normalize_headers(&raw_headers);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(split_row(&record, run_on));
    }

    normalize_rows(&headers, &rows)
}

pub fn sniff_delimiter(first_line: &str) -> Delimiter {
    if first_line.contains('\t') {
        Delimiter::Tab
    } else {
        Delimiter::Comma
    }
}

pub fn normalize_headers(cells: &[String]) -> Vec<String> {
    if is_run_on(cells) {
        let raw = &cells[0];
        let delimiter = sniff_delimiter(raw);
        return raw
            .split(delimiter.as_char())
            .map(|c| c.trim().to_string())
            .collect();
    }
    cells.iter().map(|c| c.trim().to_string()).collect()
}

/// Maps string rows onto [`TransactionRecord`]s, validating required columns.
pub fn normalize_rows(
    headers: &[String],
    rows: &[Vec<String>],
) -> Result<Vec<TransactionRecord>, LoadError> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (idx, name) in headers.iter().enumerate() {
        index.entry(name.as_str()).or_insert(idx);
    }

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| !index.contains_key(**name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(LoadError::Schema {
            missing,
            found: headers.to_vec(),
        });
    }

    let col = |row: &Vec<String>, name: &str| -> String {
        index
            .get(name)
            .and_then(|idx| row.get(*idx))
            .cloned()
            .unwrap_or_default()
    };

    Ok(rows
        .iter()
        .map(|row| TransactionRecord {
            date: parse_date(&col(row, "date")),
            device_id: col(row, "device_id"),
            store_id: col(row, "store_id"),
            device_class: col(row, "device_class"),
            store_name: col(row, "store_name"),
            total_value: parse_number(&col(row, "total_value")),
            event_count: parse_number(&col(row, "event_count")),
        })
        .collect())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.date_naive())
}

pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

fn is_run_on(cells: &[String]) -> bool {
    cells.len() == 1 && (cells[0].contains('\t') || cells[0].contains(','))
}

fn split_row(record: &StringRecord, run_on: bool) -> Vec<String> {
    if run_on && record.len() == 1 {
        let cell = record.get(0).unwrap_or_default();
        let delimiter = sniff_delimiter(cell);
        return cell
            .split(delimiter.as_char())
            .map(|c| c.trim().to_string())
            .collect();
    }
    record.iter().map(str::to_string).collect()
}
