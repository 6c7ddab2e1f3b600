//! CSV and spreadsheet writers for the derived tables.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;
use umya_spreadsheet::Worksheet;

use crate::daily::DeviceDaily;
use crate::summary::DeviceSummary;

pub const DEVICE_DAILY_SHEET: &str = "DeviceDaily";
pub const DEVICE_SUMMARY_SHEET: &str = "DeviceSummary";

pub const DEVICE_DAILY_HEADERS: [&str; 5] =
    ["date", "store_id", "device_id", "event_count", "total_value"];

pub const DEVICE_SUMMARY_HEADERS: [&str; 9] = [
    "device_id",
    "store_id",
    "active_days",
    "business_days",
    "activity_rate",
    "max_consecutive_stops",
    "is_always_on",
    "first_seen_date",
    "last_seen_date",
];

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error writing {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("workbook error writing {path}: {message}")]
    Workbook { path: PathBuf, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, PartialEq)]
enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty,
}

pub fn write_device_daily_csv(
    path: &Path,
    rows: &[DeviceDaily],
) -> Result<WrittenFile, WriteError> {
    write_csv(path, &DEVICE_DAILY_HEADERS, rows)
}

pub fn write_device_summary_csv(
    path: &Path,
    rows: &[DeviceSummary],
) -> Result<WrittenFile, WriteError> {
    write_csv(path, &DEVICE_SUMMARY_HEADERS, rows)
}

/// Writes a workbook with the `DeviceDaily` and `DeviceSummary` sheets, in that
/// order, each with a header row.
pub fn write_activity_workbook(
    path: &Path,
    daily: &[DeviceDaily],
    summary: &[DeviceSummary],
) -> Result<(), WriteError> {
    ensure_parent_dir(path)?;
    let workbook_err = |message: String| WriteError::Workbook {
        path: path.to_path_buf(),
        message,
    };

    let mut book = umya_spreadsheet::new_file_empty_worksheet();

    let sheet = book
        .new_sheet(DEVICE_DAILY_SHEET)
        .map_err(|err| workbook_err(err.to_string()))?;
    fill_sheet(sheet, &DEVICE_DAILY_HEADERS, daily.iter().map(daily_cells));

    let sheet = book
        .new_sheet(DEVICE_SUMMARY_SHEET)
        .map_err(|err| workbook_err(err.to_string()))?;
    fill_sheet(sheet, &DEVICE_SUMMARY_HEADERS, summary.iter().map(summary_cells));

    umya_spreadsheet::writer::xlsx::write(&book, path)
        .map_err(|err| workbook_err(err.to_string()))?;

    info!(
        component = "output",
        event = "output.workbook.written",
        path = %path.display(),
        daily_rows = daily.len(),
        summary_rows = summary.len()
    );

    Ok(())
}

pub fn file_sha256_hex(path: &Path) -> Result<String, WriteError> {
    let bytes = fs::read(path).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    Ok(hex::encode(hasher.finalize()))
}

fn write_csv<T: Serialize>(
    path: &Path,
    headers: &[&str],
    rows: &[T],
) -> Result<WrittenFile, WriteError> {
    ensure_parent_dir(path)?;
    let io_err = |source: std::io::Error| WriteError::Io {
        path: path.to_path_buf(),
        source,
    };
    let csv_err = |source: csv::Error| WriteError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut file = BufWriter::new(File::create(path).map_err(io_err)?);
    file.write_all(UTF8_BOM).map_err(io_err)?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    writer.write_record(headers).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(io_err)?;
    drop(writer);

    let bytes = fs::metadata(path).map_err(io_err)?.len();
    let sha256 = file_sha256_hex(path)?;

    info!(
        component = "output",
        event = "output.csv.written",
        path = %path.display(),
        rows = rows.len(),
        bytes,
        sha256 = %sha256
    );

    Ok(WrittenFile {
        path: path.to_path_buf(),
        bytes,
        sha256,
    })
}

fn ensure_parent_dir(path: &Path) -> Result<(), WriteError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| WriteError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

fn fill_sheet(
    sheet: &mut Worksheet,
    headers: &[&str],
    rows: impl Iterator<Item = Vec<CellValue>>,
) {
    for (col, header) in headers.iter().enumerate() {
        sheet
            .get_cell_mut((col as u32 + 1, 1))
            .set_value_string(header.to_string());
    }
    for (row_idx, cells) in rows.enumerate() {
        let row = row_idx as u32 + 2;
        for (col_idx, value) in cells.into_iter().enumerate() {
            let col = col_idx as u32 + 1;
            match value {
                CellValue::Text(text) => {
                    sheet.get_cell_mut((col, row)).set_value_string(text);
                }
                CellValue::Number(number) => {
                    sheet.get_cell_mut((col, row)).set_value_number(number);
                }
                CellValue::Bool(flag) => {
                    sheet.get_cell_mut((col, row)).set_value_bool(flag);
                }
                CellValue::Empty => {}
            }
        }
    }
}

fn daily_cells(row: &DeviceDaily) -> Vec<CellValue> {
    vec![
        CellValue::Text(row.date.format(DATE_FORMAT).to_string()),
        CellValue::Text(row.store_id.clone()),
        CellValue::Text(row.device_id.clone()),
        CellValue::Number(row.event_count),
        CellValue::Number(row.total_value),
    ]
}

fn summary_cells(row: &DeviceSummary) -> Vec<CellValue> {
    vec![
        CellValue::Text(row.device_id.clone()),
        CellValue::Text(row.store_id.clone()),
        CellValue::Number(f64::from(row.active_days)),
        CellValue::Number(f64::from(row.business_days)),
        row.activity_rate
            .map(CellValue::Number)
            .unwrap_or(CellValue::Empty),
        CellValue::Number(f64::from(row.max_consecutive_stops)),
        CellValue::Bool(row.is_always_on),
        CellValue::Text(row.first_seen_date.format(DATE_FORMAT).to_string()),
        CellValue::Text(row.last_seen_date.format(DATE_FORMAT).to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, day).unwrap()
    }

    fn summary_row(activity_rate: Option<f64>) -> DeviceSummary {
        DeviceSummary {
            device_id: "007".to_string(),
            store_id: "0042".to_string(),
            active_days: 3,
            business_days: 4,
            activity_rate,
            max_consecutive_stops: 1,
            is_always_on: false,
            first_seen_date: date(1),
            last_seen_date: date(4),
        }
    }

    #[test]
    fn daily_csv_has_bom_header_and_iso_dates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/daily.csv");
        let rows = vec![DeviceDaily {
            date: date(2),
            store_id: "0042".to_string(),
            device_id: "007".to_string(),
            event_count: 5.0,
            total_value: 12.5,
        }];

        let written = write_device_daily_csv(&path, &rows).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,store_id,device_id,event_count,total_value");
        assert_eq!(lines[1], "2024-08-02,0042,007,5.0,12.5");
        assert_eq!(written.bytes, fs::metadata(&path).unwrap().len());
        assert_eq!(written.sha256.len(), 64);
    }

    #[test]
    fn summary_csv_leaves_undefined_rate_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        write_device_summary_csv(&path, &[summary_row(Some(0.75)), summary_row(None)])
            .unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();
        assert_eq!(lines[0], DEVICE_SUMMARY_HEADERS.join(","));
        assert_eq!(lines[1], "007,0042,3,4,0.75,1,false,2024-08-01,2024-08-04");
        assert_eq!(lines[2], "007,0042,3,4,,1,false,2024-08-01,2024-08-04");
    }

    #[test]
    fn empty_tables_still_get_a_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        write_device_summary_csv(&path, &[]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_start_matches('\u{feff}').lines().count(), 1);
    }

    #[test]
    fn summary_cells_map_types() {
        let cells = summary_cells(&summary_row(None));
        assert_eq!(cells[0], CellValue::Text("007".to_string()));
        assert_eq!(cells[2], CellValue::Number(3.0));
        assert_eq!(cells[4], CellValue::Empty);
        assert_eq!(cells[6], CellValue::Bool(false));
        assert_eq!(cells[8], CellValue::Text("2024-08-04".to_string()));
    }
}
