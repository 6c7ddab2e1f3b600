//! Report configuration: built-in defaults overridden key by key from an
//! optional `config.json` next to the executable.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::pipeline::PipelineConfig;
use crate::summary::DEFAULT_ALWAYS_ON_THRESHOLD;

pub const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub lookback_days: i64,
    pub always_on_threshold: f64,
    pub input_csv: PathBuf,
    pub excel_output: PathBuf,
    pub device_daily_csv: PathBuf,
    pub device_summary_csv: PathBuf,
    pub log_path: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            lookback_days: 0,
            always_on_threshold: DEFAULT_ALWAYS_ON_THRESHOLD,
            input_csv: PathBuf::from("input/transaction_log.csv"),
            excel_output: PathBuf::from("output/activity_report.xlsx"),
            device_daily_csv: PathBuf::from("output/device_daily.csv"),
            device_summary_csv: PathBuf::from("output/device_summary.csv"),
            log_path: PathBuf::from("output/logs/data_activity_report.log"),
        }
    }
}

impl ReportConfig {
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            lookback_days: self.lookback_days,
            always_on_threshold: self.always_on_threshold,
        }
    }

    /// Joins every relative path onto `base_dir`; absolute paths pass through.
    pub fn resolve(&self, base_dir: &Path) -> ResolvedPaths {
        ResolvedPaths {
            base_dir: base_dir.to_path_buf(),
            input_csv: base_dir.join(&self.input_csv),
            excel_output: base_dir.join(&self.excel_output),
            device_daily_csv: base_dir.join(&self.device_daily_csv),
            device_summary_csv: base_dir.join(&self.device_summary_csv),
            log_path: base_dir.join(&self.log_path),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub base_dir: PathBuf,
    pub input_csv: PathBuf,
    pub excel_output: PathBuf,
    pub device_daily_csv: PathBuf,
    pub device_summary_csv: PathBuf,
    pub log_path: PathBuf,
}

impl ResolvedPaths {
    pub fn output_dir(&self) -> PathBuf {
        self.excel_output
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.base_dir.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Defaults,
    File { ignored_keys: Vec<String> },
    Unreadable { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub config: ReportConfig,
    pub source: ConfigSource,
}

/// Loads `path` over the defaults. Never fails: a missing file keeps the
/// defaults, an unreadable or malformed one keeps them too and is reported
/// through [`ConfigSource::Unreadable`].
pub fn load_report_config(path: &Path) -> LoadedConfig {
    let mut config = ReportConfig::default();

    if !path.exists() {
        info!(
            component = "config",
            event = "config.load.defaults",
            path = %path.display()
        );
        return LoadedConfig {
            config,
            source: ConfigSource::Defaults,
        };
    }

    let parsed = fs::read_to_string(path)
        .map_err(|err| err.to_string())
        .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|err| err.to_string()));

    let source = match parsed {
        Ok(value) => {
            let ignored_keys = apply_overrides(&mut config, &value);
            if !ignored_keys.is_empty() {
                warn!(
                    component = "config",
                    event = "config.load.ignored_keys",
                    path = %path.display(),
                    ignored_keys = ?ignored_keys
                );
            }
            info!(
                component = "config",
                event = "config.load.file",
                path = %path.display(),
                lookback_days = config.lookback_days,
                always_on_threshold = config.always_on_threshold
            );
            ConfigSource::File { ignored_keys }
        }
        Err(reason) => {
            warn!(
                component = "config",
                event = "config.load.unreadable",
                path = %path.display(),
                reason = %reason
            );
            ConfigSource::Unreadable { reason }
        }
    };

    LoadedConfig { config, source }
}

/// Applies every recognized, well-typed key of `value` onto `config` and returns
/// the recognized keys that were rejected. Unknown keys are ignored silently.
pub fn apply_overrides(config: &mut ReportConfig, value: &Value) -> Vec<String> {
    let mut ignored = Vec::new();
    let Some(object) = value.as_object() else {
        ignored.push("<root>".to_string());
        return ignored;
    };

    for (key, raw) in object {
        let accepted = match key.as_str() {
            "lookback_days" => parse_lookback(raw).map(|v| config.lookback_days = v),
            "always_on_threshold" => parse_threshold(raw).map(|v| config.always_on_threshold = v),
            "input_csv" => parse_path(raw).map(|v| config.input_csv = v),
            "excel_output" => parse_path(raw).map(|v| config.excel_output = v),
            "device_daily_csv" => parse_path(raw).map(|v| config.device_daily_csv = v),
            "device_summary_csv" => parse_path(raw).map(|v| config.device_summary_csv = v),
            "log_path" => parse_path(raw).map(|v| config.log_path = v),
            _ => continue,
        };
        if accepted.is_none() {
            ignored.push(key.clone());
        }
    }

    ignored
}

/// Directory holding the running executable; falls back to the working
/// directory when the executable path has no parent.
pub fn base_dir_from_executable() -> io::Result<PathBuf> {
    let exe = env::current_exe()?;
    match exe.parent() {
        Some(dir) => Ok(dir.to_path_buf()),
        None => env::current_dir(),
    }
}

fn parse_lookback(raw: &Value) -> Option<i64> {
    match raw {
        Value::Null => Some(0),
        Value::Bool(false) => Some(0),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) if s.trim().is_empty() => Some(0),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn parse_threshold(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    (value > 0.0 && value <= 1.0).then_some(value)
}

fn parse_path(raw: &Value) -> Option<PathBuf> {
    match raw {
        Value::String(s) if !s.trim().is_empty() => Some(PathBuf::from(s.trim())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn missing_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let loaded = load_report_config(&dir.path().join(CONFIG_FILE_NAME));
        assert_eq!(loaded.config, ReportConfig::default());
        assert_eq!(loaded.source, ConfigSource::Defaults);
    }

    #[test]
    fn malformed_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "{ not json").unwrap();

        let loaded = load_report_config(&path);
        assert_eq!(loaded.config, ReportConfig::default());
        assert!(matches!(loaded.source, ConfigSource::Unreadable { .. }));
    }

    #[test]
    fn keys_override_independently() {
        let mut cfg = ReportConfig::default();
        let ignored = apply_overrides(
            &mut cfg,
            &json!({
                "lookback_days": 30,
                "always_on_threshold": "high",
                "device_daily_csv": "out/daily.csv",
                "unrelated": true
            }),
        );

        assert_eq!(cfg.lookback_days, 30);
        assert_eq!(cfg.always_on_threshold, DEFAULT_ALWAYS_ON_THRESHOLD);
        assert_eq!(cfg.device_daily_csv, PathBuf::from("out/daily.csv"));
        assert_eq!(cfg.input_csv, ReportConfig::default().input_csv);
        assert_eq!(ignored, vec!["always_on_threshold".to_string()]);
    }

    #[test]
    fn lookback_accepts_loose_numeric_forms() {
        assert_eq!(parse_lookback(&json!(null)), Some(0));
        assert_eq!(parse_lookback(&json!(7.9)), Some(7));
        assert_eq!(parse_lookback(&json!(" 14 ")), Some(14));
        assert_eq!(parse_lookback(&json!(-2)), Some(-2));
        assert_eq!(parse_lookback(&json!([1])), None);
    }

    #[test]
    fn threshold_must_lie_in_unit_interval() {
        assert_eq!(parse_threshold(&json!(0.8)), Some(0.8));
        assert_eq!(parse_threshold(&json!(1)), Some(1.0));
        assert_eq!(parse_threshold(&json!(0)), None);
        assert_eq!(parse_threshold(&json!(1.5)), None);
    }

    #[test]
    fn non_object_root_is_ignored() {
        let mut cfg = ReportConfig::default();
        let ignored = apply_overrides(&mut cfg, &json!([1, 2, 3]));
        assert_eq!(cfg, ReportConfig::default());
        assert_eq!(ignored, vec!["<root>".to_string()]);
    }

    #[test]
    fn resolve_joins_relative_paths_onto_base_dir() {
        let base = Path::new("/opt/report");
        let resolved = ReportConfig::default().resolve(base);
        assert_eq!(
            resolved.input_csv,
            PathBuf::from("/opt/report/input/transaction_log.csv")
        );
        assert_eq!(resolved.output_dir(), PathBuf::from("/opt/report/output"));
    }
}
