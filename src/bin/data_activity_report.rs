use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use activity_report::{
    base_dir_from_executable, init_logging, load_report_config, log_run_finish, log_run_start,
    logging_config_from_env, run_log_timestamp, run_report, ConfigSource, RunLog,
    CONFIG_FILE_NAME,
};
use chrono::Local;

fn main() -> ExitCode {
    let logging_cfg = logging_config_from_env();
    if let Err(err) = init_logging(&logging_cfg) {
        eprintln!("logging init failed: {err}");
    }

    let base_dir = base_dir_from_executable().unwrap_or_else(|_| PathBuf::from("."));
    log_run_start(&logging_cfg, &base_dir);

    let loaded = load_report_config(&base_dir.join(CONFIG_FILE_NAME));
    let paths = loaded.config.resolve(&base_dir);
    let mut run_log = RunLog::new(Some(paths.log_path.clone()));

    run_log.line(format!("start: {}", run_log_timestamp(&Local::now())));
    run_log.line(format!("script_dir: {}", base_dir.display()));
    match &loaded.source {
        ConfigSource::Defaults => {}
        ConfigSource::File { ignored_keys } if ignored_keys.is_empty() => {}
        ConfigSource::File { ignored_keys } => {
            run_log.line(format!("config_ignored_keys: {}", ignored_keys.join(", ")));
        }
        ConfigSource::Unreadable { reason } => {
            run_log.line(format!("config_ignored: {reason}"));
        }
    }
    run_log.line(format!("input_csv: {}", paths.input_csv.display()));
    run_log.line(format!("output_dir: {}", paths.output_dir().display()));

    match run_report(&paths, &loaded.config.pipeline(), &mut run_log) {
        Ok(_) => {
            run_log.line("done");
            log_run_finish("done", None);
            ExitCode::SUCCESS
        }
        Err(err) => {
            let message = format!("ERROR: {err}");
            run_log.line(&message);
            let mut source = err.source();
            while let Some(cause) = source {
                run_log.line(format!("caused by: {cause}"));
                source = cause.source();
            }
            eprintln!("{message}");
            log_run_finish("error", Some(&err.to_string()));
            ExitCode::FAILURE
        }
    }
}
