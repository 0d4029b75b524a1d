use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use tracing::subscriber::set_global_default;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::Layer, layer::SubscriberExt, EnvFilter};

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_FILE_PATH: &str = "./mra_grafana_ingestor.log";

/// Defines the Logger configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Sets the logger [`EnvFilter`].
    /// Valid values: trace, debug, info, warn, error
    /// Example of a valid filter: "warn,my_crate=info,my_crate::my_mod=debug"
    pub level: String,

    /// Determines whether the Logger should print to standard output.
    pub stdout_output: bool,

    // A file path in the file system; if provided, the Logger appends any output to it.
    // The file is never rotated.
    pub file_output_path: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        LoggerConfig {
            level: DEFAULT_LOG_LEVEL.to_owned(),
            stdout_output: true,
            file_output_path: Some(DEFAULT_LOG_FILE_PATH.to_owned()),
        }
    }
}

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("LoggerConfigurationError: [{message}]")]
    LoggerConfigurationError { message: String },
}

impl From<std::io::Error> for LoggerError {
    fn from(error: std::io::Error) -> Self {
        LoggerError::LoggerConfigurationError { message: format!("{}", error) }
    }
}

/// Keeps the non-blocking writers alive.
/// Pending log lines are flushed when it is dropped, so it must live as long as the process.
pub struct LogWorkerGuard {
    #[allow(dead_code)]
    file_guard: Option<WorkerGuard>,
    #[allow(dead_code)]
    stdout_guard: Option<WorkerGuard>,
}

/// Configures the underlying logger implementation and activates it.
/// Records emitted through the `log` crate are forwarded to the same subscriber.
pub fn setup_logger(logger_config: &LoggerConfig) -> Result<LogWorkerGuard, LoggerError> {
    let env_filter = EnvFilter::from_str(&logger_config.level).map_err(|err| {
        LoggerError::LoggerConfigurationError {
            message: format!(
                "Cannot parse the logger level: [{}]. err: {:?}",
                logger_config.level, err
            ),
        }
    })?;

    let (file_layer, file_guard) = if let Some(file_output) = &logger_config.file_output_path {
        let (dir, filename) = path_to_dir_and_filename(file_output)?;
        std::fs::create_dir_all(&dir)?;
        let file_appender = tracing_appender::rolling::never(dir, filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        (Some(Layer::new().with_ansi(false).with_writer(non_blocking)), Some(guard))
    } else {
        (None, None)
    };

    let (stdout_layer, stdout_guard) = if logger_config.stdout_output {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
        (Some(Layer::new().with_ansi(false).with_writer(non_blocking)), Some(guard))
    } else {
        (None, None)
    };

    let subscriber =
        tracing_subscriber::registry().with(env_filter).with(file_layer).with(stdout_layer);

    set_global_logger(subscriber)?;

    Ok(LogWorkerGuard { file_guard, stdout_guard })
}

fn path_to_dir_and_filename(full_path: &str) -> Result<(String, String), LoggerError> {
    let full_path = full_path.replace(r#"\"#, "/");
    let (dir, filename) = match full_path.rfind('/') {
        Some(last_separator_index) => (
            full_path[0..last_separator_index + 1].to_owned(),
            full_path[last_separator_index + 1..].to_owned(),
        ),
        None => ("./".to_owned(), full_path.clone()),
    };

    if filename.is_empty() {
        return Err(LoggerError::LoggerConfigurationError {
            message: format!("Output file path [{}] does not contain a file name", full_path),
        });
    }
    Ok((dir, filename))
}

fn set_global_logger<S>(subscriber: S) -> Result<(), LoggerError>
where
    S: Subscriber + Send + Sync + 'static,
{
    tracing_log::LogTracer::init().map_err(|err| LoggerError::LoggerConfigurationError {
        message: format!("Cannot start the logger LogTracer. err: {:?}", err),
    })?;
    set_global_default(subscriber).map_err(|err| LoggerError::LoggerConfigurationError {
        message: format!("Cannot start the logger. err: {:?}", err),
    })
}

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn should_split_the_file_path() {
        assert_eq!(
            ("/tmp/hello/".to_owned(), "filename".to_owned()),
            path_to_dir_and_filename("/tmp/hello/filename").unwrap()
        );
        assert_eq!(
            ("./".to_owned(), "mra_grafana_ingestor.log".to_owned()),
            path_to_dir_and_filename(DEFAULT_LOG_FILE_PATH).unwrap()
        );
        assert_eq!(
            ("/".to_owned(), "log_output.log".to_owned()),
            path_to_dir_and_filename("/log_output.log").unwrap()
        );
        assert_eq!(
            ("/tmp/hello/".to_owned(), "filename".to_owned()),
            path_to_dir_and_filename(r#"/tmp\hello/filename"#).unwrap()
        );
    }

    #[test]
    fn should_use_the_current_dir_if_directory_is_not_present() {
        assert_eq!(
            ("./".to_owned(), "ingestor.log".to_owned()),
            path_to_dir_and_filename("ingestor.log").unwrap()
        );
    }

    #[test]
    fn split_the_file_path_should_fail_if_filename_is_not_present() {
        assert!(path_to_dir_and_filename("/var/log/").is_err());
    }

    #[test]
    fn default_config_should_log_to_stdout_and_file() {
        let config = LoggerConfig::default();
        assert_eq!("info", config.level);
        assert!(config.stdout_output);
        assert_eq!(Some(DEFAULT_LOG_FILE_PATH.to_owned()), config.file_output_path);
    }

    #[test]
    fn should_reject_an_invalid_level() {
        let config = LoggerConfig {
            level: "mra=verbose".to_owned(),
            stdout_output: false,
            file_output_path: None,
        };
        assert!(setup_logger(&config).is_err());
    }
}
