use mra_collector_stream::error::MraStreamError;
use mra_common_api::CommonError;
use mra_common_logger::LoggerError;
use mra_executor_influxdb::InfluxDbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestorError {
    #[error("ConfigurationError: [{message}]")]
    ConfigurationError { message: String },
    #[error("LoggerError: [{message}]")]
    LoggerError { message: String },
    #[error("ForwarderCreationError: [{message}]")]
    ForwarderCreationError { message: String },
    #[error("ForwardError: [{message}]")]
    ForwardError { message: String },
    #[error("StreamError: [{message}]")]
    StreamError { message: String },
}

impl From<config_rs::ConfigError> for IngestorError {
    fn from(error: config_rs::ConfigError) -> Self {
        IngestorError::ConfigurationError { message: format!("{}", error) }
    }
}

impl From<LoggerError> for IngestorError {
    fn from(error: LoggerError) -> Self {
        IngestorError::LoggerError { message: format!("{}", error) }
    }
}

impl From<CommonError> for IngestorError {
    fn from(error: CommonError) -> Self {
        IngestorError::ForwardError { message: format!("{}", error) }
    }
}

impl From<InfluxDbError> for IngestorError {
    fn from(error: InfluxDbError) -> Self {
        IngestorError::ForwardError { message: format!("{}", error) }
    }
}

impl From<MraStreamError> for IngestorError {
    fn from(error: MraStreamError) -> Self {
        IngestorError::StreamError { message: format!("{}", error) }
    }
}
