use crate::error::IngestorError;
use config_rs::Config;
use mra_collector_stream::config::DEFAULT_API_DOMAIN;
use mra_common_logger::{LoggerConfig, DEFAULT_LOG_FILE_PATH, DEFAULT_LOG_LEVEL};
use mra_executor_influxdb::config::InfluxDbConfig;
use serde::Deserialize;
use std::fmt;

pub const INFLUX_URL: &str = "INFLUX_URL";
pub const INFLUX_TOKEN: &str = "INFLUX_TOKEN";
pub const INFLUX_ORG: &str = "INFLUX_ORG";
pub const INFLUX_BUCKET: &str = "INFLUX_BUCKET";
pub const MRA_API_KEY: &str = "MRA_API_KEY";
pub const ENTERPRISE_NAME: &str = "ENTERPRISE_NAME";
pub const MRA_API_DOMAIN: &str = "MRA_API_DOMAIN";
pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const LOG_FILE_PATH: &str = "LOG_FILE_PATH";

const ENVIRONMENT_VARIABLES: [&str; 9] = [
    INFLUX_URL,
    INFLUX_TOKEN,
    INFLUX_ORG,
    INFLUX_BUCKET,
    MRA_API_KEY,
    ENTERPRISE_NAME,
    MRA_API_DOMAIN,
    LOG_LEVEL,
    LOG_FILE_PATH,
];

pub const DEFAULT_INFLUX_URL: &str = "http://localhost:8086";
/// Placeholder; a real deployment must override it.
pub const DEFAULT_INFLUX_TOKEN: &str = "your-secret-token";
pub const DEFAULT_INFLUX_ORG: &str = "lookout";
pub const DEFAULT_INFLUX_BUCKET: &str = "mra_events";

#[derive(Deserialize)]
struct EnvironmentConfig {
    influx_url: String,
    influx_token: String,
    influx_org: String,
    influx_bucket: String,
    mra_api_key: Option<String>,
    enterprise_name: Option<String>,
    mra_api_domain: String,
    log_level: String,
    log_file_path: String,
}

/// The credentials used to subscribe to the MRA stream.
#[derive(Clone, PartialEq)]
pub struct MraCredentials {
    pub api_domain: String,
    pub api_key: String,
    pub enterprise_name: String,
}

impl fmt::Debug for MraCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MraCredentials")
            .field("api_domain", &self.api_domain)
            .field("api_key", &"***")
            .field("enterprise_name", &self.enterprise_name)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngestorConfig {
    /// The logger configuration
    pub logger: LoggerConfig,
    pub influxdb: InfluxDbConfig,
    pub mra: MraCredentials,
}

/// Builds the configuration from the environment of the current process.
pub fn build_config_from_env() -> Result<IngestorConfig, IngestorError> {
    build_config(std::env::vars())
}

/// Builds the configuration from a list of environment variables.
/// Unknown variables are ignored.
/// Fails if `MRA_API_KEY` or `ENTERPRISE_NAME` is missing or empty.
pub fn build_config<I, K, V>(vars: I) -> Result<IngestorConfig, IngestorError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut s = Config::new();
    s.set_default(&INFLUX_URL.to_lowercase(), DEFAULT_INFLUX_URL)?;
    s.set_default(&INFLUX_TOKEN.to_lowercase(), DEFAULT_INFLUX_TOKEN)?;
    s.set_default(&INFLUX_ORG.to_lowercase(), DEFAULT_INFLUX_ORG)?;
    s.set_default(&INFLUX_BUCKET.to_lowercase(), DEFAULT_INFLUX_BUCKET)?;
    s.set_default(&MRA_API_DOMAIN.to_lowercase(), DEFAULT_API_DOMAIN)?;
    s.set_default(&LOG_LEVEL.to_lowercase(), DEFAULT_LOG_LEVEL)?;
    s.set_default(&LOG_FILE_PATH.to_lowercase(), DEFAULT_LOG_FILE_PATH)?;

    for (key, value) in vars {
        let key = key.as_ref();
        if ENVIRONMENT_VARIABLES.contains(&key) {
            s.set(&key.to_lowercase(), value.into())?;
        }
    }

    let env: EnvironmentConfig = s.try_into()?;

    let api_key = env.mra_api_key.filter(|value| !value.is_empty());
    let enterprise_name = env.enterprise_name.filter(|value| !value.is_empty());

    let (api_key, enterprise_name) = match (api_key, enterprise_name) {
        (Some(api_key), Some(enterprise_name)) => (api_key, enterprise_name),
        (api_key, enterprise_name) => {
            let missing: Vec<&str> = [(MRA_API_KEY, api_key.is_none()), (ENTERPRISE_NAME, enterprise_name.is_none())]
                .iter()
                .filter(|(_, missing)| *missing)
                .map(|(name, _)| *name)
                .collect();
            return Err(IngestorError::ConfigurationError {
                message: format!(
                    "{} and {} environment variables are required. Missing: {:?}",
                    MRA_API_KEY, ENTERPRISE_NAME, missing
                ),
            });
        }
    };

    Ok(IngestorConfig {
        logger: LoggerConfig {
            level: env.log_level,
            stdout_output: true,
            file_output_path: Some(env.log_file_path),
        },
        influxdb: InfluxDbConfig {
            url: env.influx_url,
            token: env.influx_token,
            org: env.influx_org,
            bucket: env.influx_bucket,
        },
        mra: MraCredentials { api_domain: env.mra_api_domain, api_key, enterprise_name },
    })
}
