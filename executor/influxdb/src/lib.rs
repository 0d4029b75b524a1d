use crate::config::InfluxDbConfig;
use crate::point::Point;
use log::*;
use reqwest::{header, Client};
use std::time::Duration;
use thiserror::Error;

pub mod config;
pub mod point;

const WRITE_API_PATH: &str = "/api/v2/write";
const WRITE_PRECISION: &str = "ns";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum InfluxDbError {
    #[error("ConfigurationError: [{message}]")]
    ConfigurationError { message: String },
    #[error("WriteError: [{message}], status: {status:?}")]
    WriteError { message: String, status: Option<u16> },
    #[error("BadPointError: [{message}]")]
    BadPointError { message: String },
}

/// A client of the InfluxDB v2 write API.
/// Every call to `write_point` is a synchronous round trip: it returns only after
/// InfluxDB has accepted or rejected the point.
#[derive(Clone)]
pub struct InfluxDbClient {
    pub server_url: String,
    auth_header: String,
    client: Client,
}

impl InfluxDbClient {
    pub fn new(config: &InfluxDbConfig) -> Result<InfluxDbClient, InfluxDbError> {
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|err| InfluxDbError::ConfigurationError {
                message: format!("Error while building InfluxDbClient. Err: {:?}", err),
            })?;

        let server_url = config.url.trim_end_matches('/').to_owned();
        if server_url.is_empty() {
            return Err(InfluxDbError::ConfigurationError {
                message: "The InfluxDB url cannot be empty".to_owned(),
            });
        }

        info!("InfluxDbClient - Initialized InfluxDB connection to {}", server_url);
        Ok(InfluxDbClient { server_url, auth_header: format!("Token {}", config.token), client })
    }

    /// Writes a single point into the given bucket of the given organization.
    pub async fn write_point(&self, bucket: &str, org: &str, point: &Point) -> Result<(), InfluxDbError> {
        let body = point.to_line_protocol()?;
        let url = format!("{}{}", self.server_url, WRITE_API_PATH);

        trace!("InfluxDbClient - HTTP POST - url: {} - body: {}", url, body);

        let response = self
            .client
            .post(&url)
            .query(&[("org", org), ("bucket", bucket), ("precision", WRITE_PRECISION)])
            .header(header::AUTHORIZATION, &self.auth_header)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .header(header::ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|err| InfluxDbError::WriteError {
                message: format!("Cannot perform POST request to {}. Err: {:?}", url, err),
                status: None,
            })?;

        let response_status = response.status();
        if !response_status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InfluxDbError::WriteError {
                message: format!(
                    "InfluxDB rejected the point. Response status: {:?} - body: {}",
                    response_status, body
                ),
                status: Some(response_status.as_u16()),
            });
        }

        debug!("InfluxDbClient - Point correctly written to bucket [{}]", bucket);
        Ok(())
    }
}
