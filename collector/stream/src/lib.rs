use crate::config::MraStreamConfig;
use crate::error::MraStreamError;
use crate::sse::{events_from_payload, SseFrame, SseFrameDecoder, HEARTBEAT_EVENT};
use futures::stream::TryStreamExt;
use log::*;
use mra_common_api::EventForwarder;
use reqwest::{header, Client, Response};
use serde::Deserialize;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_util::compat::FuturesAsyncReadCompatExt;
use tokio_util::sync::CancellationToken;

pub mod config;
pub mod error;
pub mod sse;

const TOKEN_API_PATH: &str = "/oauth2/token";
const EVENTS_API_PATH: &str = "/mra/stream/v2/events";
const CONNECT_TIMEOUT_SECS: u64 = 30;

#[derive(Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

/// Consumes the MRA v2 event stream of one enterprise and hands every event,
/// in order, to the forwarder. There is no reconnection: when the stream ends
/// or fails, the error is returned to the caller.
pub struct MraStreamConnector<F: EventForwarder> {
    pub stream_config: MraStreamConfig,
    pub forwarder: F,
    client: Client,
}

impl<F: EventForwarder> MraStreamConnector<F> {
    pub fn new(
        stream_config: MraStreamConfig,
        forwarder: F,
    ) -> Result<MraStreamConnector<F>, MraStreamError> {
        // No request timeout: the event stream is a long living response
        let client = reqwest::ClientBuilder::new()
            .use_rustls_tls()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| MraStreamError::MraConnectionError {
                message: format!(
                    "Cannot build the client for the MRA API at {}. Err: {:?}",
                    stream_config.api_domain, e
                ),
            })?;

        let mut stream_config = stream_config;
        stream_config.api_domain = stream_config.api_domain.trim_end_matches('/').to_owned();

        Ok(MraStreamConnector { stream_config, forwarder, client })
    }

    async fn request_access_token(&self) -> Result<String, MraStreamError> {
        let url = format!("{}{}", self.stream_config.api_domain, TOKEN_API_PATH);
        debug!("Requesting MRA access token from {}", url);

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .bearer_auth(&self.stream_config.api_key)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| MraStreamError::CannotPerformHttpRequest {
                message: format!("Cannot perform POST request to {}. err: {}", url, e),
            })?;

        let response_status = response.status();
        if !response_status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MraStreamError::AuthenticationError {
                message: format!(
                    "Failed token response returned from MRA, Response status: {:?} - body: {}",
                    response_status, body
                ),
            });
        }

        let token = response.json::<AccessTokenResponse>().await.map_err(|e| {
            MraStreamError::AuthenticationError {
                message: format!("Cannot read the access token returned by MRA. Err: {}", e),
            }
        })?;
        Ok(token.access_token)
    }

    async fn open_stream(&self) -> Result<Response, MraStreamError> {
        let access_token = self.request_access_token().await?;
        let url = format!("{}{}", self.stream_config.api_domain, EVENTS_API_PATH);

        info!("Opening MRA event stream at {} for types [{}]", url, self.stream_config.event_type);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("types", self.stream_config.event_type.as_str()),
                ("start_time", self.stream_config.start_time_param().as_str()),
            ])
            .header(header::ACCEPT, "text/event-stream")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| MraStreamError::CannotPerformHttpRequest {
                message: format!("Cannot perform GET request to {}. err: {}", url, e),
            })?;

        let response_status = response.status();
        if !response_status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MraStreamError::CannotPerformHttpRequest {
                message: format!(
                    "Failed response returned from MRA, Response status: {:?} - body: {}",
                    response_status, body
                ),
            });
        }
        Ok(response)
    }

    async fn forward_frame(&self, frame: SseFrame) {
        if frame.event.as_deref() == Some(HEARTBEAT_EVENT) {
            trace!("Heartbeat received from the MRA stream");
            return;
        }

        match events_from_payload(&frame.data) {
            Ok(events) => {
                for event in events {
                    self.forwarder.write(&event, &self.stream_config.enterprise_name).await;
                }
            }
            Err(e) => error!("Error processing MRA stream frame: [{}], Err: {}", frame.data, e),
        }
    }

    /// Streams the events until the shutdown token is cancelled.
    /// The token is checked while waiting for the connection and for each new line;
    /// an event already being forwarded is always completed.
    pub async fn start_streaming(&self, shutdown: CancellationToken) -> Result<(), MraStreamError> {
        info!("Starting MraStreamConnector with stream config: {:?}", self.stream_config);

        let response = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Shutdown requested before the MRA event stream was opened");
                return Ok(());
            }
            response = self.open_stream() => response?,
        };

        let reader = {
            // Convert the body of the response into a futures::io::Stream.
            let response = response.bytes_stream();

            // Convert the stream into an futures::io::AsyncRead.
            // We must first convert the reqwest::Error into an futures::io::Error.
            let response = response
                .map_err(|e| futures::io::Error::new(futures::io::ErrorKind::Other, e))
                .into_async_read();

            // Convert the futures::io::AsyncRead into a tokio::io::AsyncRead.
            let response = response.compat();

            tokio::io::BufReader::new(response)
        };

        let mut segments = reader.split(b'\n');
        let mut decoder = SseFrameDecoder::new();

        loop {
            let next_segment = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested. Closing the MRA event stream.");
                    return Ok(());
                }
                next_segment = segments.next_segment() => next_segment,
            };

            match next_segment {
                Ok(Some(segment)) => match String::from_utf8(segment) {
                    Ok(line) => {
                        trace!("Received line: {}", line);
                        if let Some(frame) = decoder.push_line(&line) {
                            self.forward_frame(frame).await;
                        }
                    }
                    Err(e) => {
                        error!(
                            "Invalid UTF-8 received from the MRA stream, the frame is discarded. Line: [{}], Err: {}",
                            String::from_utf8_lossy(e.as_bytes()),
                            e.utf8_error()
                        );
                        decoder.discard_frame();
                    }
                },
                Ok(None) => {
                    warn!("EOF received. Stopping MRA stream collector.");
                    return Err(MraStreamError::UnexpectedEndOfStream);
                }
                Err(e) => {
                    return Err(MraStreamError::CannotPerformHttpRequest {
                        message: format!(
                            "Error reading response from MRA at {}, Err: {:?}",
                            self.stream_config.api_domain, e
                        ),
                    });
                }
            }
        }
    }
}
