use crate::config::IngestorConfig;
use crate::driver::{build_stream_config, IngestorContext, StreamDriver};
use crate::error::IngestorError;
use crate::forwarder::InfluxDbForwarder;
use chrono::Utc;
use log::*;
use mra_collector_stream::MraStreamConnector;
use std::future::Future;

pub mod config;
pub mod driver;
pub mod error;
pub mod forwarder;

/// Connects the MRA stream to InfluxDB and forwards events until `shutdown_signal` resolves.
pub async fn start<Sig: Future<Output = ()>>(
    config: IngestorConfig,
    context: &IngestorContext,
    shutdown_signal: Sig,
) -> Result<(), IngestorError> {
    if config.influxdb.token == config::DEFAULT_INFLUX_TOKEN {
        warn!("{} is not set, the placeholder token is used", config::INFLUX_TOKEN);
    }

    let forwarder = InfluxDbForwarder::new(&config.influxdb)?;
    let stream_config = build_stream_config(&config.mra, Utc::now());
    let connector = MraStreamConnector::new(stream_config, forwarder)?;

    info!(
        "Forwarding MRA events of enterprise [{}] to bucket [{}] of organization [{}]",
        config.mra.enterprise_name, config.influxdb.bucket, config.influxdb.org
    );

    StreamDriver::new(context)
        .run(move |shutdown| async move { connector.start_streaming(shutdown).await }, shutdown_signal)
        .await
}
