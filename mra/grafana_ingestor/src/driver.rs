use crate::config::MraCredentials;
use crate::error::IngestorError;
use chrono::{DateTime, Duration, Utc};
use log::*;
use mra_collector_stream::config::MraStreamConfig;
use mra_collector_stream::error::MraStreamError;
use mra_common_api::{join_event_types, EventType};
use mra_common_logger::LogWorkerGuard;
use std::future::Future;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// How far back in time the subscription starts.
pub const LOOKBACK_DAYS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

/// The process wide state of the ingestor.
/// It is created at startup and dropped when the process exits; dropping it
/// flushes the pending log lines.
pub struct IngestorContext {
    shutdown: CancellationToken,
    state: watch::Sender<LifecycleState>,
    _log_guard: Option<LogWorkerGuard>,
}

impl IngestorContext {
    pub fn new(log_guard: Option<LogWorkerGuard>) -> IngestorContext {
        let (state, _) = watch::channel(LifecycleState::Starting);
        IngestorContext { shutdown: CancellationToken::new(), state, _log_guard: log_guard }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn set_state(&self, state: LifecycleState) {
        debug!("Ingestor state: {:?} -> {:?}", self.state(), state);
        self.state.send_replace(state);
    }
}

/// Builds the subscription: every known event type, starting one day before `now`.
pub fn build_stream_config(credentials: &MraCredentials, now: DateTime<Utc>) -> MraStreamConfig {
    MraStreamConfig {
        api_domain: credentials.api_domain.clone(),
        api_key: credentials.api_key.clone(),
        enterprise_name: credentials.enterprise_name.clone(),
        start_time: now - Duration::days(LOOKBACK_DAYS),
        event_type: join_event_types(&EventType::ALL),
    }
}

pub struct StreamDriver<'a> {
    context: &'a IngestorContext,
}

impl<'a> StreamDriver<'a> {
    pub fn new(context: &'a IngestorContext) -> StreamDriver<'a> {
        StreamDriver { context }
    }

    /// Runs the stream unit in its own task until the shutdown signal resolves.
    ///
    /// On shutdown the unit is cancelled through its token and awaited to completion.
    /// If the unit terminates on its own, for any reason, the ingestor cannot go on
    /// and an error is returned.
    pub async fn run<S, F, Sig>(&self, stream_unit: S, shutdown_signal: Sig) -> Result<(), IngestorError>
    where
        S: FnOnce(CancellationToken) -> F,
        F: Future<Output = Result<(), MraStreamError>> + Send + 'static,
        Sig: Future<Output = ()>,
    {
        let mut stream_task = tokio::spawn(stream_unit(self.context.shutdown_token()));
        self.context.set_state(LifecycleState::Running);
        info!("Starting MRA event ingestion...");

        let stream_result = tokio::select! {
            _ = shutdown_signal => None,
            result = &mut stream_task => Some(result),
        };

        match stream_result {
            None => {
                info!("Shutting down...");
                self.context.set_state(LifecycleState::ShuttingDown);
                self.context.shutdown.cancel();

                let result = stream_task.await;
                self.context.set_state(LifecycleState::Stopped);
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!("The MRA stream stopped with an error during shutdown: {}", err),
                    Err(err) => error!("The MRA stream task failed during shutdown: {}", err),
                }
                info!("Shutdown complete");
                Ok(())
            }
            Some(result) => {
                let err = match result {
                    Ok(Ok(())) => IngestorError::StreamError {
                        message: "The MRA stream stopped unexpectedly".to_owned(),
                    },
                    Ok(Err(err)) => err.into(),
                    Err(err) => IngestorError::StreamError {
                        message: format!("The MRA stream task failed. Err: {}", err),
                    },
                };
                error!("Unexpected error: {}", err);
                Err(err)
            }
        }
    }
}
