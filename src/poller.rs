//! Telemetry polling loop with an explicit start/stop lifecycle.

use std::{sync::Arc, time::Duration};

use log::{error, info};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    device::TelemetrySource,
    error::{ControlError, Result},
    store::ControlStateStore,
    telemetry::Telemetry,
};

/// Polls the telemetry source on a fixed cadence and feeds the store.
///
/// Two states only: Stopped and Running. Each tick performs a single
/// request-response with a bounded timeout; a request still outstanding when
/// the next tick would fire delays that tick instead of piling up a second
/// in-flight request. Failed polls are recorded and polling continues.
///
/// `stop()` cancels the loop and joins the task. A response that resolves
/// after cancellation loses the race and is dropped, so no store mutation
/// can happen once `stop()` has returned.
pub struct TelemetryPoller {
    source: Arc<dyn TelemetrySource>,
    store: Arc<ControlStateStore>,
    cadence: Duration,
    request_timeout: Duration,
    running: Option<RunningPoll>,
}

struct RunningPoll {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl TelemetryPoller {
    pub fn new(
        source: Arc<dyn TelemetrySource>,
        store: Arc<ControlStateStore>,
        cadence: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            source,
            store,
            cadence,
            request_timeout,
            running: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Starts polling; a no-op when already running.
    pub fn start(&mut self) {
        if self.running.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_poll_loop(
            self.source.clone(),
            self.store.clone(),
            self.cadence,
            self.request_timeout,
            cancel.clone(),
        ));

        info!("Telemetry poller started (cadence {:?})", self.cadence);
        self.running = Some(RunningPoll { cancel, handle });
    }

    /// Stops polling and waits for the loop to wind down; a no-op when
    /// already stopped. Safe to call mid-request.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            error!("Telemetry poller task panicked: {e}");
        }
        info!("Telemetry poller stopped");
    }
}

async fn run_poll_loop(
    source: Arc<dyn TelemetrySource>,
    store: Arc<ControlStateStore>,
    cadence: Duration,
    request_timeout: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(cadence);
    // A slow poll delays the next tick instead of bursting to catch up.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("Telemetry poller cancelled");
                break;
            }
            _instant = ticker.tick() => {
                let outcome = tokio::select! {
                    () = cancel.cancelled() => break,
                    outcome = poll_once(source.as_ref(), request_timeout) => outcome,
                };

                match outcome {
                    Ok(reading) => store.apply_telemetry(reading).await,
                    Err(e) => {
                        error!("Telemetry poll failed: {e}");
                        store.record_poll_failure(&e).await;
                    }
                }
            }
        }
    }
}

async fn poll_once(source: &dyn TelemetrySource, request_timeout: Duration) -> Result<Telemetry> {
    match tokio::time::timeout(request_timeout, source.fetch()).await {
        Ok(outcome) => outcome,
        Err(_) => Err(ControlError::network(format!(
            "telemetry request timed out after {}s",
            request_timeout.as_secs()
        ))),
    }
}
