//! Sequential command dispatch to the device.
//!
//! A single worker task drains the store's command queue, awaiting each send
//! to completion before taking the next one. Commands therefore reach the
//! device in exactly the order the operator issued them: no reordering, no
//! coalescing, no dedup. A failed send is recorded as link status and never
//! retried; the store keeps its optimistic state.

use std::{sync::Arc, time::Duration};

use log::{error, info};
use tokio::{
    sync::{RwLock, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    device::{CommandSink, DeviceCommand},
    event::{Event, EventBus},
    store::LinkHealth,
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns the dispatch worker task and its cancellation token.
pub struct CommandDispatcher {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl CommandDispatcher {
    /// Spawns the worker draining `rx` into `sink`.
    pub fn spawn(
        rx: mpsc::UnboundedReceiver<DeviceCommand>,
        sink: Arc<dyn CommandSink>,
        event_bus: EventBus,
        health: Arc<RwLock<LinkHealth>>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_dispatch_loop(
            rx,
            sink,
            event_bus,
            health,
            cancel.clone(),
        ));

        Self { cancel, handle }
    }

    /// Stops the worker, letting already-enqueued commands drain first.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.handle).await {
            Ok(Ok(())) => info!("Command dispatcher stopped"),
            Ok(Err(e)) => error!("Command dispatcher task panicked: {e}"),
            Err(_) => error!("Command dispatcher shutdown timeout exceeded"),
        }
    }
}

async fn run_dispatch_loop(
    mut rx: mpsc::UnboundedReceiver<DeviceCommand>,
    sink: Arc<dyn CommandSink>,
    event_bus: EventBus,
    health: Arc<RwLock<LinkHealth>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            // Pending commands win the race so cancellation cannot reorder
            // or skip work that was already enqueued.
            biased;

            command = rx.recv() => match command {
                Some(command) => dispatch_one(command, &sink, &event_bus, &health).await,
                None => break,
            },

            () = cancel.cancelled() => {
                while let Ok(command) = rx.try_recv() {
                    dispatch_one(command, &sink, &event_bus, &health).await;
                }
                break;
            }
        }
    }
    info!("Dispatch loop terminated");
}

async fn dispatch_one(
    command: DeviceCommand,
    sink: &Arc<dyn CommandSink>,
    event_bus: &EventBus,
    health: &Arc<RwLock<LinkHealth>>,
) {
    match sink.send(command.clone()).await {
        Ok(()) => {
            health.write().await.last_command_error = None;
            let _ = event_bus.publish(Event::CommandSent(command));
        }
        Err(e) => {
            error!("Command {command:?} not acknowledged: {e}");
            health.write().await.last_command_error = Some(e.to_string());
            let _ = event_bus.publish(Event::CommandFailed {
                command,
                error: e.to_string(),
            });
        }
    }
}
