//! Application wiring and main-loop lifecycle.

use std::sync::Arc;

use anyhow::{Result, bail};
use log::{info, warn};
use tokio::sync::mpsc;

use crate::{
    config::Config,
    device::{DeviceCommand, HttpDeviceClient},
    dispatch::CommandDispatcher,
    event::{Event, EventBus},
    poller::TelemetryPoller,
    store::ControlStateStore,
};

/// Main application structure wiring config, store, dispatcher and poller.
///
/// Runs until Ctrl+C, then stops the poller before the dispatcher so no new
/// mutation can arrive while queued commands drain.
///
/// # Example
///
/// ```no_run
/// use smartfand::{application::Application, config::Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::load(None)?;
/// Application::builder()
///     .with_config(config)
///     .build()?
///     .run()
///     .await
/// # }
/// ```
pub struct Application {
    config: Config,
    store: Arc<ControlStateStore>,
    event_bus: EventBus,
    client: Arc<HttpDeviceClient>,
    command_rx: mpsc::UnboundedReceiver<DeviceCommand>,
}

impl Application {
    /// Creates a new ApplicationBuilder for constructing Application instances.
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Handle for presenter-facing layers to read snapshots and issue
    /// operator intent through the store's public operations.
    pub fn store(&self) -> Arc<ControlStateStore> {
        self.store.clone()
    }

    /// Returns the event bus for status subscriptions.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Runs the client: starts polling, reports status events, and shuts
    /// down gracefully on Ctrl+C.
    pub async fn run(self) -> Result<()> {
        let Self {
            config,
            store,
            event_bus,
            client,
            command_rx,
        } = self;

        let mut event_rx = event_bus.subscribe();

        let dispatcher = CommandDispatcher::spawn(
            command_rx,
            client.clone(),
            event_bus.clone(),
            store.health_handle(),
        );
        let mut poller = TelemetryPoller::new(
            client,
            store.clone(),
            config.tick_interval(),
            config.request_timeout(),
        );
        poller.start();

        info!(
            "smartfand started, polling {} every {}s",
            config.endpoint, config.tick_seconds
        );

        loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    match result {
                        Ok(()) => {
                            info!("Received Ctrl+C, initiating graceful shutdown...");
                            break;
                        }
                        Err(e) => {
                            poller.stop().await;
                            dispatcher.shutdown().await;
                            bail!("Failed to listen for shutdown signal: {e}");
                        }
                    }
                }

                event = event_rx.recv() => {
                    if !handle_event(&store, event).await? {
                        break;
                    }
                }
            }
        }

        poller.stop().await;
        dispatcher.shutdown().await;
        info!("Shutdown complete");
        Ok(())
    }
}

/// Logs a status event; returns `false` when the main loop should exit.
async fn handle_event(
    store: &Arc<ControlStateStore>,
    event: std::result::Result<Event, tokio::sync::broadcast::error::RecvError>,
) -> Result<bool> {
    match event {
        Ok(Event::TelemetryUpdated(reading)) => {
            let state = store.snapshot().await;
            info!(
                "Telemetry: {:.1}°C / {:.1}% humidity, mode {}, fan speed {}",
                reading.temperature_c, reading.humidity_pct, state.mode, state.derived_speed
            );
        }
        Ok(Event::TelemetryFailed(error)) => {
            warn!("Last telemetry update failed: {error}");
        }
        Ok(Event::CommandSent(command)) => {
            info!("Command acknowledged: {command:?}");
        }
        Ok(Event::CommandFailed { command, error }) => {
            warn!("Last command not acknowledged ({command:?}): {error}");
        }
        Ok(Event::SystemShutdown) => {
            info!("Processing SystemShutdown event");
            return Ok(false);
        }
        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
            bail!("Event bus channel closed unexpectedly");
        }
        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
            warn!("Event bus lagged by {n} messages");
        }
    }
    Ok(true)
}

/// Builder pattern for creating Application instances.
pub struct ApplicationBuilder {
    config: Option<Config>,
}

impl ApplicationBuilder {
    fn new() -> Self {
        Self { config: None }
    }

    /// Sets the configuration for the application.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the Application instance with the provided configuration.
    pub fn build(self) -> Result<Application> {
        let config = self
            .config
            .ok_or_else(|| anyhow::anyhow!("Configuration is required"))?;
        config.validate()?;

        let event_bus = EventBus::new();
        let client = Arc::new(HttpDeviceClient::new(
            &config.endpoint,
            config.request_timeout(),
        )?);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let store = Arc::new(ControlStateStore::new(
            config.tier_table()?,
            command_tx,
            event_bus.clone(),
        ));

        Ok(Application {
            config,
            store,
            event_bus,
            client,
            command_rx,
        })
    }
}
