//! Event-driven status notifications for presenter-facing consumers.

use anyhow::Result;
use tokio::sync::broadcast;

use crate::{device::DeviceCommand, telemetry::Telemetry};

/// Status events published by the store and the command dispatcher.
///
/// Events mirror state the store already holds; consumers that miss events
/// (lag, late subscription) can always fall back to a store snapshot.
#[derive(Debug, Clone)]
pub enum Event {
    /// A poll succeeded and the stored telemetry was replaced.
    TelemetryUpdated(Telemetry),
    /// A poll failed; polling continues on the same cadence.
    TelemetryFailed(String),
    /// A command was acknowledged by the device endpoint.
    CommandSent(DeviceCommand),
    /// A command was not acknowledged; local state is kept as-is.
    CommandFailed {
        command: DeviceCommand,
        error: String,
    },
    SystemShutdown,
}

/// Broadcast bus for publish-subscribe status messaging.
///
/// # Example
///
/// ```no_run
/// use smartfand::event::{Event, EventBus};
///
/// let event_bus = EventBus::new();
/// let mut subscriber = event_bus.subscribe();
///
/// let _ = event_bus.publish(Event::SystemShutdown);
///
/// // In async context, receive events:
/// // let event = subscriber.recv().await;
/// ```
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Creates a new EventBus with default capacity.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(100);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns an error if there are no active subscribers.
    pub fn publish(&self, event: Event) -> Result<()> {
        self.sender.send(event)?;
        Ok(())
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Each subscriber receives all events published after subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
