//! Control-state store: the single owner of mode, telemetry and fan speed.
//!
//! All mutation funnels through the store's operations; the poller, the
//! operator-facing layer and the command dispatcher never touch the state
//! directly. Mutating operations hold the state write lock for their whole
//! read-modify-enqueue sequence, so command queue order always matches
//! mutation order.

use std::sync::Arc;

use log::debug;
use tokio::sync::{RwLock, mpsc};

use crate::{
    device::DeviceCommand,
    error::{ControlError, Result},
    event::{Event, EventBus},
    fan_tiers::TierTable,
    telemetry::Telemetry,
};

const MAX_MANUAL_LEVEL: u8 = 100;

/// Who decides the fan speed: the tier table or the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Auto,
    Manual,
}

impl std::fmt::Display for ControlMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

impl std::str::FromStr for ControlMode {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            other => Err(ControlError::validation(format!(
                "unrecognized mode {other:?}, expected \"auto\" or \"manual\""
            ))),
        }
    }
}

/// Aggregate session state, created fresh at startup and never persisted.
///
/// Invariants: in Auto mode with telemetry present, `derived_speed` is the
/// tier of the latest reading; in Manual mode it equals `manual_level`.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlState {
    pub mode: ControlMode,
    /// Last-known reading; absent until the first successful poll.
    pub telemetry: Option<Telemetry>,
    /// Operator-set level, retained across mode switches.
    pub manual_level: u8,
    /// Displayed fan speed: a tier (0–3) in Auto, the level (0–100) in Manual.
    pub derived_speed: u8,
}

impl ControlState {
    fn new() -> Self {
        Self {
            mode: ControlMode::Auto,
            telemetry: None,
            manual_level: 0,
            derived_speed: 0,
        }
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

/// Operator-visible status of the device link.
#[derive(Debug, Clone, Default)]
pub struct LinkHealth {
    /// Set while the latest poll has failed; cleared by the next success.
    pub last_telemetry_error: Option<String>,
    /// Set while the latest command went unacknowledged; cleared on success.
    pub last_command_error: Option<String>,
}

/// Exclusive owner of [`ControlState`].
///
/// Reconciles three inputs: telemetry arriving from the poller, operator
/// intent (mode and manual level), and command outcomes from the dispatcher.
/// The store is optimistic: operator intent is reflected immediately and a
/// failed command never rolls it back; the device stays the source of truth
/// and the next poll shows the real outcome.
pub struct ControlStateStore {
    state: RwLock<ControlState>,
    health: Arc<RwLock<LinkHealth>>,
    tiers: TierTable,
    command_tx: mpsc::UnboundedSender<DeviceCommand>,
    event_bus: EventBus,
}

impl ControlStateStore {
    pub fn new(
        tiers: TierTable,
        command_tx: mpsc::UnboundedSender<DeviceCommand>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            state: RwLock::new(ControlState::new()),
            health: Arc::new(RwLock::new(LinkHealth::default())),
            tiers,
            command_tx,
            event_bus,
        }
    }

    /// Replaces the stored telemetry with a fresh reading.
    ///
    /// Recomputes the derived speed when in Auto mode; never touches mode or
    /// manual level. Applying an identical reading twice is a no-op beyond
    /// the replacement itself.
    pub async fn apply_telemetry(&self, reading: Telemetry) {
        let mut state = self.state.write().await;
        if state.mode == ControlMode::Auto {
            state.derived_speed = self.tiers.derive(reading.temperature_c);
        }
        state.telemetry = Some(reading.clone());
        drop(state);

        self.health.write().await.last_telemetry_error = None;
        self.publish(Event::TelemetryUpdated(reading));
    }

    /// Switches control mode, returning whether anything changed.
    ///
    /// Switching to Auto re-derives the speed from the current telemetry;
    /// with no telemetry yet, the previous derived speed stands until the
    /// next poll. Switching to Manual adopts the retained manual level. A
    /// mode change enqueues exactly one command; setting the current mode
    /// again enqueues nothing.
    pub async fn set_mode(&self, mode: ControlMode) -> bool {
        let mut state = self.state.write().await;
        if state.mode == mode {
            return false;
        }

        state.mode = mode;
        let command = match mode {
            ControlMode::Auto => {
                if let Some(reading) = &state.telemetry {
                    state.derived_speed = self.tiers.derive(reading.temperature_c);
                }
                DeviceCommand::Auto
            }
            ControlMode::Manual => {
                state.derived_speed = state.manual_level;
                DeviceCommand::Manual {
                    speed: state.manual_level,
                }
            }
        };

        // Enqueued under the state lock: queue order == mutation order.
        self.enqueue(command);
        true
    }

    /// Sets the operator's manual fan level, returning whether it changed.
    ///
    /// Rejects levels above 100 before any mutation. The value is stored
    /// even in Auto mode (arming it for the next switch to Manual), but the
    /// derived speed changes and a command goes out only in Manual mode,
    /// since the device treats any manual-speed command as a switch out of
    /// auto.
    pub async fn set_manual_level(&self, level: u8) -> Result<bool> {
        if level > MAX_MANUAL_LEVEL {
            return Err(ControlError::validation(format!(
                "manual level {level} outside 0..={MAX_MANUAL_LEVEL}"
            )));
        }

        let mut state = self.state.write().await;
        if state.manual_level == level {
            return Ok(false);
        }

        state.manual_level = level;
        if state.mode == ControlMode::Manual {
            state.derived_speed = level;
            self.enqueue(DeviceCommand::Manual { speed: level });
        }
        Ok(true)
    }

    /// Returns an immutable snapshot of the current state.
    pub async fn snapshot(&self) -> ControlState {
        self.state.read().await.clone()
    }

    /// Returns the current device-link status.
    pub async fn health(&self) -> LinkHealth {
        self.health.read().await.clone()
    }

    /// Shared handle to the link status, written by the command dispatcher.
    pub fn health_handle(&self) -> Arc<RwLock<LinkHealth>> {
        self.health.clone()
    }

    /// Records a failed poll without touching the stored telemetry.
    pub async fn record_poll_failure(&self, error: &ControlError) {
        self.health.write().await.last_telemetry_error = Some(error.to_string());
        self.publish(Event::TelemetryFailed(error.to_string()));
    }

    fn enqueue(&self, command: DeviceCommand) {
        if self.command_tx.send(command.clone()).is_err() {
            log::warn!("Command dispatcher is gone, dropping {command:?}");
        }
    }

    fn publish(&self, event: Event) {
        if self.event_bus.publish(event).is_err() {
            debug!("No event subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn test_store() -> (ControlStateStore, UnboundedReceiver<DeviceCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = ControlStateStore::new(TierTable::default(), tx, EventBus::new());
        (store, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<DeviceCommand>) -> Vec<DeviceCommand> {
        let mut commands = Vec::new();
        while let Ok(command) = rx.try_recv() {
            commands.push(command);
        }
        commands
    }

    #[tokio::test]
    async fn initial_state_is_auto_with_no_telemetry() {
        let (store, _rx) = test_store();
        let state = store.snapshot().await;

        assert_eq!(state.mode, ControlMode::Auto);
        assert_eq!(state.telemetry, None);
        assert_eq!(state.manual_level, 0);
        assert_eq!(state.derived_speed, 0);
    }

    #[tokio::test]
    async fn telemetry_drives_derived_speed_in_auto() {
        let (store, mut rx) = test_store();

        store.apply_telemetry(Telemetry::new(27.4, 55.0)).await;

        let state = store.snapshot().await;
        assert_eq!(state.derived_speed, 2);
        assert_eq!(state.telemetry.unwrap().temperature_c, 27.4);
        // Telemetry never produces commands.
        assert_eq!(drain(&mut rx), vec![]);
    }

    #[tokio::test]
    async fn stringly_device_payload_derives_tier_two() {
        let (store, _rx) = test_store();
        let reading = crate::device::protocol::parse_reading(
            r#"{"temperature": "27.4", "humidity": "55"}"#,
        )
        .unwrap();

        store.apply_telemetry(reading).await;
        assert_eq!(store.snapshot().await.derived_speed, 2);
    }

    #[tokio::test]
    async fn telemetry_does_not_touch_manual_speed() {
        let (store, mut rx) = test_store();

        store.set_mode(ControlMode::Manual).await;
        store.set_manual_level(60).await.unwrap();
        store.apply_telemetry(Telemetry::new(31.0, 40.0)).await;

        let state = store.snapshot().await;
        assert_eq!(state.derived_speed, 60);
        assert_eq!(state.manual_level, 60);
        assert_eq!(
            drain(&mut rx),
            vec![
                DeviceCommand::Manual { speed: 0 },
                DeviceCommand::Manual { speed: 60 },
            ]
        );
    }

    #[tokio::test]
    async fn applying_identical_telemetry_is_idempotent() {
        let (store, _rx) = test_store();
        let reading = Telemetry::new(25.0, 50.0);

        store.apply_telemetry(reading.clone()).await;
        let first = store.snapshot().await;

        store.apply_telemetry(reading).await;
        store.set_mode(ControlMode::Auto).await;
        let second = store.snapshot().await;

        assert_eq!(first.derived_speed, second.derived_speed);
        assert_eq!(first.derived_speed, 1);
    }

    #[tokio::test]
    async fn setting_current_mode_again_produces_no_command() {
        let (store, mut rx) = test_store();

        assert!(!store.set_mode(ControlMode::Auto).await);
        assert_eq!(drain(&mut rx), vec![]);
    }

    #[tokio::test]
    async fn mode_switch_to_manual_adopts_retained_level() {
        let (store, mut rx) = test_store();

        store.set_mode(ControlMode::Manual).await;
        store.set_manual_level(73).await.unwrap();
        store.set_mode(ControlMode::Auto).await;
        store.set_mode(ControlMode::Manual).await;

        let state = store.snapshot().await;
        assert_eq!(state.manual_level, 73);
        assert_eq!(state.derived_speed, 73);
        assert_eq!(
            drain(&mut rx),
            vec![
                DeviceCommand::Manual { speed: 0 },
                DeviceCommand::Manual { speed: 73 },
                DeviceCommand::Auto,
                DeviceCommand::Manual { speed: 73 },
            ]
        );
    }

    #[tokio::test]
    async fn switch_back_to_auto_rederives_from_current_telemetry() {
        let (store, _rx) = test_store();

        store.apply_telemetry(Telemetry::new(29.0, 45.0)).await;
        store.set_mode(ControlMode::Manual).await;
        store.set_manual_level(10).await.unwrap();
        store.set_mode(ControlMode::Auto).await;

        assert_eq!(store.snapshot().await.derived_speed, 3);
    }

    #[tokio::test]
    async fn switch_to_auto_without_telemetry_keeps_prior_speed() {
        let (store, _rx) = test_store();

        store.set_mode(ControlMode::Manual).await;
        store.set_manual_level(42).await.unwrap();
        store.set_mode(ControlMode::Auto).await;

        // No telemetry yet: the displayed speed stands until the next poll.
        assert_eq!(store.snapshot().await.derived_speed, 42);
    }

    #[tokio::test]
    async fn manual_level_in_manual_mode_sends_exactly_one_command() {
        let (store, mut rx) = test_store();

        store.set_mode(ControlMode::Manual).await;
        drain(&mut rx);

        assert!(store.set_manual_level(73).await.unwrap());

        let state = store.snapshot().await;
        assert_eq!(state.manual_level, 73);
        assert_eq!(state.derived_speed, 73);
        assert_eq!(drain(&mut rx), vec![DeviceCommand::Manual { speed: 73 }]);
    }

    #[tokio::test]
    async fn out_of_range_level_is_rejected_before_mutation() {
        let (store, mut rx) = test_store();
        store.set_mode(ControlMode::Manual).await;
        store.set_manual_level(30).await.unwrap();
        drain(&mut rx);
        let before = store.snapshot().await;

        let err = store.set_manual_level(101).await.unwrap_err();
        assert!(matches!(err, ControlError::Validation(_)));

        assert_eq!(store.snapshot().await, before);
        assert_eq!(drain(&mut rx), vec![]);
    }

    #[tokio::test]
    async fn boundary_levels_are_accepted() {
        let (store, _rx) = test_store();
        store.set_mode(ControlMode::Manual).await;

        store.set_manual_level(100).await.unwrap();
        assert_eq!(store.snapshot().await.derived_speed, 100);

        store.set_manual_level(0).await.unwrap();
        assert_eq!(store.snapshot().await.derived_speed, 0);
    }

    #[tokio::test]
    async fn arming_a_level_in_auto_stores_without_dispatching() {
        let (store, mut rx) = test_store();

        assert!(store.set_manual_level(55).await.unwrap());

        let state = store.snapshot().await;
        assert_eq!(state.manual_level, 55);
        assert_eq!(state.derived_speed, 0);
        assert_eq!(drain(&mut rx), vec![]);

        // The armed level goes out when the operator switches over.
        store.set_mode(ControlMode::Manual).await;
        assert_eq!(store.snapshot().await.derived_speed, 55);
        assert_eq!(drain(&mut rx), vec![DeviceCommand::Manual { speed: 55 }]);
    }

    #[tokio::test]
    async fn setting_current_level_again_produces_no_command() {
        let (store, mut rx) = test_store();
        store.set_mode(ControlMode::Manual).await;
        store.set_manual_level(40).await.unwrap();
        drain(&mut rx);

        assert!(!store.set_manual_level(40).await.unwrap());
        assert_eq!(drain(&mut rx), vec![]);
    }

    #[tokio::test]
    async fn rapid_changes_keep_command_order() {
        let (store, mut rx) = test_store();
        store.set_mode(ControlMode::Manual).await;
        drain(&mut rx);

        for level in [10, 20, 30, 20, 90] {
            store.set_manual_level(level).await.unwrap();
        }

        // No coalescing and no dedup of successive distinct changes.
        assert_eq!(
            drain(&mut rx),
            vec![
                DeviceCommand::Manual { speed: 10 },
                DeviceCommand::Manual { speed: 20 },
                DeviceCommand::Manual { speed: 30 },
                DeviceCommand::Manual { speed: 20 },
                DeviceCommand::Manual { speed: 90 },
            ]
        );
    }

    #[tokio::test]
    async fn poll_failure_is_recorded_and_cleared() {
        let (store, _rx) = test_store();

        store
            .record_poll_failure(&ControlError::network("connection refused"))
            .await;
        let health = store.health().await;
        assert_eq!(
            health.last_telemetry_error.as_deref(),
            Some("network error: connection refused")
        );

        // A later successful poll clears the status and updates state.
        store.apply_telemetry(Telemetry::new(22.0, 48.0)).await;
        assert_eq!(store.health().await.last_telemetry_error, None);
        assert!(store.snapshot().await.telemetry.is_some());
    }

    #[tokio::test]
    async fn snapshot_is_detached_from_the_store() {
        let (store, _rx) = test_store();
        store.apply_telemetry(Telemetry::new(25.0, 50.0)).await;

        let mut snapshot = store.snapshot().await;
        snapshot.manual_level = 99;
        snapshot.mode = ControlMode::Manual;

        let fresh = store.snapshot().await;
        assert_eq!(fresh.manual_level, 0);
        assert_eq!(fresh.mode, ControlMode::Auto);
    }

    #[test]
    fn mode_parses_from_wire_strings() {
        assert_eq!(ControlMode::from_str("auto").unwrap(), ControlMode::Auto);
        assert_eq!(
            ControlMode::from_str(" Manual ").unwrap(),
            ControlMode::Manual
        );
        assert!(matches!(
            ControlMode::from_str("turbo"),
            Err(ControlError::Validation(_))
        ));
    }
}
