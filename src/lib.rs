//! # smartfand
//!
//! A client for the smart room-cooling controller: polls the device for
//! temperature/humidity telemetry, derives a recommended fan speed, and lets
//! an operator switch between automatic and manual control.
//!
//! ## Features
//!
//! - **Async Architecture**: Built on Tokio, one logical thread of mutation
//! - **Control-State Store**: Single owner of mode, telemetry and fan speed
//! - **Automatic Mode**: Temperature mapped onto fan tiers via a
//!   configurable threshold table
//! - **Ordered Dispatch**: Operator commands reach the device in issue
//!   order, never coalesced or deduplicated
//! - **Resilient Polling**: Failed polls are surfaced as link status and
//!   never stop the cadence
//!
//! ## Architecture
//!
//! - [`ControlStateStore`](store::ControlStateStore) - State owner and
//!   reconciliation rules
//! - [`TelemetryPoller`](poller::TelemetryPoller) - Cadence-driven polling
//!   with a cancel-safe lifecycle
//! - [`CommandDispatcher`](dispatch::CommandDispatcher) - Sequential
//!   fire-and-forget command queue
//! - [`EventBus`](event::EventBus) - Status notifications for
//!   presenter-facing consumers
//!
//! ## Example
//!
//! ```no_run
//! use smartfand::{application::Application, config::Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     Application::builder()
//!         .with_config(config)
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

pub mod application;
pub mod cli;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod fan_tiers;
pub mod poller;
pub mod store;
pub mod telemetry;
