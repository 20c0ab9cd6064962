//! Device link: trait seams and the HTTP client implementation.
//!
//! The device controller is the source of truth for actuation; this client
//! only reads telemetry and issues commands through the two traits below.

pub mod http;
pub mod protocol;

pub use http::HttpDeviceClient;
pub use protocol::DeviceCommand;

use async_trait::async_trait;

use crate::{error::Result, telemetry::Telemetry};

/// Fetches the current sensor reading from the device, one request per call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn fetch(&self) -> Result<Telemetry>;
}

/// Sends a single control command to the device.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandSink: Send + Sync {
    async fn send(&self, command: DeviceCommand) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ControlError;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn telemetry_source_is_object_safe() {
        let mut mock = MockTelemetrySource::new();
        mock.expect_fetch()
            .returning(|| Ok(Telemetry::new(25.0, 50.0)));

        let source: Box<dyn TelemetrySource> = Box::new(mock);
        let reading = source.fetch().await.unwrap();
        assert_eq!(reading.temperature_c, 25.0);
    }

    #[tokio::test]
    async fn command_sink_propagates_errors() {
        let mut mock = MockCommandSink::new();
        mock.expect_send()
            .returning(|_| Err(ControlError::network("connection refused")));

        let sink: Box<dyn CommandSink> = Box::new(mock);
        let err = sink.send(DeviceCommand::Auto).await.unwrap_err();
        assert!(matches!(err, ControlError::Network(_)));
    }
}
