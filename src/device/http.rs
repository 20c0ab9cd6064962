//! HTTP client for the device controller endpoint.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};

use crate::{
    device::{CommandSink, DeviceCommand, TelemetrySource, protocol},
    error::{ControlError, Result},
    telemetry::Telemetry,
};

/// Client for the device controller's HTTP interface.
///
/// Implements both halves of the device link: `GET get_data` for telemetry
/// and `POST control` for commands. One instance is shared by the poller and
/// the command dispatcher.
pub struct HttpDeviceClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDeviceClient {
    /// Creates a client for the given base URL with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ControlError::network)?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

#[async_trait]
impl TelemetrySource for HttpDeviceClient {
    async fn fetch(&self) -> Result<Telemetry> {
        let response = self.client.get(self.url("get_data")).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ControlError::network(format!("get_data returned {status}")));
        }

        let body = response.text().await?;
        debug!("get_data payload: {body}");
        protocol::parse_reading(&body)
    }
}

#[async_trait]
impl CommandSink for HttpDeviceClient {
    async fn send(&self, command: DeviceCommand) -> Result<()> {
        info!("Sending control command: {command:?}");

        let response = self
            .client
            .post(self.url("control"))
            .json(&command)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ControlError::network(format!("control returned {status}")));
        }

        Ok(())
    }
}
