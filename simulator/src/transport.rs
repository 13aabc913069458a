use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::errors::{Error, Result};
use crate::telemetry::TelemetryRecord;

const URL_SCHEME: &str = "http";
const URL_PATH: &str = "/api/device/send";

/// Collector URL for a target `address:port`.
pub fn endpoint_url(address: &str, port: u16) -> String {
    format!("{}://{}:{}{}", URL_SCHEME, address, port, URL_PATH)
}

/// Delivers one record to a collector.
///
/// Implementations own their retry and timeout policy; devices only see
/// success or failure and never retry within a tick.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, device_id: u32, url: &str, record: &TelemetryRecord) -> Result<()>;
}

/// Posts records as JSON over HTTP; any non-2xx response is a failure.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, device_id: u32, url: &str, record: &TelemetryRecord) -> Result<()> {
        let response = self.client.post(url).json(record).send().await?;

        let status = response.status();
        if status.is_success() {
            debug!(device_id, %status, "record delivered");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::Transport(format!(
            "collector returned {} for device {}: {}",
            status, device_id, body
        )))
    }
}

/// Serialises records and logs them instead of sending.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunTransport;

#[async_trait]
impl Transport for DryRunTransport {
    async fn send(&self, device_id: u32, url: &str, record: &TelemetryRecord) -> Result<()> {
        let payload = serde_json::to_string(record)?;
        debug!(device_id, url, %payload, "dry run, record not sent");
        Ok(())
    }
}
