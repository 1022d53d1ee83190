//! HTTP client for the monitoring backend.
//!
//! Implements the `DeviceApi` trait over four PHP endpoints. Each operation
//! sends exactly one request and never retries. Failures are logged and
//! counted, then degraded to the negative result the trait defines.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use domain::models::{
    Command, CommandAck, CommandBatch, LocationReport, RegisterDeviceRequest, Registration,
};
use domain::services::DeviceApi;
use reqwest::{Client, Response, Url};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AgentError, ApiClientError};
use crate::telemetry::metrics::{record_api_request, record_parse_error};

const DEVICE_ENDPOINT: &str = "device.php";
const LOCATION_ENDPOINT: &str = "location.php";
const COMMAND_ENDPOINT: &str = "command.php";

/// Resolved endpoint URLs.
#[derive(Debug, Clone)]
struct Endpoints {
    device: Url,
    location: Url,
    command: Url,
}

impl Endpoints {
    fn resolve(base_url: &str) -> Result<Self, AgentError> {
        let invalid = |reason: String| AgentError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };

        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base = Url::parse(&normalized).map_err(|e| invalid(e.to_string()))?;
        if base.cannot_be_a_base() {
            return Err(invalid("URL cannot be a base".to_string()));
        }

        let join = |endpoint: &str| base.join(endpoint).map_err(|e| invalid(e.to_string()));
        Ok(Self {
            device: join(DEVICE_ENDPOINT)?,
            location: join(LOCATION_ENDPOINT)?,
            command: join(COMMAND_ENDPOINT)?,
        })
    }
}

/// Backend client over `reqwest`.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    endpoints: Endpoints,
}

impl ApiClient {
    /// Create a client for the given base URL.
    pub fn new(
        base_url: &str,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<Self, AgentError> {
        let endpoints = Endpoints::resolve(base_url)?;

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .user_agent(concat!("monitoring-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(AgentError::HttpClient)?;

        Ok(Self { client, endpoints })
    }

    pub fn from_config(config: &Config) -> Result<Self, AgentError> {
        Self::new(
            &config.api_base_url(),
            config.connect_timeout(),
            config.read_timeout(),
        )
    }

    /// `POST device.php`.
    pub async fn try_register(&self, request: &RegisterDeviceRequest) -> Result<(), ApiClientError> {
        let response = self
            .client
            .post(self.endpoints.device.clone())
            .json(request)
            .send()
            .await?;
        ensure_success(response).map(|_| ())
    }

    /// `POST location.php`.
    pub async fn try_send_location(&self, report: &LocationReport) -> Result<(), ApiClientError> {
        let response = self
            .client
            .post(self.endpoints.location.clone())
            .json(report)
            .send()
            .await?;
        ensure_success(response).map(|_| ())
    }

    /// `GET command.php?device_id=...`.
    pub async fn try_fetch_commands(&self, device_id: &str) -> Result<Vec<Command>, ApiClientError> {
        let response = self
            .client
            .get(self.endpoints.command.clone())
            .query(&[("device_id", device_id)])
            .send()
            .await?;
        let response = ensure_success(response)?;
        let body = response.text().await?;
        decode_commands(&body)
    }

    /// `PUT command.php`.
    pub async fn try_acknowledge(&self, ack: &CommandAck) -> Result<(), ApiClientError> {
        let response = self
            .client
            .put(self.endpoints.command.clone())
            .json(ack)
            .send()
            .await?;
        ensure_success(response).map(|_| ())
    }
}

fn ensure_success(response: Response) -> Result<Response, ApiClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiClientError::Http {
            status: status.as_u16(),
        })
    }
}

/// Decodes a `command.php` body. A blank body means no commands.
pub fn decode_commands(body: &str) -> Result<Vec<Command>, ApiClientError> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<CommandBatch>(body)
        .map(|batch| batch.commands)
        .map_err(|e| ApiClientError::Parse(e.to_string()))
}

/// Logs and counts the outcome of one operation.
fn observe<T>(operation: &'static str, started: Instant, result: &Result<T, ApiClientError>) {
    let elapsed = started.elapsed();
    match result {
        Ok(_) => {
            record_api_request(operation, "success", elapsed.as_secs_f64());
            debug!(
                operation,
                elapsed_ms = elapsed.as_millis() as u64,
                "Backend request succeeded"
            );
        }
        Err(e) => {
            record_api_request(operation, e.kind(), elapsed.as_secs_f64());
            if matches!(e, ApiClientError::Parse(_)) {
                record_parse_error(operation);
            }
            warn!(
                operation,
                error_kind = e.kind(),
                error = %e,
                elapsed_ms = elapsed.as_millis() as u64,
                "Backend request failed"
            );
        }
    }
}

#[async_trait]
impl DeviceApi for ApiClient {
    async fn register_device(
        &self,
        device_id: &str,
        name: &str,
        model: &str,
        os_version: &str,
    ) -> Registration {
        let request = RegisterDeviceRequest {
            device_id: device_id.to_string(),
            name: name.to_string(),
            model: model.to_string(),
            android_version: os_version.to_string(),
        };

        let started = Instant::now();
        let result = self.try_register(&request).await;
        observe("register_device", started, &result);

        match result {
            Ok(()) => {
                info!(device_id = %device_id, "Device registered");
                Registration::registered()
            }
            Err(e) => Registration::failed(e.to_string()),
        }
    }

    async fn send_location(
        &self,
        device_id: &str,
        latitude: f64,
        longitude: f64,
        accuracy: Option<f32>,
    ) -> bool {
        let report = LocationReport::new(device_id, latitude, longitude, accuracy);

        let started = Instant::now();
        let result = self.try_send_location(&report).await;
        observe("send_location", started, &result);

        result.is_ok()
    }

    async fn fetch_commands(&self, device_id: &str) -> Vec<Command> {
        let started = Instant::now();
        let result = self.try_fetch_commands(device_id).await;
        observe("fetch_commands", started, &result);

        result.unwrap_or_default()
    }

    async fn acknowledge_command(&self, command_id: i64) -> bool {
        let ack = CommandAck::executed(command_id);

        let started = Instant::now();
        let result = self.try_acknowledge(&ack).await;
        observe("acknowledge_command", started, &result);

        result.is_ok()
    }
}
