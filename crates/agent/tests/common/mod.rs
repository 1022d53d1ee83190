//! Common test utilities for integration tests.
//!
//! Provides an in-process fake of the monitoring backend, bound to an
//! ephemeral port, that records every request it receives.

// Not every helper is used by every test binary.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::Router;
use fake::faker::company::en::CompanyName;
use fake::faker::lorem::en::Word;
use fake::Fake;
use monitoring_agent::services::{ApiClient, PlatformInfo};
use monitoring_agent::Config;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A request as seen by the fake backend.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    /// Last path segment, e.g. `device.php`.
    pub endpoint: String,
    pub query: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).expect("request body is JSON")
    }
}

struct BackendState {
    requests: Mutex<Vec<RecordedRequest>>,
    device_status: AtomicU16,
    location_status: AtomicU16,
    commands_status: AtomicU16,
    ack_status: AtomicU16,
    commands_body: Mutex<String>,
}

/// Fake backend serving `device.php`, `location.php` and `command.php`.
pub struct FakeBackend {
    pub base_url: String,
    state: Arc<BackendState>,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn start() -> Self {
        let state = Arc::new(BackendState {
            requests: Mutex::new(Vec::new()),
            device_status: AtomicU16::new(200),
            location_status: AtomicU16::new(200),
            commands_status: AtomicU16::new(200),
            ack_status: AtomicU16::new(200),
            commands_body: Mutex::new(r#"{"commands":[]}"#.to_string()),
        });

        let app = Router::new().fallback(record).with_state(Arc::clone(&state));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake backend");
        let addr = listener.local_addr().expect("listener has an address");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake backend failed");
        });

        Self {
            base_url: format!("http://{}/api/", addr),
            state,
            handle,
        }
    }

    pub fn set_device_status(&self, status: u16) {
        self.state.device_status.store(status, Ordering::SeqCst);
    }

    pub fn set_location_status(&self, status: u16) {
        self.state.location_status.store(status, Ordering::SeqCst);
    }

    pub fn set_commands_status(&self, status: u16) {
        self.state.commands_status.store(status, Ordering::SeqCst);
    }

    pub fn set_ack_status(&self, status: u16) {
        self.state.ack_status.store(status, Ordering::SeqCst);
    }

    /// Raw body returned by `GET command.php`.
    pub fn set_commands_body(&self, body: &str) {
        *self.state.commands_body.lock().unwrap() = body.to_string();
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    /// `(method, endpoint)` for every request, oldest first.
    pub fn request_log(&self) -> Vec<(String, String)> {
        self.requests()
            .into_iter()
            .map(|r| (r.method.to_string(), r.endpoint))
            .collect()
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.base_url, Duration::from_secs(5), Duration::from_secs(5))
            .expect("Failed to build API client")
    }

    /// Embedded defaults pointed at this backend. The scheduled poll is
    /// pushed out so tests drive cycles with `poll_now`.
    pub fn config(&self) -> Config {
        Config::load_for_test(&[
            ("server.base_url", self.base_url.as_str()),
            ("server.connect_timeout_secs", "5"),
            ("server.read_timeout_secs", "5"),
            ("polling.initial_delay_secs", "300"),
        ])
        .expect("Failed to load test config")
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn record(
    State(state): State<Arc<BackendState>>,
    method: Method,
    uri: Uri,
    body: String,
) -> (StatusCode, String) {
    let endpoint = uri.path().rsplit('/').next().unwrap_or_default().to_string();
    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        endpoint: endpoint.clone(),
        query: uri.query().map(str::to_string),
        body,
    });

    let (status, body) = match (method, endpoint.as_str()) {
        (Method::POST, "device.php") => (&state.device_status, r#"{"success":true}"#.to_string()),
        (Method::POST, "location.php") => (&state.location_status, r#"{"success":true}"#.to_string()),
        (Method::GET, "command.php") => (
            &state.commands_status,
            state.commands_body.lock().unwrap().clone(),
        ),
        (Method::PUT, "command.php") => (&state.ack_status, r#"{"success":true}"#.to_string()),
        _ => return (StatusCode::NOT_FOUND, String::new()),
    };

    let status = StatusCode::from_u16(status.load(Ordering::SeqCst)).unwrap_or(StatusCode::OK);
    (status, body)
}

/// Port on localhost with nothing listening.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/api/", addr)
}

/// Randomized device facts.
pub struct TestDevice {
    pub manufacturer: String,
    pub model: String,
    pub os_version: String,
    pub platform_id: String,
}

impl TestDevice {
    pub fn new() -> Self {
        let manufacturer: String = CompanyName().fake();
        let model: String = Word().fake();
        Self {
            manufacturer,
            model,
            os_version: format!("{}.{}", (4..7).fake::<u8>(), (0..20).fake::<u8>()),
            platform_id: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn platform(&self) -> PlatformInfo {
        PlatformInfo {
            manufacturer: self.manufacturer.clone(),
            model: self.model.clone(),
            os_version: self.os_version.clone(),
            platform_id: Some(self.platform_id.clone()),
        }
    }

    pub fn expected_id(&self) -> String {
        format!(
            "device_{}_{}_{}",
            self.manufacturer, self.model, self.platform_id
        )
    }
}
