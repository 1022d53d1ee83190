//! Integration tests for the backend HTTP client.
//!
//! Every test runs against an in-process fake backend and checks the exact
//! requests that reach the wire.

mod common;

use axum::http::Method;
use common::{closed_port_url, FakeBackend, TestDevice};
use domain::models::CommandKind;
use domain::services::DeviceApi;
use monitoring_agent::services::ApiClient;
use serde_json::json;
use std::time::Duration;

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_posts_device_payload() {
    let backend = FakeBackend::start().await;
    let device = TestDevice::new();
    let client = backend.client();
    let name = format!("{} {}", device.manufacturer, device.model);

    let registration = client
        .register_device(&device.expected_id(), &name, &device.model, &device.os_version)
        .await;

    assert!(registration.success);
    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[0].endpoint, "device.php");
    assert_eq!(
        requests[0].json(),
        json!({
            "device_id": device.expected_id(),
            "name": name,
            "model": device.model,
            "android_version": device.os_version,
        })
    );
}

#[tokio::test]
async fn test_register_reports_http_status() {
    let backend = FakeBackend::start().await;
    backend.set_device_status(500);

    let registration = backend
        .client()
        .register_device("device_a_b_c", "a b", "b", "1.0")
        .await;

    assert!(!registration.success);
    assert_eq!(registration.message, "HTTP 500");
    // Never retried.
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn test_register_reports_network_error() {
    let client = ApiClient::new(
        &closed_port_url().await,
        Duration::from_secs(2),
        Duration::from_secs(2),
    )
    .unwrap();

    let registration = client.register_device("d", "a b", "b", "1.0").await;

    assert!(!registration.success);
    assert!(registration.message.starts_with("Network error: "));
}

// ============================================================================
// Location upload
// ============================================================================

#[tokio::test]
async fn test_send_location_posts_json() {
    let backend = FakeBackend::start().await;

    assert!(
        backend
            .client()
            .send_location("device_x", 40.4168, -3.7038, Some(12.5))
            .await
    );

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[0].endpoint, "location.php");
    assert_eq!(
        requests[0].json(),
        json!({
            "device_id": "device_x",
            "latitude": 40.4168,
            "longitude": -3.7038,
            "accuracy": 12.5,
        })
    );
}

#[tokio::test]
async fn test_send_location_without_accuracy_sends_zero() {
    let backend = FakeBackend::start().await;

    assert!(backend.client().send_location("device_x", 1.0, 2.0, None).await);

    let body = backend.requests()[0].json();
    assert_eq!(body["accuracy"], json!(0.0));
}

#[tokio::test]
async fn test_send_location_non_success_is_false() {
    let backend = FakeBackend::start().await;
    backend.set_location_status(503);

    assert!(!backend.client().send_location("device_x", 1.0, 2.0, None).await);
    assert_eq!(backend.requests().len(), 1);
}

// ============================================================================
// Command fetch
// ============================================================================

#[tokio::test]
async fn test_fetch_commands_queries_by_device() {
    let backend = FakeBackend::start().await;
    backend.set_commands_body(
        r#"{"commands":[
            {"id": 5, "command_type": "GET_LOCATION", "device_id": "device_x"},
            {"id": 2, "command_type": "REBOOT", "device_id": "device_x"}
        ]}"#,
    );

    let commands = backend.client().fetch_commands("device_x").await;

    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].id, 5);
    assert_eq!(commands[0].kind, CommandKind::GetLocation);
    assert_eq!(commands[1].kind, CommandKind::Unknown("REBOOT".to_string()));

    let requests = backend.requests();
    assert_eq!(requests[0].method, Method::GET);
    assert_eq!(requests[0].endpoint, "command.php");
    assert_eq!(requests[0].query.as_deref(), Some("device_id=device_x"));
}

#[tokio::test]
async fn test_fetch_commands_encodes_device_id() {
    let backend = FakeBackend::start().await;

    backend.client().fetch_commands("device_Acme Corp_Box_1").await;

    assert_eq!(
        backend.requests()[0].query.as_deref(),
        Some("device_id=device_Acme+Corp_Box_1")
    );
}

#[tokio::test]
async fn test_fetch_commands_degrades_to_empty() {
    let backend = FakeBackend::start().await;
    let client = backend.client();

    for body in ["", r#"{"status":"ok"}"#, "<html>oops</html>"] {
        backend.set_commands_body(body);
        assert!(client.fetch_commands("device_x").await.is_empty(), "body: {body:?}");
    }

    backend.set_commands_body(r#"{"commands":[{"id":1,"command_type":"GET_LOCATION","device_id":"d"}]}"#);
    backend.set_commands_status(500);
    assert!(client.fetch_commands("device_x").await.is_empty());

    // One request per call, none retried.
    assert_eq!(backend.requests().len(), 4);
}

// ============================================================================
// Acknowledgement
// ============================================================================

#[tokio::test]
async fn test_acknowledge_puts_executed_status() {
    let backend = FakeBackend::start().await;

    assert!(backend.client().acknowledge_command(17).await);

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::PUT);
    assert_eq!(requests[0].endpoint, "command.php");
    assert_eq!(
        requests[0].json(),
        json!({ "command_id": 17, "status": "executed" })
    );
}

#[tokio::test]
async fn test_acknowledge_failure_is_false() {
    let backend = FakeBackend::start().await;
    backend.set_ack_status(404);

    assert!(!backend.client().acknowledge_command(17).await);
}
