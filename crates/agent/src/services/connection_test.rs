//! Connection test sequencer.
//!
//! Drives the connection test state machine against a dedicated API client:
//! register, send a test location, fetch commands. Stops at the first
//! failure and never retries.

use std::sync::Arc;

use domain::models::location::{FALLBACK_LATITUDE, FALLBACK_LONGITUDE, SYNTHETIC_ACCURACY_M};
use domain::models::{ConnectionTestResult, ConnectionTestStage, DeviceIdentity, StageOutcome};
use domain::services::{DeviceApi, Observer, StatusNotifier};
use tracing::{info, warn};

/// Runs the three-step backend verification.
pub struct ConnectionTester {
    api: Arc<dyn DeviceApi>,
    observer: Arc<dyn Observer>,
    status: Arc<dyn StatusNotifier>,
}

impl ConnectionTester {
    pub fn new(
        api: Arc<dyn DeviceApi>,
        observer: Arc<dyn Observer>,
        status: Arc<dyn StatusNotifier>,
    ) -> Self {
        Self {
            api,
            observer,
            status,
        }
    }

    /// Runs the test to completion and returns its terminal result.
    pub async fn run(&self, identity: &DeviceIdentity) -> ConnectionTestResult {
        self.observer.say("Testing connection to server...");
        self.status.set_status("Testing connection...");

        let mut stage = ConnectionTestStage::Idle.next(StageOutcome::Start);
        loop {
            if let Some(result) = stage.result() {
                info!(device_id = %identity.id, result = ?result, "Connection test finished");
                return result;
            }
            let outcome = self.perform(stage, identity).await;
            stage = stage.next(outcome);
        }
    }

    /// Executes the work of one stage and reports its outcome.
    async fn perform(&self, stage: ConnectionTestStage, identity: &DeviceIdentity) -> StageOutcome {
        match stage {
            ConnectionTestStage::Idle => StageOutcome::Start,
            ConnectionTestStage::Registering => {
                self.observer.say("Testing device registration...");
                let registration = self
                    .api
                    .register_device(
                        &identity.id,
                        &identity.display_name(),
                        &identity.model,
                        &identity.os_version,
                    )
                    .await;

                if registration.success {
                    self.observer.say(&format!(
                        "Device registration: SUCCESS - {}",
                        registration.message
                    ));
                    StageOutcome::Ok
                } else {
                    warn!(message = %registration.message, "Connection test: registration failed");
                    self.observer.say(&format!(
                        "Device registration: ERROR - {}",
                        registration.message
                    ));
                    self.observer.say("Connection to server not established");
                    self.status.set_status("Connection error");
                    StageOutcome::Failed
                }
            }
            ConnectionTestStage::SendingTestLocation => {
                self.observer.say("Testing location API...");
                let sent = self
                    .api
                    .send_location(
                        &identity.id,
                        FALLBACK_LATITUDE,
                        FALLBACK_LONGITUDE,
                        Some(SYNTHETIC_ACCURACY_M),
                    )
                    .await;

                if sent {
                    self.observer.say("Location API: SUCCESS - data sent");
                    StageOutcome::Ok
                } else {
                    warn!("Connection test: location upload failed");
                    self.observer.say("Location API: ERROR - failed to send");
                    self.observer.say(
                        "Partial connection: registration works, but location does not",
                    );
                    self.status.set_status("Partial connection");
                    StageOutcome::Failed
                }
            }
            ConnectionTestStage::FetchingCommands => {
                self.observer.say("Testing commands API...");
                let commands = self.api.fetch_commands(&identity.id).await;
                if commands.is_empty() {
                    self.observer.say("Commands API: SUCCESS - no commands (normal)");
                } else {
                    self.observer.say(&format!(
                        "Commands API: SUCCESS - received {} commands",
                        commands.len()
                    ));
                }
                self.observer
                    .say("ALL TESTS PASSED - connection to server established");
                self.status.set_status("Connection established");
                StageOutcome::Fetched(commands.len())
            }
            ConnectionTestStage::Succeeded { .. } | ConnectionTestStage::Failed(_) => {
                StageOutcome::Ok
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{Command, CommandKind, ConnectionTestFailure, FailedStep};
    use domain::services::{ApiCall, MockDeviceApi, RecordingObserver};

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            id: "device_Acme_Box_1".to_string(),
            manufacturer: "Acme".to_string(),
            model: "Box".to_string(),
            os_version: "6.1".to_string(),
        }
    }

    fn tester(api: &Arc<MockDeviceApi>, observer: &Arc<RecordingObserver>) -> ConnectionTester {
        ConnectionTester::new(api.clone(), observer.clone(), observer.clone())
    }

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let api = Arc::new(MockDeviceApi::new().with_commands(vec![Command {
            id: 1,
            kind: CommandKind::GetLocation,
            device_id: "device_Acme_Box_1".into(),
        }]));
        let observer = Arc::new(RecordingObserver::new());

        let result = tester(&api, &observer).run(&identity()).await;

        assert_eq!(result, ConnectionTestResult::Success { commands: 1 });
        let calls = api.calls();
        assert_eq!(
            calls[0],
            ApiCall::Register {
                device_id: "device_Acme_Box_1".into(),
                name: "Acme Box".into(),
                model: "Box".into(),
                os_version: "6.1".into(),
            }
        );
        assert_eq!(
            calls[1],
            ApiCall::SendLocation {
                device_id: "device_Acme_Box_1".into(),
                latitude: 55.7558,
                longitude: 37.6173,
                accuracy: Some(50.0),
            }
        );
        assert!(matches!(calls[2], ApiCall::FetchCommands { .. }));
        assert_eq!(calls.len(), 3);
        // Fetched commands are only counted, never executed or acknowledged.
        assert!(api.acknowledged().is_empty());
        assert_eq!(
            observer.statuses(),
            vec!["Testing connection...", "Connection established"]
        );
    }

    #[tokio::test]
    async fn test_registration_failure_stops_the_test() {
        let api = Arc::new(MockDeviceApi::new().with_registration_failure("HTTP 500"));
        let observer = Arc::new(RecordingObserver::new());

        let result = tester(&api, &observer).run(&identity()).await;

        assert_eq!(
            result,
            ConnectionTestResult::Failed(ConnectionTestFailure {
                step: FailedStep::Registration,
                partial: false,
            })
        );
        assert_eq!(api.register_calls(), 1);
        assert_eq!(api.location_calls(), 0);
        assert_eq!(api.fetch_calls(), 0);
        assert!(observer.saw("Device registration: ERROR - HTTP 500"));
        assert_eq!(observer.last_status().as_deref(), Some("Connection error"));
    }

    #[tokio::test]
    async fn test_location_failure_is_partial() {
        let api = Arc::new(MockDeviceApi::new().with_location_failure());
        let observer = Arc::new(RecordingObserver::new());

        let result = tester(&api, &observer).run(&identity()).await;

        assert_eq!(
            result,
            ConnectionTestResult::Failed(ConnectionTestFailure {
                step: FailedStep::Location,
                partial: true,
            })
        );
        assert_eq!(api.register_calls(), 1);
        assert_eq!(api.location_calls(), 1);
        assert_eq!(api.fetch_calls(), 0);
        assert_eq!(observer.last_status().as_deref(), Some("Partial connection"));
    }

    #[tokio::test]
    async fn test_empty_fetch_is_success() {
        let api = Arc::new(MockDeviceApi::new());
        let observer = Arc::new(RecordingObserver::new());

        let result = tester(&api, &observer).run(&identity()).await;

        assert_eq!(result, ConnectionTestResult::Success { commands: 0 });
        assert!(observer.saw("no commands (normal)"));
    }
}
