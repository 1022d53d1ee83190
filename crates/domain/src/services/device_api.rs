//! Backend API abstraction.
//!
//! Every operation completes exactly once and never fails to the caller:
//! transport, HTTP and decoding problems all degrade to a negative result.

use std::sync::Mutex;

use crate::models::{Command, Registration};

/// Operations the agent performs against the backend.
#[async_trait::async_trait]
pub trait DeviceApi: Send + Sync {
    /// Registers (or re-registers) the device.
    async fn register_device(
        &self,
        device_id: &str,
        name: &str,
        model: &str,
        os_version: &str,
    ) -> Registration;

    /// Reports a location. Returns `true` on a 2xx response.
    async fn send_location(
        &self,
        device_id: &str,
        latitude: f64,
        longitude: f64,
        accuracy: Option<f32>,
    ) -> bool;

    /// Fetches pending commands in server order. Empty on any failure.
    async fn fetch_commands(&self, device_id: &str) -> Vec<Command>;

    /// Marks a command as executed. Returns `true` on a 2xx response.
    async fn acknowledge_command(&self, command_id: i64) -> bool;
}

/// A call observed by [`MockDeviceApi`].
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    Register {
        device_id: String,
        name: String,
        model: String,
        os_version: String,
    },
    SendLocation {
        device_id: String,
        latitude: f64,
        longitude: f64,
        accuracy: Option<f32>,
    },
    FetchCommands {
        device_id: String,
    },
    Acknowledge {
        command_id: i64,
    },
}

#[derive(Debug)]
struct MockState {
    registration: Registration,
    location_ok: bool,
    commands: Vec<Command>,
    ack_ok: bool,
    calls: Vec<ApiCall>,
}

/// In-memory backend for development and testing.
///
/// Succeeds by default with no pending commands; each result can be
/// overridden. Every call is recorded in order.
#[derive(Debug)]
pub struct MockDeviceApi {
    state: Mutex<MockState>,
}

impl Default for MockDeviceApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDeviceApi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                registration: Registration::registered(),
                location_ok: true,
                commands: Vec::new(),
                ack_ok: true,
                calls: Vec::new(),
            }),
        }
    }

    pub fn with_registration_failure(self, message: &str) -> Self {
        self.state.lock().unwrap().registration = Registration::failed(message);
        self
    }

    pub fn with_location_failure(self) -> Self {
        self.state.lock().unwrap().location_ok = false;
        self
    }

    pub fn with_ack_failure(self) -> Self {
        self.state.lock().unwrap().ack_ok = false;
        self
    }

    /// Commands returned by every fetch.
    pub fn with_commands(self, commands: Vec<Command>) -> Self {
        self.state.lock().unwrap().commands = commands;
        self
    }

    /// All calls so far, oldest first.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn register_calls(&self) -> usize {
        self.count(|c| matches!(c, ApiCall::Register { .. }))
    }

    pub fn location_calls(&self) -> usize {
        self.count(|c| matches!(c, ApiCall::SendLocation { .. }))
    }

    pub fn fetch_calls(&self) -> usize {
        self.count(|c| matches!(c, ApiCall::FetchCommands { .. }))
    }

    /// Ids passed to `acknowledge_command`, in call order.
    pub fn acknowledged(&self) -> Vec<i64> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|c| match c {
                ApiCall::Acknowledge { command_id } => Some(*command_id),
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| predicate(c))
            .count()
    }
}

#[async_trait::async_trait]
impl DeviceApi for MockDeviceApi {
    async fn register_device(
        &self,
        device_id: &str,
        name: &str,
        model: &str,
        os_version: &str,
    ) -> Registration {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ApiCall::Register {
            device_id: device_id.to_string(),
            name: name.to_string(),
            model: model.to_string(),
            os_version: os_version.to_string(),
        });
        state.registration.clone()
    }

    async fn send_location(
        &self,
        device_id: &str,
        latitude: f64,
        longitude: f64,
        accuracy: Option<f32>,
    ) -> bool {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ApiCall::SendLocation {
            device_id: device_id.to_string(),
            latitude,
            longitude,
            accuracy,
        });
        state.location_ok
    }

    async fn fetch_commands(&self, device_id: &str) -> Vec<Command> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ApiCall::FetchCommands {
            device_id: device_id.to_string(),
        });
        state.commands.clone()
    }

    async fn acknowledge_command(&self, command_id: i64) -> bool {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ApiCall::Acknowledge { command_id });
        state.ack_ok
    }
}
