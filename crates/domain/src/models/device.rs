//! Device identity domain model.

use serde::{Deserialize, Serialize};

/// Stable identity of the physical device running the agent.
///
/// Created once by the identity provider and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub id: String,
    pub manufacturer: String,
    pub model: String,
    pub os_version: String,
}

impl DeviceIdentity {
    /// Builds the identifier from the platform's stable id.
    ///
    /// Format: `device_{manufacturer}_{model}_{platform_id}`.
    pub fn derive_id(manufacturer: &str, model: &str, platform_id: &str) -> String {
        format!("device_{}_{}_{}", manufacturer, model, platform_id)
    }

    /// Human-readable name sent on registration.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.manufacturer, self.model)
    }
}

/// Request payload for `POST device.php`.
///
/// The backend names the OS version field `android_version` regardless of platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDeviceRequest {
    pub device_id: String,
    pub name: String,
    pub model: String,
    pub android_version: String,
}

/// Outcome of a registration attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub success: bool,
    pub message: String,
}

impl Registration {
    pub fn registered() -> Self {
        Self {
            success: true,
            message: "Device registered".to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> DeviceIdentity {
        DeviceIdentity {
            id: DeviceIdentity::derive_id("Lenovo", "ThinkPad X1", "4f2a9c"),
            manufacturer: "Lenovo".to_string(),
            model: "ThinkPad X1".to_string(),
            os_version: "6.8.0".to_string(),
        }
    }

    #[test]
    fn test_derive_id_format() {
        assert_eq!(
            DeviceIdentity::derive_id("Google", "Pixel 7", "abc123"),
            "device_Google_Pixel 7_abc123"
        );
    }

    #[test]
    fn test_display_name() {
        assert_eq!(identity().display_name(), "Lenovo ThinkPad X1");
    }

    #[test]
    fn test_registration_request_serialization() {
        let identity = identity();
        let request = RegisterDeviceRequest {
            device_id: identity.id.clone(),
            name: identity.display_name(),
            model: identity.model.clone(),
            android_version: identity.os_version.clone(),
        };
        let json = serde_json::to_value(request).unwrap();
        assert_eq!(json["device_id"], "device_Lenovo_ThinkPad X1_4f2a9c");
        assert_eq!(json["name"], "Lenovo ThinkPad X1");
        assert_eq!(json["model"], "ThinkPad X1");
        assert_eq!(json["android_version"], "6.8.0");
    }

    #[test]
    fn test_registration_constructors() {
        assert!(Registration::registered().success);
        let failed = Registration::failed("HTTP 500");
        assert!(!failed.success);
        assert_eq!(failed.message, "HTTP 500");
    }
}
