//! Location domain model.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Reference point used when no real fix is available.
pub const FALLBACK_LATITUDE: f64 = 55.7558;
pub const FALLBACK_LONGITUDE: f64 = 37.6173;

/// Total width of the random jitter around the fallback point, in degrees.
pub const FALLBACK_JITTER: f64 = 0.001;

/// Accuracy reported for synthesized and test locations, in meters.
pub const SYNTHETIC_ACCURACY_M: f32 = 50.0;

/// Where a location sample came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum LocationOrigin {
    /// A real fix from a named positioning provider (e.g. `gps`, `network`).
    Provider(String),
    /// Generated near the fallback point; not authoritative.
    Synthesized,
}

/// A single positioning reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    #[validate(custom(function = "shared::validation::validate_latitude"))]
    pub latitude: f64,

    #[validate(custom(function = "shared::validation::validate_longitude"))]
    pub longitude: f64,

    /// Horizontal accuracy radius in meters, when the provider reports one.
    #[validate(custom(function = "crate::models::location::validate_optional_accuracy"))]
    pub accuracy: Option<f32>,

    pub captured_at: DateTime<Utc>,

    pub origin: LocationOrigin,
}

impl LocationSample {
    /// Creates a real fix from a provider.
    pub fn from_provider(
        provider: impl Into<String>,
        latitude: f64,
        longitude: f64,
        accuracy: Option<f32>,
    ) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            captured_at: Utc::now(),
            origin: LocationOrigin::Provider(provider.into()),
        }
    }

    /// Synthesizes a sample within `jitter / 2` degrees of the given point on each axis.
    pub fn synthesized<R: Rng + ?Sized>(
        rng: &mut R,
        center_latitude: f64,
        center_longitude: f64,
        jitter: f64,
    ) -> Self {
        let latitude = center_latitude + (rng.gen::<f64>() - 0.5) * jitter;
        let longitude = center_longitude + (rng.gen::<f64>() - 0.5) * jitter;
        Self {
            latitude,
            longitude,
            accuracy: Some(SYNTHETIC_ACCURACY_M),
            captured_at: Utc::now(),
            origin: LocationOrigin::Synthesized,
        }
    }

    /// Whether this sample came from a real positioning provider.
    pub fn is_authoritative(&self) -> bool {
        matches!(self.origin, LocationOrigin::Provider(_))
    }

    /// Name of the provider, or `synthesized`.
    pub fn source_name(&self) -> &str {
        match &self.origin {
            LocationOrigin::Provider(name) => name,
            LocationOrigin::Synthesized => "synthesized",
        }
    }
}

/// Validates optional accuracy.
pub fn validate_optional_accuracy(accuracy: f32) -> Result<(), validator::ValidationError> {
    shared::validation::validate_accuracy(f64::from(accuracy))
}

/// Request payload for `POST location.php`.
///
/// An unknown accuracy is reported as `0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationReport {
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f32,
}

impl LocationReport {
    pub fn new(device_id: &str, latitude: f64, longitude: f64, accuracy: Option<f32>) -> Self {
        Self {
            device_id: device_id.to_string(),
            latitude,
            longitude,
            accuracy: accuracy.unwrap_or(0.0),
        }
    }
}
