//! Positioning subsystem abstraction.
//!
//! A positioning source (satellite receiver, network locator, ...) delivers a
//! stream of events after subscription. Sources are expected to honor the
//! update policy, but consumers may apply it again with [`UpdatePolicy::admits`].

use std::time::Duration;

use geo::{point, HaversineDistance};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::LocationSample;

/// Minimum spacing between two admitted fixes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdatePolicy {
    pub min_interval: Duration,
    pub min_displacement_m: f64,
}

impl Default for UpdatePolicy {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(30),
            min_displacement_m: 10.0,
        }
    }
}

impl UpdatePolicy {
    /// Whether `next` may replace `previous`.
    ///
    /// A fix is admitted only once both the minimum interval has elapsed and
    /// the device has moved at least the minimum displacement.
    pub fn admits(&self, previous: Option<&LocationSample>, next: &LocationSample) -> bool {
        let Some(previous) = previous else {
            return true;
        };

        let elapsed = (next.captured_at - previous.captured_at)
            .to_std()
            .unwrap_or_default();
        if elapsed < self.min_interval {
            return false;
        }

        distance_m(previous, next) >= self.min_displacement_m
    }
}

/// Great-circle distance between two samples in meters.
pub fn distance_m(a: &LocationSample, b: &LocationSample) -> f64 {
    let from = point!(x: a.longitude, y: a.latitude);
    let to = point!(x: b.longitude, y: b.latitude);
    from.haversine_distance(&to)
}

/// Event delivered by a positioning source.
#[derive(Debug, Clone, PartialEq)]
pub enum PositionEvent {
    Fix(LocationSample),
    ProviderEnabled(String),
    ProviderDisabled(String),
    StatusChanged { provider: String, status: String },
}

/// Errors raised when subscribing to a positioning source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PositioningError {
    #[error("Location permission denied: {0}")]
    PermissionDenied(String),
}

/// A positioning provider.
#[async_trait::async_trait]
pub trait PositioningSource: Send + Sync {
    /// Provider name, used as the origin of produced samples.
    fn name(&self) -> &str;

    /// Starts delivering events. The stream ends when the source stops.
    async fn subscribe(
        &self,
        policy: UpdatePolicy,
    ) -> Result<mpsc::Receiver<PositionEvent>, PositioningError>;
}

/// Source that replays a fixed list of events, or refuses to subscribe.
#[derive(Debug, Clone)]
pub struct ScriptedPositioningSource {
    name: String,
    events: Vec<PositionEvent>,
    refusal: Option<PositioningError>,
}

impl ScriptedPositioningSource {
    pub fn new(name: impl Into<String>, events: Vec<PositionEvent>) -> Self {
        Self {
            name: name.into(),
            events,
            refusal: None,
        }
    }

    /// A source whose subscription fails with a permission error.
    pub fn denied(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            refusal: Some(PositioningError::PermissionDenied(name.clone())),
            name,
            events: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
impl PositioningSource for ScriptedPositioningSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn subscribe(
        &self,
        _policy: UpdatePolicy,
    ) -> Result<mpsc::Receiver<PositionEvent>, PositioningError> {
        if let Some(refusal) = &self.refusal {
            return Err(refusal.clone());
        }

        let (tx, rx) = mpsc::channel(self.events.len().max(1));
        for event in &self.events {
            // Capacity covers every event, so this cannot fill up.
            let _ = tx.try_send(event.clone());
        }
        Ok(rx)
    }
}
