//! Location tracking.
//!
//! One task per positioning source feeds a shared latest-location slot.
//! The slot is last-write-wins across sources; the update policy is applied
//! per source against that source's own previous fix.

use std::sync::{Arc, Mutex, RwLock};

use domain::models::LocationSample;
use domain::services::{Observer, PositionEvent, PositioningError, PositioningSource, UpdatePolicy};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use validator::Validate;

use crate::telemetry::metrics::record_location_fix;

/// Shared handle to the most recent admitted fix.
#[derive(Debug, Clone, Default)]
pub struct LatestLocation(Arc<RwLock<Option<LocationSample>>>);

impl LatestLocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<LocationSample> {
        self.0.read().unwrap().clone()
    }

    pub fn set(&self, sample: LocationSample) {
        *self.0.write().unwrap() = Some(sample);
    }
}

/// Subscribes to positioning sources and caches the latest fix.
pub struct LocationTracker {
    sources: Vec<Arc<dyn PositioningSource>>,
    policy: UpdatePolicy,
    latest: LatestLocation,
    observer: Arc<dyn Observer>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl LocationTracker {
    pub fn new(
        sources: Vec<Arc<dyn PositioningSource>>,
        policy: UpdatePolicy,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            sources,
            policy,
            latest: LatestLocation::new(),
            observer,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Handle to the latest-location slot, for readers such as the dispatcher.
    pub fn handle(&self) -> LatestLocation {
        self.latest.clone()
    }

    pub fn latest(&self) -> Option<LocationSample> {
        self.latest.get()
    }

    pub fn is_running(&self) -> bool {
        !self.tasks.lock().unwrap().is_empty()
    }

    /// Starts one task per source. Does nothing if already running.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        if !tasks.is_empty() {
            return;
        }

        self.observer.say("Starting location tracking...");
        if self.sources.is_empty() {
            warn!("No positioning sources configured");
            self.observer.say("No positioning sources configured");
        }

        for source in &self.sources {
            let source = Arc::clone(source);
            let policy = self.policy;
            let latest = self.latest.clone();
            let observer = Arc::clone(&self.observer);
            tasks.push(tokio::spawn(track_source(source, policy, latest, observer)));
        }

        info!(
            sources = self.sources.len(),
            min_interval_secs = self.policy.min_interval.as_secs(),
            min_displacement_m = self.policy.min_displacement_m,
            "Location tracking started"
        );
    }

    /// Cancels every source subscription. The cached fix is kept.
    pub fn stop(&self) {
        let tasks: Vec<_> = self.tasks.lock().unwrap().drain(..).collect();
        if tasks.is_empty() {
            return;
        }
        for task in tasks {
            task.abort();
        }
        self.observer.say("Location tracking stopped");
        info!("Location tracking stopped");
    }
}

impl Drop for LocationTracker {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

async fn track_source(
    source: Arc<dyn PositioningSource>,
    policy: UpdatePolicy,
    latest: LatestLocation,
    observer: Arc<dyn Observer>,
) {
    let name = source.name().to_string();

    let mut events = match source.subscribe(policy).await {
        Ok(events) => events,
        Err(PositioningError::PermissionDenied(detail)) => {
            warn!(source = %name, detail = %detail, "Location permission denied");
            observer.say(&format!("ERROR: No permission to access location ({})", name));
            return;
        }
    };

    debug!(source = %name, "Positioning source subscribed");
    let mut last_admitted: Option<LocationSample> = None;

    while let Some(event) = events.recv().await {
        match event {
            PositionEvent::Fix(sample) => {
                if let Err(e) = sample.validate() {
                    warn!(source = %name, error = %e, "Discarding invalid fix");
                    continue;
                }
                if !policy.admits(last_admitted.as_ref(), &sample) {
                    debug!(source = %name, "Fix below update policy thresholds");
                    continue;
                }

                debug!(
                    source = %name,
                    latitude = sample.latitude,
                    longitude = sample.longitude,
                    "Location fix received"
                );
                observer.say(&format!(
                    "GPS: {}, {} (accuracy: {}m)",
                    sample.latitude,
                    sample.longitude,
                    sample.accuracy.unwrap_or(0.0)
                ));
                record_location_fix(sample.source_name());
                latest.set(sample.clone());
                last_admitted = Some(sample);
            }
            PositionEvent::ProviderEnabled(provider) => {
                info!(source = %name, provider = %provider, "Provider enabled");
                observer.say(&format!("GPS enabled: {}", provider));
            }
            PositionEvent::ProviderDisabled(provider) => {
                warn!(source = %name, provider = %provider, "Provider disabled");
                observer.say(&format!("GPS disabled: {}", provider));
            }
            PositionEvent::StatusChanged { provider, status } => {
                info!(source = %name, provider = %provider, status = %status, "Provider status changed");
                observer.say(&format!("GPS status: {} - {}", provider, status));
            }
        }
    }

    debug!(source = %name, "Positioning source ended");
}
