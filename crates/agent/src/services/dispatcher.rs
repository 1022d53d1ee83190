//! Command dispatch.
//!
//! Maps each fetched command to its handlers, runs them, then acknowledges
//! the command whatever the handlers reported. Handlers run on their own
//! tasks so a panic is contained and logged.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use domain::models::{Command, CommandKind, LocationSample};
use domain::services::{CaptureDevice, CaptureKind, CaptureOutcome, DeviceApi, Observer, StatusNotifier};
use tracing::{debug, error, info, warn};

use crate::services::tracker::LatestLocation;
use crate::telemetry::metrics::record_command_dispatched;

/// Reference point and spread for synthesized locations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub jitter: f64,
}

impl Default for FallbackLocation {
    fn default() -> Self {
        use domain::models::location::{FALLBACK_JITTER, FALLBACK_LATITUDE, FALLBACK_LONGITUDE};
        Self {
            latitude: FALLBACK_LATITUDE,
            longitude: FALLBACK_LONGITUDE,
            jitter: FALLBACK_JITTER,
        }
    }
}

/// A unit of work a command expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Location,
    Capture(CaptureKind),
}

impl Handler {
    /// Handlers for a command kind, in execution order. Unknown kinds have none.
    pub fn for_kind(kind: &CommandKind) -> Vec<Handler> {
        match kind {
            CommandKind::GetLocation => vec![Handler::Location],
            CommandKind::GetScreenshot => vec![Handler::Capture(CaptureKind::Screenshot)],
            CommandKind::GetPhoto => vec![Handler::Capture(CaptureKind::Photo)],
            CommandKind::GetAudio => vec![Handler::Capture(CaptureKind::Audio)],
            CommandKind::GetAllData => vec![
                Handler::Location,
                Handler::Capture(CaptureKind::Screenshot),
                Handler::Capture(CaptureKind::Photo),
                Handler::Capture(CaptureKind::Audio),
            ],
            CommandKind::Unknown(_) => Vec::new(),
        }
    }
}

/// What happened to a single command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handlers ran and the acknowledgement was sent.
    Acknowledged { ack_ok: bool },
    /// The same id is already being processed.
    AlreadyInFlight,
    /// The agent stopped before or during processing; nothing was acknowledged.
    Inactive,
}

/// Summary of one dispatched batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub acknowledged: usize,
    pub ack_failures: usize,
    pub skipped: usize,
}

/// Routes commands to handlers and acknowledges them.
pub struct CommandDispatcher {
    device_id: String,
    api: Arc<dyn DeviceApi>,
    capture: Arc<dyn CaptureDevice>,
    observer: Arc<dyn Observer>,
    status: Arc<dyn StatusNotifier>,
    latest: LatestLocation,
    fallback: FallbackLocation,
    active: Arc<AtomicBool>,
    in_flight: Mutex<HashSet<i64>>,
}

/// Releases a claimed command id when dropped.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<i64>>,
    id: i64,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().unwrap().remove(&self.id);
    }
}

impl CommandDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device_id: impl Into<String>,
        api: Arc<dyn DeviceApi>,
        capture: Arc<dyn CaptureDevice>,
        observer: Arc<dyn Observer>,
        status: Arc<dyn StatusNotifier>,
        latest: LatestLocation,
        fallback: FallbackLocation,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            api,
            capture,
            observer,
            status,
            latest,
            fallback,
            active,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn claim(&self, id: i64) -> Option<InFlightGuard<'_>> {
        let mut set = self.in_flight.lock().unwrap();
        if !set.insert(id) {
            return None;
        }
        Some(InFlightGuard {
            set: &self.in_flight,
            id,
        })
    }

    /// Dispatches commands one after another in server order.
    pub async fn dispatch_batch(self: &Arc<Self>, commands: Vec<Command>) -> DispatchReport {
        let mut report = DispatchReport::default();
        for command in commands {
            match self.dispatch(command).await {
                DispatchOutcome::Acknowledged { ack_ok: true } => report.acknowledged += 1,
                DispatchOutcome::Acknowledged { ack_ok: false } => report.ack_failures += 1,
                DispatchOutcome::AlreadyInFlight | DispatchOutcome::Inactive => report.skipped += 1,
            }
        }
        report
    }

    /// Runs every handler for the command, then acknowledges it.
    pub async fn dispatch(self: &Arc<Self>, command: Command) -> DispatchOutcome {
        if !self.is_active() {
            debug!(command_id = command.id, "Agent inactive, command not dispatched");
            return DispatchOutcome::Inactive;
        }

        let Some(_guard) = self.claim(command.id) else {
            warn!(command_id = command.id, "Command already in flight, skipping");
            return DispatchOutcome::AlreadyInFlight;
        };

        self.observer
            .say(&format!("   -> Processing command: {}", command.kind));
        record_command_dispatched(command.kind.metric_label());

        let handlers = Handler::for_kind(&command.kind);
        if handlers.is_empty() {
            warn!(command_id = command.id, command_type = %command.kind, "Unknown command type");
            self.observer
                .say(&format!("Unknown command type: {}", command.kind));
        } else {
            self.observer
                .say(&format!("Executing command: {}", command.kind));
        }

        for handler in handlers {
            let this = Arc::clone(self);
            let task = tokio::spawn(async move { this.run(handler).await });
            if let Err(e) = task.await {
                error!(
                    command_id = command.id,
                    handler = ?handler,
                    error = %e,
                    "Command handler panicked"
                );
            }
        }

        if !self.is_active() {
            info!(command_id = command.id, "Agent stopped, acknowledgement dropped");
            return DispatchOutcome::Inactive;
        }

        let ack_ok = self.api.acknowledge_command(command.id).await;
        if ack_ok {
            self.observer
                .say(&format!("Command {} marked as executed", command.id));
        } else {
            self.observer
                .say(&format!("Failed to mark command {}", command.id));
        }
        DispatchOutcome::Acknowledged { ack_ok }
    }

    async fn run(&self, handler: Handler) {
        match handler {
            Handler::Location => self.send_location().await,
            Handler::Capture(kind) => self.run_capture(kind).await,
        }
    }

    /// Sends the cached real fix, or a synthesized one near the fallback point.
    async fn send_location(&self) {
        if let Some(sample) = self.latest.get().filter(LocationSample::is_authoritative) {
            self.observer.say(&format!(
                "Sending REAL location: {}, {}",
                sample.latitude, sample.longitude
            ));
            let sent = self
                .api
                .send_location(&self.device_id, sample.latitude, sample.longitude, sample.accuracy)
                .await;
            if sent && self.is_active() {
                self.observer.say("Real location sent to server");
                self.status.set_status("Location sent");
            } else if !sent {
                self.observer.say("Error sending real location");
            }
            return;
        }

        self.observer.say("Real location unavailable");
        let sample = {
            let mut rng = rand::thread_rng();
            LocationSample::synthesized(
                &mut rng,
                self.fallback.latitude,
                self.fallback.longitude,
                self.fallback.jitter,
            )
        };

        self.observer.say(&format!(
            "Sending TEST location: {}, {}",
            sample.latitude, sample.longitude
        ));
        let sent = self
            .api
            .send_location(&self.device_id, sample.latitude, sample.longitude, sample.accuracy)
            .await;
        if sent && self.is_active() {
            self.observer.say("Test location sent to server");
        } else if !sent {
            self.observer.say("Error sending test location");
        }
    }

    async fn run_capture(&self, kind: CaptureKind) {
        self.observer.say(&format!("Command: capture {}", kind));
        match self.capture.capture(kind).await {
            CaptureOutcome::Completed => {
                info!(capture = %kind, "Capture completed");
                self.observer.say(&format!("Capture {} completed", kind));
            }
            CaptureOutcome::NotImplemented => {
                debug!(capture = %kind, "Capture not implemented");
                self.observer
                    .say(&format!("Capture {} is not implemented", kind));
            }
            CaptureOutcome::Failed(reason) => {
                warn!(capture = %kind, reason = %reason, "Capture failed");
                self.observer
                    .say(&format!("Capture {} failed: {}", kind, reason));
            }
        }
    }
}
