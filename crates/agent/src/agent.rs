//! Agent lifecycle.
//!
//! Wires the identity, API client, tracker, dispatcher and poll scheduler
//! together, and owns the active flag that every component consults before
//! acting on a result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use domain::models::{ConnectionTestResult, ConnectionTestTrigger, DeviceIdentity, LocationSample};
use domain::services::{
    CaptureDevice, DeviceApi, IdentityStore, Observer, PositioningSource, StatusNotifier,
    TracingObserver, UnsupportedCapture,
};
use tracing::info;

use crate::config::Config;
use crate::error::AgentError;
use crate::jobs::{CommandPollJob, Job, JobScheduler, PollOutcome};
use crate::services::api_client::ApiClient;
use crate::services::connection_test::ConnectionTester;
use crate::services::dispatcher::{CommandDispatcher, FallbackLocation};
use crate::services::identity::{DeviceIdentityProvider, FileIdentityStore, PlatformInfo};
use crate::services::positioning::build_sources;
use crate::services::tracker::LocationTracker;

/// How long `stop` waits for a running poll cycle before giving up on it.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Collaborators the agent is assembled from.
pub struct AgentDeps {
    /// Client used by the poll loop and the command handlers.
    pub api: Arc<dyn DeviceApi>,
    /// Separate client used only by the connection test.
    pub test_api: Arc<dyn DeviceApi>,
    pub identity_store: Arc<dyn IdentityStore>,
    pub platform: PlatformInfo,
    pub sources: Vec<Arc<dyn PositioningSource>>,
    pub capture: Arc<dyn CaptureDevice>,
    pub observer: Arc<dyn Observer>,
    pub status: Arc<dyn StatusNotifier>,
}

impl AgentDeps {
    /// Production collaborators described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self, AgentError> {
        let observer = Arc::new(TracingObserver);
        Ok(Self {
            api: Arc::new(ApiClient::from_config(config)?),
            test_api: Arc::new(ApiClient::from_config(config)?),
            identity_store: Arc::new(FileIdentityStore::new(&config.device.state_dir)),
            platform: PlatformInfo::detect(&config.device),
            sources: build_sources(&config.location),
            capture: Arc::new(UnsupportedCapture),
            observer: observer.clone(),
            status: observer,
        })
    }
}

/// The device agent.
pub struct Agent {
    identity: DeviceIdentity,
    tester: ConnectionTester,
    tracker: LocationTracker,
    poll_job: Arc<CommandPollJob>,
    scheduler: Mutex<Option<JobScheduler>>,
    active: Arc<AtomicBool>,
    observer: Arc<dyn Observer>,
    status: Arc<dyn StatusNotifier>,
}

impl Agent {
    /// Assembles an agent. Establishes the device identity up front.
    pub fn new(config: &Config, deps: AgentDeps) -> Result<Self, AgentError> {
        let identity =
            DeviceIdentityProvider::new(deps.identity_store, deps.platform).identity()?;

        info!(device_id = %identity.id, "Device ID: {}", identity.id);
        info!(device = %identity.display_name(), os_version = %identity.os_version, "Device info");

        let active = Arc::new(AtomicBool::new(false));
        let tracker = LocationTracker::new(
            deps.sources,
            config.update_policy(),
            Arc::clone(&deps.observer),
        );

        let fallback = FallbackLocation {
            latitude: config.location.fallback_latitude,
            longitude: config.location.fallback_longitude,
            jitter: config.location.fallback_jitter,
        };
        let dispatcher = Arc::new(CommandDispatcher::new(
            identity.id.clone(),
            Arc::clone(&deps.api),
            deps.capture,
            Arc::clone(&deps.observer),
            Arc::clone(&deps.status),
            tracker.handle(),
            fallback,
            Arc::clone(&active),
        ));

        let poll_job = Arc::new(
            CommandPollJob::new(
                identity.id.clone(),
                deps.api,
                dispatcher,
                Arc::clone(&deps.observer),
                Arc::clone(&active),
            )
            .with_timing(config.poll_interval(), config.initial_poll_delay()),
        );

        let tester = ConnectionTester::new(
            deps.test_api,
            Arc::clone(&deps.observer),
            Arc::clone(&deps.status),
        );

        Ok(Self {
            identity,
            tester,
            tracker,
            poll_job,
            scheduler: Mutex::new(None),
            active,
            observer: deps.observer,
            status: deps.status,
        })
    }

    /// Assembles an agent with the production collaborators.
    pub fn from_config(config: &Config) -> Result<Self, AgentError> {
        Self::new(config, AgentDeps::from_config(config)?)
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn latest_location(&self) -> Option<LocationSample> {
        self.tracker.latest()
    }

    /// Starts location tracking and command polling.
    ///
    /// Returns `false` if monitoring was already running.
    pub fn start_monitoring(&self) -> bool {
        if self.active.swap(true, Ordering::SeqCst) {
            return false;
        }

        info!(device_id = %self.identity.id, "Monitoring started");
        self.tracker.start();

        self.observer.say("Starting command checks...");
        let mut scheduler = JobScheduler::new();
        scheduler.register_shared(Arc::clone(&self.poll_job) as Arc<dyn Job>);
        scheduler.start();
        *self.scheduler.lock().unwrap() = Some(scheduler);

        self.observer.say(&format!(
            "Checking commands every {} seconds",
            self.poll_job.interval().as_secs()
        ));
        self.status.set_status(&format!(
            "Monitoring active | Device: {}",
            self.identity.display_name()
        ));
        true
    }

    /// Stops tracking and polling. Results that arrive afterwards are ignored.
    pub async fn stop(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }

        self.tracker.stop();
        let scheduler = self.scheduler.lock().unwrap().take();
        if let Some(scheduler) = scheduler {
            scheduler.shutdown();
            scheduler.wait_for_shutdown(SHUTDOWN_TIMEOUT).await;
        }

        self.observer.say("Monitoring service stopped");
        self.status.set_status("Monitoring stopped");
        info!(device_id = %self.identity.id, "Monitoring stopped");
    }

    /// Runs one poll cycle right away, outside the schedule.
    pub async fn poll_now(&self) -> PollOutcome {
        self.poll_job.poll().await
    }

    /// Runs the connection test. A successful probe starts monitoring.
    pub async fn test_connection(&self, trigger: ConnectionTestTrigger) -> ConnectionTestResult {
        let result = self.tester.run(&self.identity).await;
        if result.is_success() && trigger == ConnectionTestTrigger::Probe {
            self.start_monitoring();
        }
        result
    }
}
