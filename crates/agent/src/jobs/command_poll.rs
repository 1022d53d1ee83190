//! Recurring command poll.
//!
//! Fetches pending commands and hands them to the dispatcher. Only one cycle
//! runs at a time: a tick that finds the previous cycle still running is
//! skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use domain::services::{DeviceApi, Observer};
use tracing::{debug, info, warn};

use super::scheduler::{Job, JobFrequency};
use crate::services::dispatcher::{CommandDispatcher, DispatchReport};
use crate::telemetry::metrics::record_poll_skipped;

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Commands were fetched (possibly none) and dispatched.
    Polled { fetched: usize, report: DispatchReport },
    /// The previous cycle was still running.
    Skipped,
    /// The agent is not monitoring, or stopped while the fetch was running.
    Inactive,
}

/// Clears the in-flight flag when the cycle ends, however it ends.
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Job that polls the backend for commands.
pub struct CommandPollJob {
    device_id: String,
    api: Arc<dyn DeviceApi>,
    dispatcher: Arc<CommandDispatcher>,
    observer: Arc<dyn Observer>,
    active: Arc<AtomicBool>,
    in_flight: AtomicBool,
    interval: Duration,
    initial_delay: Duration,
}

impl CommandPollJob {
    pub fn new(
        device_id: impl Into<String>,
        api: Arc<dyn DeviceApi>,
        dispatcher: Arc<CommandDispatcher>,
        observer: Arc<dyn Observer>,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            api,
            dispatcher,
            observer,
            active,
            in_flight: AtomicBool::new(false),
            interval: Duration::from_secs(60),
            initial_delay: Duration::from_secs(5),
        }
    }

    /// Overrides the poll interval and the delay before the first poll.
    pub fn with_timing(mut self, interval: Duration, initial_delay: Duration) -> Self {
        self.interval = interval;
        self.initial_delay = initial_delay;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Runs one fetch-dispatch cycle.
    pub async fn poll(&self) -> PollOutcome {
        if !self.active.load(Ordering::SeqCst) {
            return PollOutcome::Inactive;
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            record_poll_skipped();
            warn!(device_id = %self.device_id, "Previous command check still running, skipping");
            return PollOutcome::Skipped;
        }
        let _guard = CycleGuard(&self.in_flight);

        self.observer.say("Checking for commands from server...");
        let commands = self.api.fetch_commands(&self.device_id).await;

        if !self.active.load(Ordering::SeqCst) {
            debug!(fetched = commands.len(), "Agent stopped during fetch, ignoring result");
            return PollOutcome::Inactive;
        }

        let fetched = commands.len();
        if fetched == 0 {
            self.observer.say("No commands found");
            return PollOutcome::Polled {
                fetched,
                report: DispatchReport::default(),
            };
        }

        self.observer.say(&format!("Received {} commands", fetched));
        info!(device_id = %self.device_id, fetched, "Commands received");

        let report = self.dispatcher.dispatch_batch(commands).await;
        debug!(
            acknowledged = report.acknowledged,
            ack_failures = report.ack_failures,
            skipped = report.skipped,
            "Command batch dispatched"
        );
        PollOutcome::Polled { fetched, report }
    }
}

#[async_trait::async_trait]
impl Job for CommandPollJob {
    fn name(&self) -> &'static str {
        "command_poll"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval.as_secs().max(1))
    }

    fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    async fn execute(&self) -> Result<(), String> {
        self.poll().await;
        Ok(())
    }
}
