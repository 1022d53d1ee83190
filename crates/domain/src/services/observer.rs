//! Observer and status sinks.
//!
//! The agent reports human-readable progress to an observer and a short
//! status line to a notifier. Both are one-way: implementations must return
//! promptly and never fail back into the caller.

use std::sync::Mutex;

use chrono::{DateTime, Local, Utc};
use tokio::sync::{broadcast, watch};

/// A single timestamped progress message.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn now(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    /// Renders the entry as `[HH:MM:SS] message` in local time.
    pub fn line(&self) -> String {
        shared::log_line::format_line(&self.timestamp.with_timezone(&Local), &self.message)
    }
}

/// Receives progress messages. Fire-and-forget.
pub trait Observer: Send + Sync {
    fn report(&self, entry: LogEntry);

    /// Convenience for reporting a message stamped now.
    fn say(&self, message: &str) {
        self.report(LogEntry::now(message));
    }
}

/// Receives the one-line status text (the foreground notification in a UI shell).
pub trait StatusNotifier: Send + Sync {
    fn set_status(&self, text: &str);
}

/// Observer that forwards everything to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn report(&self, entry: LogEntry) {
        tracing::info!(target: "observer", timestamp = %entry.timestamp, "{}", entry.message);
    }
}

impl StatusNotifier for TracingObserver {
    fn set_status(&self, text: &str) {
        tracing::info!(target: "status", status = %text, "Status updated");
    }
}

/// Observer that fans messages out to any number of live subscribers.
///
/// Subscribers that fall behind lose the oldest messages; the agent never
/// waits for them. The latest status is kept for late subscribers.
#[derive(Debug)]
pub struct BroadcastObserver {
    entries: broadcast::Sender<LogEntry>,
    status: watch::Sender<String>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (entries, _) = broadcast::channel(capacity.max(1));
        let (status, _) = watch::channel(String::new());
        Self { entries, status }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.entries.subscribe()
    }

    pub fn watch_status(&self) -> watch::Receiver<String> {
        self.status.subscribe()
    }
}

impl Observer for BroadcastObserver {
    fn report(&self, entry: LogEntry) {
        // No subscribers is not an error.
        let _ = self.entries.send(entry);
    }
}

impl StatusNotifier for BroadcastObserver {
    fn set_status(&self, text: &str) {
        self.status.send_replace(text.to_string());
    }
}

/// Observer that keeps every message in memory, for tests and diagnostics.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    entries: Mutex<Vec<LogEntry>>,
    statuses: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// All reported messages, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    /// All status texts, oldest first.
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }

    /// Whether any reported message contains `needle`.
    pub fn saw(&self, needle: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.message.contains(needle))
    }

    pub fn last_status(&self) -> Option<String> {
        self.statuses.lock().unwrap().last().cloned()
    }
}

impl Observer for RecordingObserver {
    fn report(&self, entry: LogEntry) {
        self.entries.lock().unwrap().push(entry);
    }
}

impl StatusNotifier for RecordingObserver {
    fn set_status(&self, text: &str) {
        self.statuses.lock().unwrap().push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_entry_line_has_clock_prefix() {
        let entry = LogEntry::now("Received 2 commands");
        let line = entry.line();
        assert!(line.starts_with('['));
        assert_eq!(&line[9..], "] Received 2 commands");
    }

    #[test]
    fn test_recording_observer_keeps_order() {
        let observer = RecordingObserver::new();
        observer.say("first");
        observer.say("second");
        observer.set_status("Connection established");

        assert_eq!(observer.messages(), vec!["first", "second"]);
        assert!(observer.saw("sec"));
        assert!(!observer.saw("third"));
        assert_eq!(
            observer.last_status().as_deref(),
            Some("Connection established")
        );
    }

    #[tokio::test]
    async fn test_broadcast_observer_fans_out() {
        let observer = BroadcastObserver::new(8);
        let mut first = observer.subscribe();
        let mut second = observer.subscribe();
        let status = observer.watch_status();

        observer.say("No commands found");
        observer.set_status("Location sent");

        assert_eq!(first.recv().await.unwrap().message, "No commands found");
        assert_eq!(second.recv().await.unwrap().message, "No commands found");
        assert_eq!(*status.borrow(), "Location sent");
    }

    #[test]
    fn test_broadcast_observer_without_subscribers() {
        let observer = BroadcastObserver::new(1);
        observer.say("dropped");
        observer.set_status("kept");
        assert_eq!(*observer.watch_status().borrow(), "kept");
    }

    #[test]
    fn test_tracing_observer_does_not_panic_without_subscriber() {
        let observer = TracingObserver;
        observer.say("hello");
        observer.set_status("idle");
    }
}
