//! Collaborator interfaces consumed by the agent core.
//!
//! Each trait ships with a small in-process implementation usable in tests
//! and on hosts that lack the real platform facility.

pub mod capture;
pub mod device_api;
pub mod identity;
pub mod observer;
pub mod positioning;

pub use capture::{CaptureDevice, CaptureKind, CaptureOutcome, UnsupportedCapture};
pub use device_api::{ApiCall, DeviceApi, MockDeviceApi};
pub use identity::{IdentityError, IdentityStore, InMemoryIdentityStore};
pub use observer::{
    BroadcastObserver, LogEntry, Observer, RecordingObserver, StatusNotifier, TracingObserver,
};
pub use positioning::{
    distance_m, PositionEvent, PositioningError, PositioningSource, ScriptedPositioningSource,
    UpdatePolicy,
};
