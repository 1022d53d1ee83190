//! Agent services.

pub mod api_client;
pub mod connection_test;
pub mod dispatcher;
pub mod identity;
pub mod positioning;
pub mod tracker;

pub use api_client::ApiClient;
pub use connection_test::ConnectionTester;
pub use dispatcher::{CommandDispatcher, DispatchOutcome, DispatchReport, FallbackLocation};
pub use identity::{DeviceIdentityProvider, FileIdentityStore, PlatformInfo};
pub use tracker::{LatestLocation, LocationTracker};
