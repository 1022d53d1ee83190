//! Monitoring agent.
//!
//! Registers the device with the backend, tracks its location, and polls
//! for remote commands which it executes and acknowledges.

pub mod agent;
pub mod config;
pub mod error;
pub mod jobs;
pub mod services;
pub mod telemetry;

pub use agent::{Agent, AgentDeps};
pub use config::Config;
pub use error::{AgentError, ApiClientError};
