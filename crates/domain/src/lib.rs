//! Domain layer for the monitoring agent.
//!
//! This crate contains:
//! - Domain models (DeviceIdentity, LocationSample, Command, connection test stages)
//! - Wire payloads exchanged with the backend
//! - Collaborator traits (identity store, positioning, capture, observer)

pub mod models;
pub mod services;
