//! Shared utilities for the monitoring agent.
//!
//! This crate provides small, dependency-light helpers used by the other crates:
//! - Coordinate and tuning-value validation
//! - Timestamped log-line formatting for observer output

pub mod log_line;
pub mod validation;
