//! Recurring job scheduler and job implementations.

mod command_poll;
mod scheduler;

pub use command_poll::{CommandPollJob, PollOutcome};
pub use scheduler::{Job, JobFrequency, JobScheduler};
