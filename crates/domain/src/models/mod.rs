//! Domain models for the monitoring agent.

pub mod command;
pub mod device;
pub mod location;

pub use command::{Command, CommandAck, CommandBatch, CommandKind};
pub use connection_test::{
    ConnectionTestFailure, ConnectionTestResult, ConnectionTestStage, ConnectionTestTrigger,
    FailedStep, StageOutcome,
};
pub use device::{DeviceIdentity, RegisterDeviceRequest, Registration};
pub use location::{LocationOrigin, LocationReport, LocationSample};
