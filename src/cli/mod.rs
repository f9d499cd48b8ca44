//! Command-line layer: argument parsing, telemetry bootstrap, and the
//! actions the binary can execute.

pub mod actions;
pub mod commands;
pub mod dispatch;
pub mod start;
pub mod telemetry;

pub use start::start;
