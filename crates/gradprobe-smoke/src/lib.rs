//! Smoke driver for the gradprobe autodiff engine.
//!
//! Runs two fixed scenarios against the thread-local graph and prints what
//! it sees: the `relu(x * y) + y` probe, and a walk/serialize/restore replay.

pub mod config;
pub mod error;
pub mod scenario;

pub use config::SmokeConfig;
pub use error::SmokeError;
pub use scenario::{ReluAddReport, ReplayReport, relu_add, run, saved_replay};
