//! Domain models for the task tracker
//!
//! Contains the task record and the time source, without any storage concerns.

mod clock;
mod task;

pub use clock::{Clock, FixedClock, SystemClock};
pub use task::Task;
