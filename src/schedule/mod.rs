//! Schedule module - minute-keyed task buckets and the periodic sweep
//!
//! [`Schedule`] stores tasks the model planned for later, keyed by
//! [`ScheduleKey`]. [`ScheduleEngine`] wakes up on a fixed interval, hands due
//! tasks to the model and delivers its reply to the owner.

pub mod engine;
mod types;

pub use engine::{ScheduleEngine, SweepOutcome};
pub use types::{RemoveError, Schedule, ScheduleKey, UpdateError};
