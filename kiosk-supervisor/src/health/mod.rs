//! Health Tracker (spec §4.3): consecutive-failure/success counting,
//! failure-mode hysteresis, and backoff of the polling interval.

mod tracker;

pub use tracker::{HealthTransition, HealthTracker, HealthView};
