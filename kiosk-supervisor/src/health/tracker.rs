//! The health tracker is pure given the outcome stream: it never fails
//! (spec §4.3 "Failure model"). Internal counters are guarded by a
//! `parking_lot::Mutex` rather than atomics because every update touches
//! several fields together and must be applied as one unit, the same
//! all-or-nothing update discipline the teacher's `CircuitBreaker` uses in
//! `downloader/resilience.rs`.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::api::ApiOutcome;
use crate::config::Config;

/// Transition emitted by [`HealthTracker::on_outcome`], at most once per
/// streak (spec §4.3 "Ordering and tie-breaks").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    /// No failure-mode boundary was crossed this tick.
    None,
    /// `consecutive_failures` just reached the failure threshold.
    EnteredFailure,
    /// `consecutive_successes` just reached the stability threshold.
    Recovered,
}

#[derive(Debug, Clone)]
struct Inner {
    consecutive_failures: u32,
    consecutive_successes: u32,
    in_failure_mode: bool,
    last_error_label: Option<&'static str>,
    last_success_at: Option<Instant>,
    total_requests: u64,
    total_errors: u64,
    current_interval: Duration,
    /// True for the one tick on which `in_failure_mode` just flipped to
    /// true; `next_interval` must not double the backoff on that same tick
    /// (spec's scenario 3: the interval first doubles on the tick *after*
    /// failure mode is entered).
    entered_failure_this_tick: bool,
    /// True for the one tick on which a `Recovered` transition just fired;
    /// `next_interval` reports `min_retry` on that tick instead of falling
    /// back to the nominal poll interval (spec's scenario 4).
    recovered_this_tick: bool,
    /// True for a tick whose outcome was non-`Ok`. Backoff only doubles on
    /// "each additional failure inside failure mode" (spec §4.3); an `Ok`
    /// tick that stays in failure mode pending recovery (partial recovery,
    /// below `stability_threshold`) must not also double the interval.
    failure_this_tick: bool,
}

/// A read-only snapshot of the health tracker's state (spec §3 "Health
/// state"). Cheap to clone; taken by the metrics collector and the display
/// controller without holding the tracker's lock.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthView {
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub in_failure_mode: bool,
    pub last_error_label: Option<&'static str>,
    pub last_success_at: Option<Instant>,
    pub total_requests: u64,
    pub total_errors: u64,
    pub current_interval: Duration,
}

/// Consumes the per-tick [`ApiOutcome`] stream and maintains failure/success
/// run-lengths, failure-mode hysteresis, and the backoff interval.
pub struct HealthTracker {
    failure_threshold: u32,
    stability_threshold: u32,
    min_retry: Duration,
    max_retry: Duration,
    poll_interval: Duration,
    backoff_enabled: bool,
    inner: Mutex<Inner>,
}

impl HealthTracker {
    pub fn new(config: &Config) -> Self {
        Self {
            failure_threshold: config.failure_threshold,
            stability_threshold: config.stability_threshold,
            min_retry: config.min_retry,
            max_retry: config.max_retry,
            poll_interval: config.poll_interval,
            backoff_enabled: config.enable_backoff,
            inner: Mutex::new(Inner {
                consecutive_failures: 0,
                consecutive_successes: 0,
                in_failure_mode: false,
                last_error_label: None,
                last_success_at: None,
                total_requests: 0,
                total_errors: 0,
                current_interval: config.poll_interval,
                entered_failure_this_tick: false,
                recovered_this_tick: false,
                failure_this_tick: false,
            }),
        }
    }

    /// Update counters from one tick's outcome (spec §4.3 `on_outcome`).
    pub fn on_outcome(&self, outcome: &ApiOutcome) -> HealthTransition {
        let mut state = self.inner.lock();
        state.total_requests += 1;

        if outcome.is_ok() {
            state.consecutive_failures = 0;
            state.consecutive_successes += 1;
            state.last_success_at = Some(Instant::now());
            state.entered_failure_this_tick = false;
            state.recovered_this_tick = false;
            state.failure_this_tick = false;

            if state.in_failure_mode && state.consecutive_successes >= self.stability_threshold {
                state.in_failure_mode = false;
                state.current_interval = self.min_retry;
                state.recovered_this_tick = true;
                return HealthTransition::Recovered;
            }
            return HealthTransition::None;
        }

        state.consecutive_successes = 0;
        state.consecutive_failures += 1;
        state.total_errors += 1;
        state.last_error_label = outcome.error_label();
        state.recovered_this_tick = false;
        state.failure_this_tick = true;

        if !state.in_failure_mode && state.consecutive_failures >= self.failure_threshold {
            state.in_failure_mode = true;
            state.entered_failure_this_tick = true;
            return HealthTransition::EnteredFailure;
        }

        state.entered_failure_this_tick = false;
        HealthTransition::None
    }

    /// Compute the interval to wait before the next poll (spec §4.3
    /// `next_interval`). Must be called after [`Self::on_outcome`] for the
    /// same tick, and reads/updates `current_interval` in place.
    pub fn next_interval(&self) -> Duration {
        let mut state = self.inner.lock();

        if state.in_failure_mode {
            if self.backoff_enabled && state.failure_this_tick && !state.entered_failure_this_tick {
                let doubled = state.current_interval.saturating_mul(2);
                state.current_interval = doubled.min(self.max_retry).max(self.min_retry);
            }
            // On the entry tick, on an `Ok` tick during partial recovery,
            // or with backoff disabled, the interval is left as-is.
        } else if state.recovered_this_tick {
            // Already set to min_retry by on_outcome; leave it.
        } else {
            state.current_interval = self.poll_interval;
        }

        state.current_interval
    }

    /// Take a read-only snapshot of the current state.
    pub fn snapshot(&self) -> HealthView {
        let state = self.inner.lock();
        HealthView {
            consecutive_failures: state.consecutive_failures,
            consecutive_successes: state.consecutive_successes,
            in_failure_mode: state.in_failure_mode,
            last_error_label: state.last_error_label,
            last_success_at: state.last_success_at,
            total_requests: state.total_requests,
            total_errors: state.total_errors,
            current_interval: state.current_interval,
        }
    }
}
