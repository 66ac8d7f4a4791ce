//! Monotonic time source.
//!
//! Production code depends on the [`Clock`] trait rather than calling
//! `tokio::time` directly, so tests can drive ticks with a [`FakeClock`]
//! instead of racing real sleeps.

use std::time::{Duration, Instant};

/// A monotonic time source and sleep primitive.
#[async_trait::async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Sleep until the given deadline.
    async fn sleep_until(&self, deadline: Instant);
}

/// Production clock backed by `tokio::time`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline.into()).await;
    }
}

/// Test clock that never actually sleeps; `sleep_until` returns immediately.
///
/// Tests that need to assert on elapsed time advance [`FakeClock`] manually
/// and read `now()` before/after driving the supervisor loop.
#[derive(Debug, Clone)]
pub struct FakeClock {
    inner: std::sync::Arc<parking_lot::Mutex<Instant>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            inner: std::sync::Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.inner.lock();
        *guard += by;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.inner.lock()
    }

    async fn sleep_until(&self, _deadline: Instant) {
        // Tests control time explicitly via `advance`; no real suspension.
    }
}
