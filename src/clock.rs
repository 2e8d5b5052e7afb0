//! Wall-clock source shared by the caches.
//!
//! Freshness and TTL checks read time through [`Clock`] so tests can move time
//! forward without sleeping. Timers are not driven by this clock; they use
//! `tokio::time`, which tests pause and advance instead.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// Manually advanced clock for tests.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct ManualClock {
  now: Arc<std::sync::Mutex<DateTime<Utc>>>,
}

#[cfg(test)]
impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self {
      now: Arc::new(std::sync::Mutex::new(start)),
    }
  }

  /// Move the clock forward by `delta`.
  pub fn advance(&self, delta: chrono::Duration) {
    let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
    *now += delta;
  }
}

#[cfg(test)]
impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(|e| e.into_inner())
  }
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

pub fn system() -> SharedClock {
  Arc::new(SystemClock)
}
