//! Time source for admission decisions.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// A clock that only moves when told to. Millisecond resolution.
#[derive(Debug)]
pub struct ManualClock {
  millis: AtomicI64,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self { millis: AtomicI64::new(start.timestamp_millis()) }
  }

  pub fn set(&self, at: DateTime<Utc>) {
    self.millis.store(at.timestamp_millis(), Ordering::SeqCst);
  }

  pub fn advance(&self, by: TimeDelta) {
    self.millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    let millis = self.millis.load(Ordering::SeqCst);
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
  }
}
