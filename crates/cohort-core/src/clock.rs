//! Time source for `created_at` / `deleted_at` stamps.
//!
//! The store never calls `Utc::now()` directly; it asks its [`Clock`]. This
//! keeps audit timestamps strictly ordered and lets tests pin them to fixed
//! dates.

use std::sync::{
  Mutex,
  atomic::{AtomicI64, Ordering},
};

use chrono::{DateTime, TimeDelta, Utc};

pub trait Clock: Send + Sync + 'static {
  fn now(&self) -> DateTime<Utc>;
}

// ─── SystemClock ─────────────────────────────────────────────────────────────

/// Wall-clock time, made strictly monotonic at microsecond resolution.
///
/// Two calls never return the same instant, and a backwards step of the
/// system clock is absorbed by continuing from the last value handed out.
#[derive(Debug, Default)]
pub struct SystemClock {
  last_micros: AtomicI64,
}

impl SystemClock {
  pub fn new() -> Self { Self::default() }
}

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    let wall = Utc::now().timestamp_micros();
    let mut prev = self.last_micros.load(Ordering::Relaxed);
    loop {
      let next = wall.max(prev + 1);
      match self.last_micros.compare_exchange_weak(
        prev,
        next,
        Ordering::AcqRel,
        Ordering::Relaxed,
      ) {
        Ok(_) => {
          return DateTime::from_timestamp_micros(next).unwrap_or_else(Utc::now);
        }
        Err(actual) => prev = actual,
      }
    }
  }
}

// ─── ManualClock ─────────────────────────────────────────────────────────────

/// A clock that only moves when told to. Used by tests and report fixtures.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self { Self { now: Mutex::new(start) } }

  pub fn set(&self, at: DateTime<Utc>) {
    *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
  }

  pub fn advance(&self, by: TimeDelta) {
    let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
    *now += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap_or_else(|e| e.into_inner())
  }
}
