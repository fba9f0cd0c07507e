//! Audit history: membership change events within a calendar month.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Events ──────────────────────────────────────────────────────────────────

/// Which timestamp of a membership row produced the event.
///
/// Variant order matches the report's sort order on the event column.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
  /// Derived from `created_at`.
  Added,
  /// Derived from `deleted_at`.
  Removed,
}

impl EventKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Added => "added",
      Self::Removed => "removed",
    }
  }

  pub fn parse(s: &str) -> Option<Self> {
    match s {
      "added" => Some(Self::Added),
      "removed" => Some(Self::Removed),
      _ => None,
    }
  }
}

impl fmt::Display for EventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A single line of the history report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEvent {
  pub user_id: u64,
  pub slug:    String,
  pub kind:    EventKind,
  pub at:      DateTime<Utc>,
}

// ─── Period ──────────────────────────────────────────────────────────────────

/// A calendar month in UTC, as the half-open range
/// `[first_of_month, first_of_next_month)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPeriod {
  year:  i32,
  month: u32,
  start: DateTime<Utc>,
  end:   DateTime<Utc>,
}

impl ReportPeriod {
  pub fn new(year: i32, month: u32) -> Result<Self> {
    let invalid = || Error::InvalidPeriod { year, month };
    if !(1..=12).contains(&month) {
      return Err(invalid());
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
    let next = if month == 12 {
      NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
      NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(invalid)?;

    Ok(Self {
      year,
      month,
      start: first.and_time(NaiveTime::MIN).and_utc(),
      end: next.and_time(NaiveTime::MIN).and_utc(),
    })
  }

  pub fn year(&self) -> i32 { self.year }

  pub fn month(&self) -> u32 { self.month }

  /// Inclusive lower bound.
  pub fn start(&self) -> DateTime<Utc> { self.start }

  /// Exclusive upper bound.
  pub fn end(&self) -> DateTime<Utc> { self.end }

  pub fn contains(&self, at: DateTime<Utc>) -> bool {
    self.start <= at && at < self.end
  }

  /// File name the exported report is written under.
  pub fn file_name(&self) -> String {
    format!("report_{}_{}.csv", self.year, self.month)
  }
}
