//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings with microsecond
//! precision, so string comparison in SQL agrees with chronological order.
//! External user ids are stored as signed 64-bit integers.

use chrono::{DateTime, SecondsFormat, Utc};
use cohort_core::{
  history::{EventKind, HistoryEvent},
  membership::{Membership, storable_user_id},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

// ─── User ids ────────────────────────────────────────────────────────────────

pub fn encode_user_id(user_id: u64) -> Result<i64> {
  Ok(storable_user_id(user_id)?)
}

pub fn decode_user_id(raw: i64) -> Result<u64> {
  u64::try_from(raw).map_err(|_| Error::Decode(format!("negative user id {raw}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read from a `user_segments` row joined with its user and
/// segment.
pub struct RawMembership {
  pub user_id:    i64,
  pub slug:       String,
  pub created_at: String,
  pub deleted_at: Option<String>,
}

impl RawMembership {
  pub fn into_membership(self) -> Result<Membership> {
    Ok(Membership {
      user_id:    decode_user_id(self.user_id)?,
      slug:       self.slug,
      created_at: decode_dt(&self.created_at)?,
      deleted_at: self.deleted_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw values read from one arm of the history union.
pub struct RawHistoryEvent {
  pub user_id: i64,
  pub slug:    String,
  pub kind:    String,
  pub at:      String,
}

impl RawHistoryEvent {
  pub fn into_event(self) -> Result<HistoryEvent> {
    let kind = EventKind::parse(&self.kind)
      .ok_or_else(|| Error::Decode(format!("unknown event kind: {:?}", self.kind)))?;
    Ok(HistoryEvent {
      user_id: decode_user_id(self.user_id)?,
      slug: self.slug,
      kind,
      at: decode_dt(&self.at)?,
    })
  }
}
