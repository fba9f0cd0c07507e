//! Users, segments, and the temporal join between them.
//!
//! A membership row is never physically removed while its segment exists.
//! Removal stamps `deleted_at`; re-adding clears it and bumps `created_at`, so
//! the row always carries its most recent activation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Entities ────────────────────────────────────────────────────────────────

/// A user known to the store, keyed externally by a caller-supplied id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  /// Surrogate key assigned by the store.
  pub id:      i64,
  /// The natural key supplied by the caller; immutable and unique.
  pub user_id: u64,
}

/// A named cohort users can be enrolled into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
  /// Surrogate key assigned by the store.
  pub id:   i64,
  /// The natural key; immutable and unique.
  pub slug: String,
}

/// One user↔segment link, active or retired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
  pub user_id:    u64,
  pub slug:       String,
  /// Time of the latest activation.
  pub created_at: DateTime<Utc>,
  /// `None` while the membership is active.
  pub deleted_at: Option<DateTime<Utc>>,
}

impl Membership {
  pub fn is_active(&self) -> bool { self.deleted_at.is_none() }
}

// ─── Mutation outcomes ───────────────────────────────────────────────────────

/// Result of upserting a single (user, segment) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Upsert {
  /// No row existed; a new active row was written.
  Inserted,
  /// A retired row was reactivated and its `created_at` refreshed.
  Resurrected,
  /// The pair is already active. Aborts the whole batch.
  Rejected,
}

/// One applied step of a successful add batch, in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedMembership {
  pub slug:    String,
  pub outcome: Upsert,
}

// ─── Argument checks ─────────────────────────────────────────────────────────

/// Reject an empty batch before any I/O happens.
pub fn non_empty(slugs: &[String]) -> crate::Result<()> {
  if slugs.is_empty() {
    return Err(crate::Error::EmptySegmentList);
  }
  Ok(())
}

/// Convert an external user id to the signed column type used by the store.
pub fn storable_user_id(user_id: u64) -> crate::Result<i64> {
  i64::try_from(user_id).map_err(|_| crate::Error::UserIdOutOfRange(user_id))
}
