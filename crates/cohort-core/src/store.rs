//! The `SegmentStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `cohort-store-sqlite`).
//! Higher layers (`cohort-api`, `cohort-server`) depend on this abstraction,
//! not on any concrete backend.

use std::{future::Future, path::PathBuf};

use crate::{
  Classify,
  history::{HistoryEvent, ReportPeriod},
  membership::{AddedMembership, Membership, Segment, User},
};

/// Abstraction over a segment membership store.
///
/// Every call is self-contained: it resolves external identifiers, performs
/// its reads or writes inside one transactional boundary, and releases the
/// connection before returning. Nothing is cached between calls.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait SegmentStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Liveness ──────────────────────────────────────────────────────────

  /// Round-trip to the database without touching any table.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Users and segments ────────────────────────────────────────────────

  /// Register a user under its external id. Conflict if already present.
  fn add_user(
    &self,
    user_id: u64,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  /// Register a segment. Conflict if the slug is taken.
  fn add_segment(
    &self,
    slug: String,
  ) -> impl Future<Output = Result<Segment, Self::Error>> + Send + '_;

  /// Delete a segment together with every membership row referencing it,
  /// active or retired. NotFound if the slug never existed.
  fn delete_segment(
    &self,
    slug: String,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Membership writes ────────────────────────────────────────────────

  /// Enroll a user into every listed segment, all or nothing.
  ///
  /// The user and every slug are resolved before the first write; any
  /// unknown identifier aborts with NotFound. A pair that is already active
  /// aborts the whole batch with Conflict. Retired pairs are resurrected.
  fn add_memberships(
    &self,
    user_id: u64,
    slugs: Vec<String>,
  ) -> impl Future<Output = Result<Vec<AddedMembership>, Self::Error>> + Send + '_;

  /// Retire the user's active memberships in the listed segments, all or
  /// nothing. Returns the number of rows retired.
  ///
  /// Only the user is checked for existence. A slug that names no segment,
  /// or a pair that is not active, matches nothing and is not an error.
  fn remove_memberships(
    &self,
    user_id: u64,
    slugs: Vec<String>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Membership reads ─────────────────────────────────────────────────

  /// Slugs of the user's active memberships, sorted. NotFound if the user
  /// does not exist; empty if it has none.
  fn memberships_of_user(
    &self,
    user_id: u64,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  /// External ids of the segment's active members, sorted. NotFound if the
  /// segment does not exist.
  fn members_of_segment(
    &self,
    slug: String,
  ) -> impl Future<Output = Result<Vec<u64>, Self::Error>> + Send + '_;

  /// The raw membership row for a pair, active or retired. `None` if the
  /// pair was never linked; NotFound if either side does not exist.
  fn get_membership(
    &self,
    user_id: u64,
    slug: String,
  ) -> impl Future<Output = Result<Option<Membership>, Self::Error>> + Send + '_;

  // ── History ───────────────────────────────────────────────────────────

  /// Additions and removals stamped within `period`, ordered by
  /// (user id, slug, event kind).
  fn history(
    &self,
    period: ReportPeriod,
  ) -> impl Future<Output = Result<Vec<HistoryEvent>, Self::Error>> + Send + '_;

  /// Write [`SegmentStore::history`] for `period` as a semicolon-delimited
  /// file and return its location. Re-running regenerates the same file.
  fn export_history(
    &self,
    period: ReportPeriod,
  ) -> impl Future<Output = Result<PathBuf, Self::Error>> + Send + '_;
}
