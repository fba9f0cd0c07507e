//! Error types for `cohort-core`.

use thiserror::Error;

/// The coarse classification every store failure maps onto.
///
/// Callers decide retry policy from the kind alone: `NotFound`, `Conflict`
/// and `Invalid` are data errors and must never be retried blindly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// A referenced user or segment does not exist.
  NotFound,
  /// A uniqueness violation, or an add of an already-active membership.
  Conflict,
  /// The arguments were rejected before any I/O happened.
  Invalid,
  /// Connectivity, transaction, decoding, or file I/O failure.
  Internal,
}

/// Implemented by every error type that crosses the store boundary.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid report period: {year}-{month:02}")]
  InvalidPeriod { year: i32, month: u32 },

  #[error("segment list must not be empty")]
  EmptySegmentList,

  #[error("user id {0} does not fit a signed 64-bit integer")]
  UserIdOutOfRange(u64),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::InvalidPeriod { .. }
      | Self::EmptySegmentList
      | Self::UserIdOutOfRange(_) => ErrorKind::Invalid,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
