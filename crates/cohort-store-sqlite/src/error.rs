//! Error type for `cohort-store-sqlite`.

use cohort_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] cohort_core::Error),

  /// The connection thread is gone or rejected the call.
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  /// A statement failed on the connection thread.
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("decode error: {0}")]
  Decode(String),

  #[error("user '{0}' doesn't exist")]
  UserNotFound(u64),

  #[error("segment '{0}' doesn't exist")]
  SegmentNotFound(String),

  #[error("user '{0}' already exists")]
  UserExists(u64),

  #[error("segment '{0}' already exists")]
  SegmentExists(String),

  #[error("user '{user_id}' is already in segment '{slug}'")]
  AlreadyMember { user_id: u64, slug: String },

  /// The per-operation deadline passed; the transaction was rolled back.
  #[error("deadline exceeded during {0}")]
  DeadlineExceeded(&'static str),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Core(e) => e.kind(),
      Self::UserNotFound(_) | Self::SegmentNotFound(_) => ErrorKind::NotFound,
      Self::UserExists(_)
      | Self::SegmentExists(_)
      | Self::AlreadyMember { .. } => ErrorKind::Conflict,
      Self::Sqlite(e)
        if e.sqlite_error_code()
          == Some(rusqlite::ErrorCode::ConstraintViolation) =>
      {
        ErrorKind::Conflict
      }
      Self::Database(_)
      | Self::Sqlite(_)
      | Self::Io(_)
      | Self::Decode(_)
      | Self::DeadlineExceeded(_) => ErrorKind::Internal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
