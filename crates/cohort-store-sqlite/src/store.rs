//! [`SqliteStore`], the SQLite implementation of [`SegmentStore`].

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::{Duration, Instant},
};

use cohort_core::{
  clock::{Clock, SystemClock},
  history::{HistoryEvent, ReportPeriod},
  membership::{AddedMembership, Membership, Segment, User, non_empty},
  store::SegmentStore,
};

use crate::{Error, Result, mutate, read, report, schema::SCHEMA};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Runtime knobs for a [`SqliteStore`].
#[derive(Clone)]
pub struct StoreOptions {
  /// Directory exported history reports are written into.
  pub report_dir: PathBuf,
  /// Upper bound on a single operation, measured from submission. Checked
  /// on the connection thread before each statement of a batch and before
  /// commit.
  pub op_timeout: Option<Duration>,
  /// Source of `created_at` / `deleted_at` stamps.
  pub clock:      Arc<dyn Clock>,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      report_dir: PathBuf::from("reports"),
      op_timeout: None,
      clock:      Arc::new(SystemClock::new()),
    }
  }
}

// ─── Deadline ────────────────────────────────────────────────────────────────

/// An operation's deadline, carried onto the connection thread.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
  at: Option<Instant>,
  op: &'static str,
}

impl Deadline {
  pub(crate) fn check(&self) -> Result<()> {
    match self.at {
      Some(at) if Instant::now() >= at => Err(Error::DeadlineExceeded(self.op)),
      _ => Ok(()),
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A segment store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn:       tokio_rusqlite::Connection,
  report_dir:            Arc<PathBuf>,
  pub(crate) op_timeout: Option<Duration>,
  clock:                 Arc<dyn Clock>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, options).await
  }

  /// Open an in-memory store for testing.
  pub async fn open_in_memory(options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, options).await
  }

  async fn init(conn: tokio_rusqlite::Connection, options: StoreOptions) -> Result<Self> {
    let store = Self {
      conn,
      report_dir: Arc::new(options.report_dir),
      op_timeout: options.op_timeout,
      clock: options.clock,
    };
    store.run("init schema", |conn, _| Ok(conn.execute_batch(SCHEMA)?)).await?;
    Ok(store)
  }

  /// Directory exported reports land in.
  pub fn report_dir(&self) -> &Path { &self.report_dir }

  /// Submit `f` to the connection thread with a fresh deadline.
  ///
  /// The deadline starts when the call is submitted, so time spent queued
  /// behind other calls counts against it. Domain failures travel back inside the closure's result, so only a
  /// dead connection thread surfaces as [`Error::Database`].
  async fn run<T, F>(&self, op: &'static str, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection, Deadline) -> Result<T> + Send + 'static,
  {
    let deadline = Deadline {
      at: self.op_timeout.map(|t| Instant::now() + t),
      op,
    };
    self.conn.call(move |conn| Ok(f(conn, deadline))).await?
  }
}

// ─── SegmentStore impl ───────────────────────────────────────────────────────

impl SegmentStore for SqliteStore {
  type Error = Error;

  async fn ping(&self) -> Result<()> {
    self
      .run("ping", |conn, deadline| {
        deadline.check()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
      })
      .await
  }

  // ── Users and segments ────────────────────────────────────────────────────

  async fn add_user(&self, user_id: u64) -> Result<User> {
    let user = self
      .run("add user", move |conn, deadline| {
        deadline.check()?;
        mutate::add_user(conn, user_id)
      })
      .await?;
    tracing::debug!(user_id, id = user.id, "user added");
    Ok(user)
  }

  async fn add_segment(&self, slug: String) -> Result<Segment> {
    let segment = self
      .run("add segment", move |conn, deadline| {
        deadline.check()?;
        mutate::add_segment(conn, slug)
      })
      .await?;
    tracing::debug!(slug = %segment.slug, id = segment.id, "segment added");
    Ok(segment)
  }

  async fn delete_segment(&self, slug: String) -> Result<()> {
    let slug_for_log = slug.clone();
    let dropped = self
      .run("delete segment", move |conn, deadline| {
        mutate::delete_segment(conn, deadline, &slug)
      })
      .await?;
    tracing::debug!(slug = %slug_for_log, memberships = dropped, "segment deleted");
    Ok(())
  }

  // ── Membership writes ────────────────────────────────────────────────────

  async fn add_memberships(
    &self,
    user_id: u64,
    slugs:   Vec<String>,
  ) -> Result<Vec<AddedMembership>> {
    non_empty(&slugs)?;
    let clock = self.clock.clone();

    let applied = self
      .run("add memberships", move |conn, deadline| {
        mutate::add_memberships(conn, deadline, clock.as_ref(), user_id, &slugs)
      })
      .await?;

    tracing::debug!(user_id, segments = applied.len(), "memberships added");
    Ok(applied)
  }

  async fn remove_memberships(&self, user_id: u64, slugs: Vec<String>) -> Result<usize> {
    non_empty(&slugs)?;
    let clock = self.clock.clone();
    let requested = slugs.len();

    let retired = self
      .run("remove memberships", move |conn, deadline| {
        mutate::remove_memberships(conn, deadline, clock.as_ref(), user_id, &slugs)
      })
      .await?;

    tracing::debug!(user_id, requested, retired, "memberships removed");
    Ok(retired)
  }

  // ── Membership reads ─────────────────────────────────────────────────────

  async fn memberships_of_user(&self, user_id: u64) -> Result<Vec<String>> {
    self
      .run("memberships of user", move |conn, deadline| {
        deadline.check()?;
        read::memberships_of_user(conn, user_id)
      })
      .await
  }

  async fn members_of_segment(&self, slug: String) -> Result<Vec<u64>> {
    self
      .run("members of segment", move |conn, deadline| {
        deadline.check()?;
        read::members_of_segment(conn, &slug)
      })
      .await
  }

  async fn get_membership(&self, user_id: u64, slug: String) -> Result<Option<Membership>> {
    self
      .run("get membership", move |conn, deadline| {
        deadline.check()?;
        read::get_membership(conn, user_id, &slug)
      })
      .await
  }

  // ── History ───────────────────────────────────────────────────────────────

  async fn history(&self, period: ReportPeriod) -> Result<Vec<HistoryEvent>> {
    self
      .run("history", move |conn, deadline| {
        deadline.check()?;
        report::history(conn, &period)
      })
      .await
  }

  async fn export_history(&self, period: ReportPeriod) -> Result<PathBuf> {
    let events = self.history(period).await?;
    let path = report::write(&self.report_dir, &period, &events).await?;
    tracing::info!(
      path = %path.display(),
      records = events.len(),
      "history report exported"
    );
    Ok(path)
  }
}
