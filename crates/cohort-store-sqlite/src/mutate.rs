//! Membership mutations and segment/user registration.
//!
//! Each function runs on the connection thread. Batches open a `BEGIN
//! IMMEDIATE` transaction, so the write lock is held from resolution to
//! commit; any early return drops the transaction, which rolls it back.
//!
//! Membership stamps are read from the clock only once the write lock is
//! held, so stamp order always matches commit order.

use cohort_core::{
  clock::Clock,
  membership::{AddedMembership, Segment, Upsert, User},
};
use rusqlite::{Connection, OptionalExtension as _, Transaction, TransactionBehavior};

use crate::{
  Error, Result,
  encode::{encode_dt, encode_user_id},
  resolve,
  store::Deadline,
};

// ─── Registration ────────────────────────────────────────────────────────────

pub fn add_user(conn: &Connection, user_id: u64) -> Result<User> {
  let raw = encode_user_id(user_id)?;
  let id: Option<i64> = conn
    .query_row(
      "INSERT INTO users (user_id) VALUES (?1)
       ON CONFLICT (user_id) DO NOTHING
       RETURNING id",
      rusqlite::params![raw],
      |row| row.get(0),
    )
    .optional()?;

  let id = id.ok_or(Error::UserExists(user_id))?;
  Ok(User { id, user_id })
}

pub fn add_segment(conn: &Connection, slug: String) -> Result<Segment> {
  let id: Option<i64> = conn
    .query_row(
      "INSERT INTO segments (slug) VALUES (?1)
       ON CONFLICT (slug) DO NOTHING
       RETURNING id",
      rusqlite::params![slug],
      |row| row.get(0),
    )
    .optional()?;

  match id {
    Some(id) => Ok(Segment { id, slug }),
    None => Err(Error::SegmentExists(slug)),
  }
}

/// Delete a segment; `ON DELETE CASCADE` takes every membership row with it.
pub fn delete_segment(
  conn:     &mut Connection,
  deadline: Deadline,
  slug:     &str,
) -> Result<usize> {
  deadline.check()?;
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let memberships: i64 = tx.query_row(
    "SELECT COUNT(*) FROM user_segments
     WHERE segment_id IN (SELECT id FROM segments WHERE slug = ?1)",
    rusqlite::params![slug],
    |row| row.get(0),
  )?;
  let deleted = tx.execute(
    "DELETE FROM segments WHERE slug = ?1",
    rusqlite::params![slug],
  )?;
  if deleted == 0 {
    return Err(Error::SegmentNotFound(slug.to_owned()));
  }
  deadline.check()?;
  tx.commit()?;
  Ok(memberships as usize)
}

// ─── Memberships ─────────────────────────────────────────────────────────────

/// Enroll `user_id` into every slug in order, or into none of them.
pub fn add_memberships(
  conn:     &mut Connection,
  deadline: Deadline,
  clock:    &dyn Clock,
  user_id:  u64,
  slugs:    &[String],
) -> Result<Vec<AddedMembership>> {
  deadline.check()?;
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let now = encode_dt(clock.now());

  // Resolve everything before the first write.
  let user_key = resolve::user_key(&tx, user_id)?;
  let segment_keys = slugs
    .iter()
    .map(|slug| resolve::segment_key(&tx, slug))
    .collect::<Result<Vec<_>>>()?;

  let mut applied = Vec::with_capacity(slugs.len());
  for (slug, segment_key) in slugs.iter().zip(segment_keys) {
    deadline.check()?;
    match upsert(&tx, user_key, segment_key, &now)? {
      Upsert::Rejected => {
        return Err(Error::AlreadyMember { user_id, slug: slug.clone() });
      }
      outcome => applied.push(AddedMembership { slug: slug.clone(), outcome }),
    }
  }

  deadline.check()?;
  tx.commit()?;
  Ok(applied)
}

/// Insert a new active row, or reactivate a retired one.
///
/// An already-active pair is [`Upsert::Rejected`].
///
/// Under the immediate transaction nothing can change the row between the
/// read and the write, so the zero-row arms below only fire if `upsert` is
/// ever called outside one. They report `Rejected` instead of duplicating
/// the row or reviving one that is already active.
fn upsert(
  tx:          &Transaction<'_>,
  user_key:    i64,
  segment_key: i64,
  now:         &str,
) -> Result<Upsert> {
  let current: Option<Option<String>> = tx
    .query_row(
      "SELECT deleted_at FROM user_segments
       WHERE user_id = ?1 AND segment_id = ?2",
      rusqlite::params![user_key, segment_key],
      |row| row.get(0),
    )
    .optional()?;

  let outcome = match current {
    None => {
      let inserted = tx.execute(
        "INSERT INTO user_segments (user_id, segment_id, created_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (user_id, segment_id) DO NOTHING",
        rusqlite::params![user_key, segment_key, now],
      )?;
      if inserted == 1 { Upsert::Inserted } else { Upsert::Rejected }
    }
    Some(Some(_)) => {
      let revived = tx.execute(
        "UPDATE user_segments
         SET deleted_at = NULL, created_at = ?3
         WHERE user_id = ?1 AND segment_id = ?2 AND deleted_at IS NOT NULL",
        rusqlite::params![user_key, segment_key, now],
      )?;
      if revived == 1 { Upsert::Resurrected } else { Upsert::Rejected }
    }
    Some(None) => Upsert::Rejected,
  };
  Ok(outcome)
}

/// Retire the user's active memberships in the listed segments.
///
/// Slugs are matched inside the update predicate; unknown slugs and inactive
/// pairs match zero rows and are skipped.
pub fn remove_memberships(
  conn:     &mut Connection,
  deadline: Deadline,
  clock:    &dyn Clock,
  user_id:  u64,
  slugs:    &[String],
) -> Result<usize> {
  deadline.check()?;
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
  let user_key = resolve::user_key(&tx, user_id)?;
  let now = encode_dt(clock.now());

  let mut retired = 0;
  for slug in slugs {
    deadline.check()?;
    retired += tx.execute(
      "UPDATE user_segments
       SET deleted_at = ?3
       WHERE user_id = ?1
         AND deleted_at IS NULL
         AND segment_id IN (SELECT id FROM segments WHERE slug = ?2)",
      rusqlite::params![user_key, slug, &now],
    )?;
  }

  deadline.check()?;
  tx.commit()?;
  Ok(retired)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::schema::SCHEMA;

  fn conn_with_pair() -> (Connection, i64, i64) {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    let user = add_user(&conn, 1).unwrap();
    let segment = add_segment(&conn, "beta".into()).unwrap();
    (conn, user.id, segment.id)
  }

  #[test]
  fn upsert_walks_the_row_lifecycle() {
    let (mut conn, user, segment) = conn_with_pair();
    let tx = conn.transaction().unwrap();
    let t1 = "2024-03-01T00:00:00.000000Z";
    let t2 = "2024-03-02T00:00:00.000000Z";

    assert_eq!(upsert(&tx, user, segment, t1).unwrap(), Upsert::Inserted);
    assert_eq!(upsert(&tx, user, segment, t2).unwrap(), Upsert::Rejected);

    tx.execute(
      "UPDATE user_segments SET deleted_at = ?1",
      rusqlite::params![t2],
    )
    .unwrap();
    assert_eq!(upsert(&tx, user, segment, t2).unwrap(), Upsert::Resurrected);

    let (created, deleted): (String, Option<String>) = tx
      .query_row(
        "SELECT created_at, deleted_at FROM user_segments",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .unwrap();
    assert_eq!(created, t2);
    assert_eq!(deleted, None);
  }

  #[test]
  fn rejected_upsert_leaves_row_untouched() {
    let (mut conn, user, segment) = conn_with_pair();
    let tx = conn.transaction().unwrap();
    upsert(&tx, user, segment, "2024-03-01T00:00:00.000000Z").unwrap();
    upsert(&tx, user, segment, "2024-03-09T00:00:00.000000Z").unwrap();

    let rows: i64 = tx
      .query_row("SELECT COUNT(*) FROM user_segments", [], |row| row.get(0))
      .unwrap();
    let created: String = tx
      .query_row("SELECT created_at FROM user_segments", [], |row| row.get(0))
      .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(created, "2024-03-01T00:00:00.000000Z");
  }
}
