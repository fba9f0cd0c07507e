//! Point-in-time membership reads.
//!
//! Each read resolves its key first and then runs inside one deferred
//! transaction, so the existence check and the row scan see the same
//! snapshot.

use cohort_core::membership::Membership;
use rusqlite::{Connection, OptionalExtension as _};

use crate::{
  Result,
  encode::{RawMembership, decode_user_id},
  resolve,
};

pub fn memberships_of_user(conn: &mut Connection, user_id: u64) -> Result<Vec<String>> {
  let tx = conn.transaction()?;
  let user_key = resolve::user_key(&tx, user_id)?;

  let slugs = {
    let mut stmt = tx.prepare(
      "SELECT s.slug
       FROM user_segments us
       JOIN segments s ON s.id = us.segment_id
       WHERE us.user_id = ?1 AND us.deleted_at IS NULL
       ORDER BY s.slug",
    )?;
    let slugs = stmt
      .query_map(rusqlite::params![user_key], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
    slugs
  };

  tx.commit()?;
  Ok(slugs)
}

pub fn members_of_segment(conn: &mut Connection, slug: &str) -> Result<Vec<u64>> {
  let tx = conn.transaction()?;
  let segment_key = resolve::segment_key(&tx, slug)?;

  let raws = {
    let mut stmt = tx.prepare(
      "SELECT u.user_id
       FROM user_segments us
       JOIN users u ON u.id = us.user_id
       WHERE us.segment_id = ?1 AND us.deleted_at IS NULL
       ORDER BY u.user_id",
    )?;
    let raws = stmt
      .query_map(rusqlite::params![segment_key], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<i64>>>()?;
    raws
  };

  tx.commit()?;
  raws.into_iter().map(decode_user_id).collect()
}

pub fn get_membership(
  conn:    &mut Connection,
  user_id: u64,
  slug:    &str,
) -> Result<Option<Membership>> {
  let tx = conn.transaction()?;
  let user_key = resolve::user_key(&tx, user_id)?;
  let segment_key = resolve::segment_key(&tx, slug)?;

  let raw = tx
    .query_row(
      "SELECT u.user_id, s.slug, us.created_at, us.deleted_at
       FROM user_segments us
       JOIN users u    ON u.id = us.user_id
       JOIN segments s ON s.id = us.segment_id
       WHERE us.user_id = ?1 AND us.segment_id = ?2",
      rusqlite::params![user_key, segment_key],
      |row| {
        Ok(RawMembership {
          user_id:    row.get(0)?,
          slug:       row.get(1)?,
          created_at: row.get(2)?,
          deleted_at: row.get(3)?,
        })
      },
    )
    .optional()?;

  tx.commit()?;
  raw.map(RawMembership::into_membership).transpose()
}
