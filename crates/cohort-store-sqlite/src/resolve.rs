//! Existence resolution: external identifiers to surrogate keys.
//!
//! Every mutation and scoped read goes through here first, so "no such user"
//! is reported distinctly from "user has no memberships".

use rusqlite::{Connection, OptionalExtension as _};

use crate::{Error, Result, encode::encode_user_id};

/// Surrogate key of the user with external id `user_id`.
pub fn user_key(conn: &Connection, user_id: u64) -> Result<i64> {
  let raw = encode_user_id(user_id)?;
  conn
    .query_row(
      "SELECT id FROM users WHERE user_id = ?1",
      rusqlite::params![raw],
      |row| row.get(0),
    )
    .optional()?
    .ok_or(Error::UserNotFound(user_id))
}

/// Surrogate key of the segment named `slug`.
pub fn segment_key(conn: &Connection, slug: &str) -> Result<i64> {
  conn
    .query_row(
      "SELECT id FROM segments WHERE slug = ?1",
      rusqlite::params![slug],
      |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| Error::SegmentNotFound(slug.to_owned()))
}
