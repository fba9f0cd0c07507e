//! Monthly history: the change-log query and its delimited export.

use std::path::{Path, PathBuf};

use cohort_core::history::{HistoryEvent, ReportPeriod};
use rusqlite::Connection;
use tokio::io::AsyncWriteExt as _;

use crate::{
  Result,
  encode::{RawHistoryEvent, encode_dt},
};

const DELIMITER: char = ';';

// ─── Query ───────────────────────────────────────────────────────────────────

/// Additions (`created_at` in range) and removals (`deleted_at` in range),
/// ordered by user id, slug, then event kind.
pub fn history(conn: &mut Connection, period: &ReportPeriod) -> Result<Vec<HistoryEvent>> {
  let start = encode_dt(period.start());
  let end = encode_dt(period.end());

  let tx = conn.transaction()?;
  let raws = {
    let mut stmt = tx.prepare(
      "SELECT u.user_id, s.slug, 'added' AS event, us.created_at AS at
       FROM user_segments us
       JOIN segments s ON s.id = us.segment_id
       JOIN users u    ON u.id = us.user_id
       WHERE us.created_at >= ?1 AND us.created_at < ?2
       UNION
       SELECT u.user_id, s.slug, 'removed' AS event, us.deleted_at AS at
       FROM user_segments us
       JOIN segments s ON s.id = us.segment_id
       JOIN users u    ON u.id = us.user_id
       WHERE us.deleted_at >= ?1 AND us.deleted_at < ?2
       ORDER BY 1, 2, 3",
    )?;
    let raws = stmt
      .query_map(rusqlite::params![start, end], |row| {
        Ok(RawHistoryEvent {
          user_id: row.get(0)?,
          slug:    row.get(1)?,
          kind:    row.get(2)?,
          at:      row.get(3)?,
        })
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    raws
  };
  tx.commit()?;

  raws.into_iter().map(RawHistoryEvent::into_event).collect()
}

// ─── Rendering ───────────────────────────────────────────────────────────────

/// One `user_id;slug;event;timestamp` record per line.
pub fn render(events: &[HistoryEvent]) -> String {
  let mut out = String::new();
  for event in events {
    let fields = [
      event.user_id.to_string(),
      event.slug.clone(),
      event.kind.as_str().to_owned(),
      encode_dt(event.at),
    ];
    for (i, field) in fields.iter().enumerate() {
      if i > 0 {
        out.push(DELIMITER);
      }
      push_field(&mut out, field);
    }
    out.push('\n');
  }
  out
}

/// Quote a field that contains the delimiter, a quote, or a line break.
fn push_field(out: &mut String, field: &str) {
  if field.contains([DELIMITER, '"', '\n', '\r']) {
    out.push('"');
    out.push_str(&field.replace('"', "\"\""));
    out.push('"');
  } else {
    out.push_str(field);
  }
}

// ─── Export ──────────────────────────────────────────────────────────────────

/// Write the rendered report into `dir` and return its path.
///
/// The file is written under a temporary name and renamed into place, so an
/// interrupted export never clobbers a previously completed report.
pub async fn write(
  dir:    &Path,
  period: &ReportPeriod,
  events: &[HistoryEvent],
) -> Result<PathBuf> {
  tokio::fs::create_dir_all(dir).await?;

  let path = dir.join(period.file_name());
  let partial = dir.join(format!(".{}.partial", period.file_name()));

  let mut file = tokio::fs::File::create(&partial).await?;
  file.write_all(render(events).as_bytes()).await?;
  file.sync_all().await?;
  drop(file);

  tokio::fs::rename(&partial, &path).await?;
  Ok(path)
}
