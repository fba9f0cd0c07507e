//! Handlers for `/reports` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/reports` | Body: `{"year":2024,"month":3}`; writes the monthly history file |
//! | `GET`  | `/reports/{file}` | Downloads a previously exported file |

use axum::{
  Json,
  extract::{Path, State},
  http::{StatusCode, header},
  response::IntoResponse,
};
use cohort_core::{history::ReportPeriod, store::SegmentStore};
use serde::{Deserialize, Serialize};

use crate::{ApiState, error::ApiError};

// ─── Export ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReportBody {
  pub year:  i32,
  /// 1–12.
  pub month: u32,
}

#[derive(Debug, Serialize)]
pub struct ReportLocation {
  pub file: String,
  /// Relative URL the file can be downloaded from.
  pub url:  String,
}

/// `POST /reports`: returns 201 + where to fetch the file.
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<ReportBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SegmentStore,
{
  let period = ReportPeriod::new(body.year, body.month)?;
  let path = state
    .store
    .export_history(period)
    .await
    .map_err(ApiError::from_store)?;

  let file = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_else(|| period.file_name());
  let url = format!("/reports/{file}");
  Ok((StatusCode::CREATED, Json(ReportLocation { file, url })))
}

// ─── Download ─────────────────────────────────────────────────────────────────

/// `GET /reports/{file}`
pub async fn download<S>(
  State(state): State<ApiState<S>>,
  Path(file): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SegmentStore,
{
  if !is_plain_file_name(&file) {
    return Err(ApiError::BadRequest(format!("invalid report name {file:?}")));
  }

  let path = state.report_dir.join(&file);
  let body = match tokio::fs::read(&path).await {
    Ok(bytes) => bytes,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      return Err(ApiError::NotFound(format!("report '{file}' doesn't exist")));
    }
    Err(e) => return Err(ApiError::Store(Box::new(e))),
  };

  Ok((
    [
      (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
      (
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{file}\""),
      ),
    ],
    body,
  ))
}

/// Only bare `*.csv` names inside the report directory are served.
fn is_plain_file_name(name: &str) -> bool {
  !name.is_empty()
    && !name.starts_with('.')
    && name.ends_with(".csv")
    && !name.contains(['/', '\\', '"'])
    && !name.contains("..")
}
