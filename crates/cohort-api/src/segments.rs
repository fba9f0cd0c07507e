//! Handlers for `/segments` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/segments` | Body: `{"slug":"beta"}`; 409 if taken |
//! | `DELETE` | `/segments/{slug}` | Cascades to every membership; 404 if absent |
//! | `GET`    | `/segments/{slug}/users` | Active members' external ids |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use cohort_core::store::SegmentStore;
use serde::{Deserialize, Serialize};

use crate::{ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub slug: String,
}

/// `POST /segments`: body: `{"slug":"beta"}`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SegmentStore,
{
  let slug = body.slug.trim();
  if slug.is_empty() {
    return Err(ApiError::BadRequest("slug must not be empty".into()));
  }
  let segment = state
    .store
    .add_segment(slug.to_owned())
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(segment)))
}

/// `DELETE /segments/{slug}`
pub async fn delete_one<S>(
  State(state): State<ApiState<S>>,
  Path(slug): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: SegmentStore,
{
  state
    .store
    .delete_segment(slug)
    .await
    .map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct Members {
  pub slug:  String,
  pub users: Vec<u64>,
}

/// `GET /segments/{slug}/users`
pub async fn members<S>(
  State(state): State<ApiState<S>>,
  Path(slug): Path<String>,
) -> Result<Json<Members>, ApiError>
where
  S: SegmentStore,
{
  let users = state
    .store
    .members_of_segment(slug.clone())
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(Members { slug, users }))
}
