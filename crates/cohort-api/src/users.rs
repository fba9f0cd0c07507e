//! Handlers for `/users` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/users` | Body: `{"user_id":1000}`; 409 if already registered |
//! | `GET`    | `/users/{user_id}/segments` | Active segment slugs |
//! | `POST`   | `/users/{user_id}/segments` | Body: [`SegmentsBody`]; all or nothing |
//! | `DELETE` | `/users/{user_id}/segments` | Body: [`SegmentsBody`]; unknown slugs are skipped |
//! | `GET`    | `/users/{user_id}/segments/{slug}` | Raw membership row, active or retired |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use cohort_core::{
  membership::{AddedMembership, Membership, non_empty},
  store::SegmentStore,
};
use serde::{Deserialize, Serialize};

use crate::{ApiState, error::ApiError};

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub user_id: u64,
}

/// `POST /users`: body: `{"user_id":1000}`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SegmentStore,
{
  let user = state
    .store
    .add_user(body.user_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok((StatusCode::CREATED, Json(user)))
}

// ─── Memberships ──────────────────────────────────────────────────────────────

/// JSON body accepted by `POST` and `DELETE /users/{user_id}/segments`.
#[derive(Debug, Deserialize)]
pub struct SegmentsBody {
  /// Applied in order, inside one transaction.
  pub segments: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SegmentsOfUser {
  pub user_id:  u64,
  pub segments: Vec<String>,
}

/// `GET /users/{user_id}/segments`
pub async fn list_segments<S>(
  State(state): State<ApiState<S>>,
  Path(user_id): Path<u64>,
) -> Result<Json<SegmentsOfUser>, ApiError>
where
  S: SegmentStore,
{
  let segments = state
    .store
    .memberships_of_user(user_id)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(SegmentsOfUser { user_id, segments }))
}

#[derive(Debug, Serialize)]
pub struct Added {
  pub user_id: u64,
  pub added:   Vec<AddedMembership>,
}

/// `POST /users/{user_id}/segments`: body: `{"segments":["beta","gamma"]}`
pub async fn add_segments<S>(
  State(state): State<ApiState<S>>,
  Path(user_id): Path<u64>,
  Json(body): Json<SegmentsBody>,
) -> Result<Json<Added>, ApiError>
where
  S: SegmentStore,
{
  non_empty(&body.segments)?;
  let added = state
    .store
    .add_memberships(user_id, body.segments)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(Added { user_id, added }))
}

#[derive(Debug, Serialize)]
pub struct Removed {
  pub user_id: u64,
  /// Rows actually retired; unknown or inactive pairs do not count.
  pub removed: usize,
}

/// `DELETE /users/{user_id}/segments`: body: `{"segments":["beta"]}`
pub async fn remove_segments<S>(
  State(state): State<ApiState<S>>,
  Path(user_id): Path<u64>,
  Json(body): Json<SegmentsBody>,
) -> Result<Json<Removed>, ApiError>
where
  S: SegmentStore,
{
  non_empty(&body.segments)?;
  let removed = state
    .store
    .remove_memberships(user_id, body.segments)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(Removed { user_id, removed }))
}

/// `GET /users/{user_id}/segments/{slug}`
pub async fn membership<S>(
  State(state): State<ApiState<S>>,
  Path((user_id, slug)): Path<(u64, String)>,
) -> Result<Json<Membership>, ApiError>
where
  S: SegmentStore,
{
  let membership = state
    .store
    .get_membership(user_id, slug.clone())
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| {
      ApiError::NotFound(format!("user '{user_id}' was never in segment '{slug}'"))
    })?;
  Ok(Json(membership))
}
