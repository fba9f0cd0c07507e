//! JSON REST API for Cohort.
//!
//! Exposes an axum [`Router`] backed by any [`cohort_core::store::SegmentStore`].
//! Request ids, tracing, timeouts, and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(cohort_api::api_router(state))
//! ```

pub mod error;
pub mod reports;
pub mod segments;
pub mod users;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  extract::State,
  routing::{get, post},
};
use cohort_core::store::SegmentStore;
use serde_json::{Value, json};

pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:      Arc<S>,
  /// Directory the store exports reports into; served by `GET /reports/{file}`.
  pub report_dir: Arc<PathBuf>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:      self.store.clone(),
      report_dir: self.report_dir.clone(),
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: SegmentStore + 'static,
{
  Router::new()
    .route("/health", get(health::<S>))
    // Users
    .route("/users", post(users::create::<S>))
    .route(
      "/users/{user_id}/segments",
      get(users::list_segments::<S>)
        .post(users::add_segments::<S>)
        .delete(users::remove_segments::<S>),
    )
    .route("/users/{user_id}/segments/{slug}", get(users::membership::<S>))
    // Segments
    .route("/segments", post(segments::create::<S>))
    .route("/segments/{slug}", axum::routing::delete(segments::delete_one::<S>))
    .route("/segments/{slug}/users", get(segments::members::<S>))
    // Reports
    .route("/reports", post(reports::create::<S>))
    .route("/reports/{file}", get(reports::download::<S>))
    .with_state(state)
}

/// `GET /health`: round-trips to the database.
async fn health<S>(State(state): State<ApiState<S>>) -> Result<Json<Value>, ApiError>
where
  S: SegmentStore,
{
  state.store.ping().await.map_err(ApiError::from_store)?;
  Ok(Json(json!({ "status": "ok" })))
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use chrono::{TimeZone as _, Utc};
  use cohort_core::clock::ManualClock;
  use cohort_store_sqlite::{SqliteStore, StoreOptions};
  use tempfile::TempDir;
  use tower::ServiceExt as _;

  struct Harness {
    state:  ApiState<SqliteStore>,
    clock:  Arc<ManualClock>,
    _dir:   TempDir,
  }

  async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(
      Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap(),
    ));
    let report_dir = dir.path().join("reports");
    let store = SqliteStore::open_in_memory(StoreOptions {
      report_dir: report_dir.clone(),
      clock:      clock.clone(),
      ..Default::default()
    })
    .await
    .unwrap();

    Harness {
      state: ApiState {
        store:      Arc::new(store),
        report_dir: Arc::new(report_dir),
      },
      clock,
      _dir: dir,
    }
  }

  async fn send(
    h:      &Harness,
    method: &str,
    uri:    &str,
    body:   Option<Value>,
  ) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
      Some(json) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    let resp = api_router(h.state.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
  }

  async fn send_json(
    h:      &Harness,
    method: &str,
    uri:    &str,
    body:   Option<Value>,
  ) -> (StatusCode, Value) {
    let (status, bytes) = send(h, method, uri, body).await;
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  async fn seed(h: &Harness) {
    let (s, _) = send_json(h, "POST", "/users", Some(json!({ "user_id": 7 }))).await;
    assert_eq!(s, StatusCode::CREATED);
    for slug in ["alpha", "beta"] {
      let (s, _) = send_json(h, "POST", "/segments", Some(json!({ "slug": slug }))).await;
      assert_eq!(s, StatusCode::CREATED);
    }
  }

  // ── Health ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_reports_ok() {
    let h = harness().await;
    let (status, body) = send_json(&h, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
  }

  // ── Users and segments ──────────────────────────────────────────────────────

  #[tokio::test]
  async fn duplicate_user_is_409() {
    let h = harness().await;
    seed(&h).await;
    let (status, body) =
      send_json(&h, "POST", "/users", Some(json!({ "user_id": 7 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains('7'));
  }

  #[tokio::test]
  async fn blank_slug_is_400() {
    let h = harness().await;
    let (status, _) =
      send_json(&h, "POST", "/segments", Some(json!({ "slug": "  " }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  // ── Memberships ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn add_list_remove_roundtrip() {
    let h = harness().await;
    seed(&h).await;

    let (status, body) = send_json(
      &h,
      "POST",
      "/users/7/segments",
      Some(json!({ "segments": ["beta", "alpha"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["added"][0]["slug"], "beta");
    assert_eq!(body["added"][0]["outcome"], "inserted");

    let (_, body) = send_json(&h, "GET", "/users/7/segments", None).await;
    assert_eq!(body["segments"], json!(["alpha", "beta"]));

    let (status, body) = send_json(
      &h,
      "DELETE",
      "/users/7/segments",
      Some(json!({ "segments": ["alpha", "missing"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);

    let (_, body) = send_json(&h, "GET", "/segments/beta/users", None).await;
    assert_eq!(body["users"], json!([7]));
  }

  #[tokio::test]
  async fn add_already_active_is_409() {
    let h = harness().await;
    seed(&h).await;
    let body = json!({ "segments": ["beta"] });
    send_json(&h, "POST", "/users/7/segments", Some(body.clone())).await;
    let (status, _) = send_json(&h, "POST", "/users/7/segments", Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn add_with_unknown_segment_is_404() {
    let h = harness().await;
    seed(&h).await;
    let (status, body) = send_json(
      &h,
      "POST",
      "/users/7/segments",
      Some(json!({ "segments": ["alpha", "nope"] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));

    let (_, body) = send_json(&h, "GET", "/users/7/segments", None).await;
    assert_eq!(body["segments"], json!([]));
  }

  #[tokio::test]
  async fn empty_segment_list_is_400() {
    let h = harness().await;
    seed(&h).await;
    let (status, _) = send_json(
      &h,
      "POST",
      "/users/7/segments",
      Some(json!({ "segments": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn unknown_user_segments_is_404() {
    let h = harness().await;
    let (status, _) = send_json(&h, "GET", "/users/1/segments", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn membership_row_shows_retirement() {
    let h = harness().await;
    seed(&h).await;
    let body = json!({ "segments": ["alpha"] });
    send_json(&h, "POST", "/users/7/segments", Some(body.clone())).await;
    h.clock.set(Utc.with_ymd_and_hms(2024, 3, 20, 8, 0, 0).unwrap());
    send_json(&h, "DELETE", "/users/7/segments", Some(body)).await;

    let (status, row) = send_json(&h, "GET", "/users/7/segments/alpha", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(row["deleted_at"].as_str().unwrap().starts_with("2024-03-20"));

    let (status, _) = send_json(&h, "GET", "/users/7/segments/beta", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Cascade delete ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn delete_segment_then_members_is_404() {
    let h = harness().await;
    seed(&h).await;
    send_json(
      &h,
      "POST",
      "/users/7/segments",
      Some(json!({ "segments": ["alpha", "beta"] })),
    )
    .await;

    let (status, _) = send_json(&h, "DELETE", "/segments/beta", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(&h, "GET", "/segments/beta/users", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = send_json(&h, "GET", "/users/7/segments", None).await;
    assert_eq!(body["segments"], json!(["alpha"]));

    let (status, _) = send_json(&h, "DELETE", "/segments/beta", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Reports ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn export_and_download_report() {
    let h = harness().await;
    seed(&h).await;
    let body = json!({ "segments": ["beta"] });
    send_json(&h, "POST", "/users/7/segments", Some(body.clone())).await;
    h.clock.set(Utc.with_ymd_and_hms(2024, 3, 20, 8, 0, 0).unwrap());
    send_json(&h, "DELETE", "/users/7/segments", Some(body)).await;

    let (status, loc) = send_json(
      &h,
      "POST",
      "/reports",
      Some(json!({ "year": 2024, "month": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(loc["file"], "report_2024_3.csv");

    let url = loc["url"].as_str().unwrap();
    let (status, bytes) = send(&h, "GET", url, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
      std::str::from_utf8(&bytes).unwrap(),
      "7;beta;added;2024-03-05T08:00:00.000000Z\n\
       7;beta;removed;2024-03-20T08:00:00.000000Z\n"
    );
  }

  #[tokio::test]
  async fn invalid_month_is_400() {
    let h = harness().await;
    let (status, _) = send_json(
      &h,
      "POST",
      "/reports",
      Some(json!({ "year": 2024, "month": 13 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn missing_report_is_404() {
    let h = harness().await;
    let (status, _) = send(&h, "GET", "/reports/report_1999_1.csv", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }
}
