//! Server wiring for Cohort: configuration, middleware, and store bootstrap.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use axum::{Router, http::HeaderName};
use cohort_api::{ApiState, api_router};
use cohort_store_sqlite::{SqliteStore, StoreOptions};
use serde::Deserialize;
use tower_http::{
  request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
  timeout::TimeoutLayer,
  trace::TraceLayer,
};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `COHORT_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                 String,
  pub port:                 u16,
  /// SQLite database file; a leading `~/` is expanded.
  pub store_path:           PathBuf,
  /// Where monthly history reports are written and served from.
  pub report_dir:           PathBuf,
  /// Upper bound on a whole HTTP request.
  pub request_timeout_secs: u64,
  /// Upper bound on a single store operation; unset means unbounded.
  pub op_timeout_ms:        Option<u64>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                 "127.0.0.1".to_string(),
      port:                 8080,
      store_path:           PathBuf::from("cohort.sqlite3"),
      report_dir:           PathBuf::from("reports"),
      request_timeout_secs: 60,
      op_timeout_ms:        None,
    }
  }
}

impl ServerConfig {
  /// Layer the optional TOML file at `path` under `COHORT_*` variables.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("COHORT"))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      report_dir: expand_tilde(&self.report_dir),
      op_timeout: self.op_timeout_ms.map(Duration::from_millis),
      ..Default::default()
    }
  }
}

// ─── Bootstrap ────────────────────────────────────────────────────────────────

/// Open the store described by `config`, applying the schema if needed.
pub async fn open_store(
  config: &ServerConfig,
) -> Result<SqliteStore, cohort_store_sqlite::Error> {
  SqliteStore::open(expand_tilde(&config.store_path), config.store_options()).await
}

/// Build the full application: API routes plus request-id, tracing, and
/// timeout middleware.
pub fn app(store: SqliteStore, config: &ServerConfig) -> Router {
  let request_id = HeaderName::from_static("x-request-id");
  let state = ApiState {
    report_dir: Arc::new(store.report_dir().to_path_buf()),
    store:      Arc::new(store),
  };

  api_router(state)
    .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
    .layer(PropagateRequestIdLayer::new(request_id.clone()))
    .layer(TraceLayer::new_for_http())
    .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use tower::ServiceExt as _;

  #[test]
  fn missing_file_yields_defaults() {
    let cfg = ServerConfig::load(Path::new("/nonexistent/cohort.toml")).unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.request_timeout_secs, 60);
    assert!(cfg.op_timeout_ms.is_none());
    assert_eq!(cfg.address(), "127.0.0.1:8080");
  }

  #[test]
  fn op_timeout_flows_into_store_options() {
    let cfg = ServerConfig {
      op_timeout_ms: Some(250),
      ..Default::default()
    };
    assert_eq!(
      cfg.store_options().op_timeout,
      Some(Duration::from_millis(250))
    );
  }

  #[test]
  fn tilde_is_expanded_only_at_start() {
    let plain = Path::new("data/cohort.sqlite3");
    assert_eq!(expand_tilde(plain), plain);
    if let Ok(home) = std::env::var("HOME") {
      assert_eq!(
        expand_tilde(Path::new("~/cohort.sqlite3")),
        PathBuf::from(home).join("cohort.sqlite3")
      );
    }
  }

  #[tokio::test]
  async fn app_sets_request_id_header() {
    let cfg = ServerConfig::default();
    let store = SqliteStore::open_in_memory(cfg.store_options()).await.unwrap();
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app(store, &cfg).oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
  }
}
