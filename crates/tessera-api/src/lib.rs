//! JSON HTTP surface for Tessera.
//!
//! Exposes an axum [`Router`] backed by any [`ApplicationStore`], plus the
//! per-application [`FanOut`] that status changes are published to. Staff
//! authentication is the upstream gateway's job; see [`actor`].

pub mod actor;
pub mod applications;
pub mod error;
pub mod events;
pub mod fanout;
pub mod health;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, put},
};
use serde::Deserialize;
use tessera_core::{Lifecycle, store::ApplicationStore};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use fanout::{FanOut, Listener, Subscription};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TESSERA_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms: u64,
}

fn default_busy_timeout_ms() -> u64 { 2_000 }

impl ServerConfig {
  pub fn busy_timeout(&self) -> Duration { Duration::from_millis(self.busy_timeout_ms) }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub engine: Lifecycle<S>,
  pub fanout: Arc<FanOut>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { engine: self.engine.clone(), fanout: Arc::clone(&self.fanout) }
  }
}

impl<S: ApplicationStore> AppState<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { engine: Lifecycle::new(store), fanout: Arc::new(FanOut::default()) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ApplicationStore + 'static,
{
  Router::new()
    .route("/health", get(health::handler))
    .route(
      "/applications",
      get(applications::list::<S>).post(applications::create::<S>),
    )
    .route("/applications/{id}", get(applications::get_one::<S>))
    .route("/applications/{id}/status", put(applications::update_status::<S>))
    .route("/applications/{id}/assign", put(applications::assign::<S>))
    .route("/applications/{id}/audit", get(applications::audit::<S>))
    .route("/applications/{id}/events", get(events::subscribe::<S>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
