//! `GET /health`: liveness probe.

use axum::Json;
use chrono::Utc;
use serde_json::{Value, json};

pub async fn handler() -> Json<Value> {
  Json(json!({
    "status": "ok",
    "service": env!("CARGO_PKG_NAME"),
    "version": env!("CARGO_PKG_VERSION"),
    "timestamp": Utc::now(),
  }))
}
