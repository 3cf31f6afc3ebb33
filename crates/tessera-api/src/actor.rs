//! Staff actor extractor.
//!
//! Authentication happens upstream; the gateway forwards the verified staff
//! id in the `x-staff-id` header. Here it is only resolved to an active staff
//! record.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, request::Parts},
};
use tessera_core::{staff::Staff, store::ApplicationStore};
use tracing::warn;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub const STAFF_ID_HEADER: &str = "x-staff-id";

/// The active staff member acting on this request.
pub struct StaffActor(pub Staff);

/// Read the staff id from `headers`. Missing or malformed ids are rejected.
pub fn staff_id_from(headers: &HeaderMap) -> Result<Uuid, ApiError> {
  let value = headers
    .get(STAFF_ID_HEADER)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;
  Uuid::parse_str(value.trim()).map_err(|_| ApiError::Unauthorized)
}

impl<S> FromRequestParts<AppState<S>> for StaffActor
where
  S: ApplicationStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let staff_id = staff_id_from(&parts.headers).inspect_err(|_| {
      warn!(path = %parts.uri.path(), "request without a usable staff id");
    })?;

    match state.engine.active_staff(staff_id).await? {
      Some(staff) => Ok(StaffActor(staff)),
      None => {
        warn!(%staff_id, "unknown or inactive staff rejected");
        Err(ApiError::Unauthorized)
      }
    }
  }
}
