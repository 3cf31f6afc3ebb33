//! Handlers for `/applications` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/applications` | Staff; filters, search, sort and paging via [`ListParams`] |
//! | `GET`  | `/applications/{id}` | Staff; detail plus documents |
//! | `POST` | `/applications` | Public; body: [`Submission`]; returns 201 |
//! | `PUT`  | `/applications/{id}/status` | Staff; body: [`StatusBody`]; notifies subscribers |
//! | `PUT`  | `/applications/{id}/assign` | Staff; body: `{"staff_id": "..."}` |
//! | `GET`  | `/applications/{id}/audit` | Staff; audit entries, most recent first |
//! | `GET`  | `/applications/{id}/events` | Staff; live status updates, see [`crate::events`] |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tessera_core::{
  application::{
    Application, ApplicationDetail, ApplicationRow, ApplicationStatus, PaymentStatus,
    Submission,
  },
  audit::AuditEntry,
  document::Document,
  lifecycle::StatusChange,
  query::{ApplicationQuery, Pagination, SortColumn, SortOrder},
  store::ApplicationStore,
};
use tracing::info;
use uuid::Uuid;

use crate::{AppState, actor::StaffActor, error::ApiError};

/// `{"application": ...}` envelope for mutation responses.
#[derive(Debug, Serialize)]
pub struct ApplicationEnvelope {
  pub application: Application,
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// Query string of `GET /applications`. Every field is optional; blank values
/// count as absent.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub status:            Option<String>,
  pub assigned_staff_id: Option<String>,
  pub payment_status:    Option<String>,
  pub search:            Option<String>,
  pub page:              Option<i64>,
  pub limit:             Option<i64>,
  pub sort_by:           Option<String>,
  pub sort_order:        Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
  value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<ListParams> for ApplicationQuery {
  type Error = ApiError;

  fn try_from(p: ListParams) -> Result<Self, ApiError> {
    let mut query = ApplicationQuery::default();
    query.status = present(p.status)
      .map(|s| s.parse::<ApplicationStatus>())
      .transpose()?;
    query.payment_status = present(p.payment_status)
      .map(|s| s.parse::<PaymentStatus>())
      .transpose()?;
    query.assigned_staff_id = present(p.assigned_staff_id)
      .map(|s| {
        Uuid::parse_str(s.trim())
          .map_err(|_| ApiError::BadRequest(format!("invalid assigned_staff_id: {s:?}")))
      })
      .transpose()?;
    query.search = present(p.search);
    query.sort_by = p.sort_by.as_deref().map(SortColumn::parse).unwrap_or_default();
    query.sort_order = p.sort_order.as_deref().map(SortOrder::parse).unwrap_or_default();

    if let Some(page) = p.page {
      query = query.with_page(page);
    }
    if let Some(limit) = p.limit {
      query = query.with_limit(limit);
    }
    Ok(query)
  }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
  pub applications: Vec<ApplicationRow>,
  pub pagination:   Pagination,
}

/// `GET /applications[?status=..][&assigned_staff_id=..][&payment_status=..][&search=..][&page=..][&limit=..][&sort_by=..][&sort_order=..]`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  StaffActor(_actor): StaffActor,
  Query(params): Query<ListParams>,
) -> Result<Json<ListResponse>, ApiError>
where
  S: ApplicationStore + 'static,
{
  let query = ApplicationQuery::try_from(params)?;
  let page = state.engine.list(&query).await?;
  Ok(Json(ListResponse { applications: page.items, pagination: page.pagination }))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DetailResponse {
  pub application: ApplicationDetail,
  pub documents:   Vec<Document>,
}

/// `GET /applications/{id}`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  StaffActor(_actor): StaffActor,
  Path(id): Path<Uuid>,
) -> Result<Json<DetailResponse>, ApiError>
where
  S: ApplicationStore + 'static,
{
  let (application, documents) = state.engine.get(id).await?;
  Ok(Json(DetailResponse { application, documents }))
}

// ─── Submit ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SubmittedResponse {
  pub application:  Application,
  pub applicant_id: Uuid,
}

/// `POST /applications`: public; returns 201.
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<Submission>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ApplicationStore + 'static,
{
  let submitted = state.engine.submit(body).await?;
  info!(
    application_id = %submitted.application.application_id,
    applicant_id = %submitted.applicant_id,
    new_applicant = submitted.created_applicant,
    "application submitted"
  );
  Ok((
    StatusCode::CREATED,
    Json(SubmittedResponse {
      application:  submitted.application,
      applicant_id: submitted.applicant_id,
    }),
  ))
}

// ─── Status ───────────────────────────────────────────────────────────────────

/// Body of `PUT /applications/{id}/status`.
#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status:           String,
  pub notes:            Option<String>,
  pub rejection_reason: Option<String>,
}

impl TryFrom<StatusBody> for StatusChange {
  type Error = ApiError;

  fn try_from(body: StatusBody) -> Result<Self, ApiError> {
    let status: ApplicationStatus = body.status.parse()?;
    let mut change = StatusChange::new(status);
    if let Some(notes) = body.notes {
      change = change.with_notes(notes);
    }

    let reason = present(body.rejection_reason);
    if status == ApplicationStatus::Rejected {
      let reason = reason.ok_or_else(|| {
        ApiError::BadRequest("rejection_reason is required when rejecting".into())
      })?;
      change = change.with_rejection_reason(reason);
    }
    Ok(change)
  }
}

/// `PUT /applications/{id}/status`: subscribers of the application's topic
/// are notified once the change has committed.
pub async fn update_status<S>(
  State(state): State<AppState<S>>,
  StaffActor(actor): StaffActor,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<ApplicationEnvelope>, ApiError>
where
  S: ApplicationStore + 'static,
{
  let change = StatusChange::try_from(body)?;
  let transition = state.engine.change_status(id, change, &actor).await?;

  let reached = state.fanout.publish(&transition.event);
  info!(
    application_id = %id,
    staff_id = %actor.staff_id,
    status = %transition.application.status,
    subscribers = reached,
    "status changed"
  );
  Ok(Json(ApplicationEnvelope { application: transition.application }))
}

// ─── Assign ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AssignBody {
  pub staff_id: Uuid,
}

/// `PUT /applications/{id}/assign`
pub async fn assign<S>(
  State(state): State<AppState<S>>,
  StaffActor(actor): StaffActor,
  Path(id): Path<Uuid>,
  Json(body): Json<AssignBody>,
) -> Result<Json<ApplicationEnvelope>, ApiError>
where
  S: ApplicationStore + 'static,
{
  let application = state.engine.assign(id, body.staff_id, &actor).await?;
  info!(
    application_id = %id,
    assigned_to = %body.staff_id,
    assigned_by = %actor.staff_id,
    "application assigned"
  );
  Ok(Json(ApplicationEnvelope { application }))
}

// ─── Audit ────────────────────────────────────────────────────────────────────

/// `GET /applications/{id}/audit`
pub async fn audit<S>(
  State(state): State<AppState<S>>,
  StaffActor(_actor): StaffActor,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditEntry>>, ApiError>
where
  S: ApplicationStore + 'static,
{
  Ok(Json(state.engine.audit_trail(id).await?))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blank_params_are_ignored_and_bad_sort_falls_back() {
    let params = ListParams {
      status: Some("".into()),
      search: Some("  ".into()),
      sort_by: Some("password".into()),
      sort_order: Some("sideways".into()),
      limit: Some(500),
      page: Some(0),
      ..ListParams::default()
    };
    let query = ApplicationQuery::try_from(params).unwrap();
    assert_eq!(query.status, None);
    assert_eq!(query.search, None);
    assert_eq!(query.sort_by, SortColumn::CreatedAt);
    assert_eq!(query.sort_order, SortOrder::Desc);
    assert_eq!(query.limit(), 100);
    assert_eq!(query.page(), 1);
  }

  #[test]
  fn unknown_status_filter_is_a_bad_request() {
    let params = ListParams { status: Some("archived".into()), ..ListParams::default() };
    assert!(matches!(
      ApplicationQuery::try_from(params),
      Err(ApiError::BadRequest(_))
    ));
  }

  #[test]
  fn rejecting_requires_a_reason() {
    let body = StatusBody {
      status:           "rejected".into(),
      notes:            None,
      rejection_reason: Some("   ".into()),
    };
    assert!(matches!(StatusChange::try_from(body), Err(ApiError::BadRequest(_))));

    let body = StatusBody {
      status:           "rejected".into(),
      notes:            Some("called twice".into()),
      rejection_reason: Some("incomplete documents".into()),
    };
    let change = StatusChange::try_from(body).unwrap();
    assert_eq!(change.rejection_reason.as_deref(), Some("incomplete documents"));
    assert_eq!(change.notes.as_deref(), Some("called twice"));
  }

  #[test]
  fn reasons_are_dropped_for_other_statuses() {
    let body = StatusBody {
      status:           "in_review".into(),
      notes:            None,
      rejection_reason: Some("stale".into()),
    };
    let change = StatusChange::try_from(body).unwrap();
    assert_eq!(change.status, ApplicationStatus::InReview);
    assert_eq!(change.rejection_reason, None);
  }
}
