//! Transition rules for applications.
//!
//! Everything in this module is pure: storage backends read the current row
//! inside their transaction, hand it to these functions to compute the next
//! row and the matching audit entry, and write both before committing.
//!
//! The engine accepts any enumerated status as a target. What it enforces is
//! the bookkeeping around a status:
//! - `completed` stamps `completion_date` the first time only;
//! - `rejected` stores the supplied reason as-is (no reason stores null);
//! - every other status clears `rejection_reason`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{
  Result,
  application::{Application, ApplicationStatus},
  audit::{AuditAction, NewAuditEntry},
};

// ─── Status change ───────────────────────────────────────────────────────────

/// A requested status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
  pub status:           ApplicationStatus,
  /// Replaces the current notes when present; `None` keeps them.
  pub notes:            Option<String>,
  /// Only meaningful when `status` is `Rejected`.
  pub rejection_reason: Option<String>,
}

impl StatusChange {
  pub fn new(status: ApplicationStatus) -> Self {
    Self { status, notes: None, rejection_reason: None }
  }

  pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
    self.notes = Some(notes.into());
    self
  }

  pub fn with_rejection_reason(mut self, reason: impl Into<String>) -> Self {
    self.rejection_reason = Some(reason.into());
    self
  }

  /// Compute the row that results from applying this change to `current`.
  pub fn apply(&self, current: &Application, now: DateTime<Utc>) -> Application {
    let mut next = current.clone();
    next.status = self.status;
    if let Some(notes) = &self.notes {
      next.notes = Some(notes.clone());
    }
    next.rejection_reason = match self.status {
      ApplicationStatus::Rejected => self.rejection_reason.clone(),
      _ => None,
    };
    if self.status == ApplicationStatus::Completed && next.completion_date.is_none() {
      next.completion_date = Some(now);
    }
    next.updated_at = now;
    next
  }

  /// The `status_changed` entry for this change. `current` must be the row as
  /// read inside the same transaction that writes the update.
  pub fn audit_entry(
    &self,
    current: &Application,
    actor: Uuid,
    now: DateTime<Utc>,
  ) -> NewAuditEntry {
    NewAuditEntry::for_application(
      current.application_id,
      Some(actor),
      AuditAction::StatusChanged,
      now,
    )
    .with_old(json!({ "status": current.status }))
    .with_new(json!({
      "status":           self.status,
      "notes":            self.notes,
      "rejection_reason": self.rejection_reason,
    }))
  }
}

// ─── Assignment ──────────────────────────────────────────────────────────────

/// Assignment of an application to a staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
  /// The staff member receiving the application.
  pub staff_id:    Uuid,
  /// The staff member performing the assignment.
  pub assigned_by: Uuid,
}

impl Assignment {
  pub fn apply(&self, current: &Application, now: DateTime<Utc>) -> Application {
    let mut next = current.clone();
    next.assigned_staff_id = Some(self.staff_id);
    next.updated_at = now;
    next
  }

  pub fn audit_entry(&self, current: &Application, now: DateTime<Utc>) -> NewAuditEntry {
    NewAuditEntry::for_application(
      current.application_id,
      Some(self.assigned_by),
      AuditAction::Assigned,
      now,
    )
    .with_old(json!({ "assigned_to": current.assigned_staff_id }))
    .with_new(json!({
      "assigned_to": self.staff_id,
      "assigned_by": self.assigned_by,
    }))
  }
}

// ─── Creation ────────────────────────────────────────────────────────────────

/// The `created` entry for a freshly inserted application: no actor, full
/// new-value snapshot.
pub fn creation_audit_entry(created: &Application) -> Result<NewAuditEntry> {
  Ok(
    NewAuditEntry::for_application(
      created.application_id,
      None,
      AuditAction::Created,
      created.created_at,
    )
    .with_new(serde_json::to_value(created).map_err(crate::Error::store)?),
  )
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// Name of the topic live viewers of `application_id` subscribe to.
pub fn topic_for(application_id: Uuid) -> String {
  format!("application_{application_id}")
}

/// Emitted after a status transition has committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdated {
  pub application_id: Uuid,
  pub new_status:     ApplicationStatus,
  /// Full name of the staff member who made the change.
  pub updated_by:     String,
  pub timestamp:      DateTime<Utc>,
}

impl StatusUpdated {
  pub const EVENT: &'static str = "status_updated";

  pub fn topic(&self) -> String { topic_for(self.application_id) }
}

/// A committed status transition: the post-update row and the event to hand
/// to the fan-out dispatcher.
#[derive(Debug, Clone)]
pub struct Transition {
  pub application: Application,
  pub event:       StatusUpdated,
}
