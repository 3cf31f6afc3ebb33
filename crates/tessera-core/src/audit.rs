//! Audit log records.
//!
//! Every mutation of an application appends exactly one entry inside the same
//! transaction as the mutation itself. Entries are never updated or deleted.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// The entity type recorded on every entry written by the lifecycle engine.
pub const ENTITY_APPLICATION: &str = "application";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
  Created,
  StatusChanged,
  Assigned,
}

impl AuditAction {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Created => "created",
      Self::StatusChanged => "status_changed",
      Self::Assigned => "assigned",
    }
  }
}

impl fmt::Display for AuditAction {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for AuditAction {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "created" => Ok(Self::Created),
      "status_changed" => Ok(Self::StatusChanged),
      "assigned" => Ok(Self::Assigned),
      other => Err(Error::Validation(format!("unknown audit action: {other:?}"))),
    }
  }
}

/// An entry about to be appended. The store assigns the insertion sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
  pub audit_id:       Uuid,
  pub application_id: Uuid,
  /// `None` for public submissions, which have no acting staff member.
  pub staff_id:       Option<Uuid>,
  pub action:         AuditAction,
  pub entity_type:    &'static str,
  pub entity_id:      Uuid,
  pub old_value:      Option<serde_json::Value>,
  pub new_value:      Option<serde_json::Value>,
  pub created_at:     DateTime<Utc>,
}

impl NewAuditEntry {
  /// An entry about the application `application_id` itself.
  pub fn for_application(
    application_id: Uuid,
    staff_id: Option<Uuid>,
    action: AuditAction,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      audit_id: Uuid::new_v4(),
      application_id,
      staff_id,
      action,
      entity_type: ENTITY_APPLICATION,
      entity_id: application_id,
      old_value: None,
      new_value: None,
      created_at: now,
    }
  }

  pub fn with_old(mut self, value: serde_json::Value) -> Self {
    self.old_value = Some(value);
    self
  }

  pub fn with_new(mut self, value: serde_json::Value) -> Self {
    self.new_value = Some(value);
    self
  }
}

/// A persisted, immutable audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
  pub audit_id:       Uuid,
  /// Store-assigned insertion order; breaks ties between equal timestamps.
  pub sequence:       i64,
  pub application_id: Uuid,
  pub staff_id:       Option<Uuid>,
  pub action:         AuditAction,
  pub entity_type:    String,
  pub entity_id:      Uuid,
  pub old_value:      Option<serde_json::Value>,
  pub new_value:      Option<serde_json::Value>,
  pub created_at:     DateTime<Utc>,
}
