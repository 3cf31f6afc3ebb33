//! Staff: internal reviewers who act on applications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
  Admin,
  Staff,
}

impl StaffRole {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Admin => "admin",
      Self::Staff => "staff",
    }
  }
}

/// A reviewer. Only active staff may be assigned an application or act on
/// one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staff {
  pub staff_id:   Uuid,
  pub username:   String,
  pub email:      String,
  pub full_name:  String,
  pub role:       StaffRole,
  pub is_active:  bool,
  pub created_at: DateTime<Utc>,
}

/// Input for registering a staff member.
#[derive(Debug, Clone)]
pub struct NewStaff {
  pub username:  String,
  pub email:     String,
  pub full_name: String,
  pub role:      StaffRole,
}

/// The compact staff projection joined onto application rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffSummary {
  pub staff_id:  Uuid,
  pub username:  String,
  pub full_name: String,
  pub email:     String,
}
