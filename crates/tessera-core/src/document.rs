//! Documents attached to an application.
//!
//! Uploading and verifying documents is owned by a separate service; the core
//! only reads them to count and list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  pub document_id:      Uuid,
  pub application_id:   Uuid,
  pub document_type:    String,
  pub file_name:        String,
  pub is_approved:      bool,
  /// Staff member who verified the document, if any.
  pub verified_by:      Option<Uuid>,
  pub verified_by_name: Option<String>,
  pub uploaded_at:      DateTime<Utc>,
}
