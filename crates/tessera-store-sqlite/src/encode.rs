//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with fixed nanosecond
//! precision, so lexical order is chronological order. Calendar dates are
//! ISO 8601. Audit snapshots are compact JSON. UUIDs are hyphenated lowercase
//! strings. Raw rows are decoded into typed records before leaving this
//! crate.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Row;
use tessera_core::{
  applicant::{Applicant, ApplicantSummary},
  application::{Application, ApplicationDetail, ApplicationRow},
  audit::AuditEntry,
  document::Document,
  staff::{Staff, StaffRole, StaffSummary},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

pub fn encode_json(value: Option<&serde_json::Value>) -> Option<String> {
  value.map(serde_json::Value::to_string)
}

fn decode_json(s: Option<String>) -> Result<Option<serde_json::Value>> {
  s.as_deref()
    .map(serde_json::from_str)
    .transpose()
    .map_err(Error::Json)
}

/// Parse an enumerated column through the domain type's `FromStr`.
fn decode_enum<T>(s: &str) -> Result<T>
where
  T: std::str::FromStr<Err = tessera_core::Error>,
{
  s.parse().map_err(|e: tessera_core::Error| Error::Decode(e.to_string()))
}

pub fn decode_staff_role(s: &str) -> Result<StaffRole> {
  match s {
    "admin" => Ok(StaffRole::Admin),
    "staff" => Ok(StaffRole::Staff),
    other => Err(Error::Decode(format!("unknown staff role: {other:?}"))),
  }
}

fn to_count(n: i64) -> u64 { u64::try_from(n).unwrap_or_default() }

// ─── Column lists ────────────────────────────────────────────────────────────

/// Application columns in [`RawApplication::from_row`] order, aliased `t`.
pub const APPLICATION_COLUMNS: &str = "
  t.application_id, t.applicant_id, t.assigned_staff_id, t.status,
  t.payment_method, t.payment_amount_cents, t.payment_status,
  t.payment_reference, t.payment_date, t.notes, t.rejection_reason,
  t.completion_date, t.created_at, t.updated_at";

pub const APPLICATION_COLUMN_COUNT: usize = 14;

/// Applicant columns in [`RawApplicant::from_row`] order, aliased `a`.
pub const APPLICANT_COLUMNS: &str = "
  a.applicant_id, a.email, a.fiscal_code, a.full_name, a.phone,
  a.birth_date, a.address, a.city, a.postal_code, a.created_at,
  a.updated_at";

pub const APPLICANT_COLUMN_COUNT: usize = 11;

pub const STAFF_COLUMNS: &str =
  "s.staff_id, s.username, s.email, s.full_name, s.role, s.is_active, s.created_at";

/// Nullable staff columns of a `LEFT JOIN staff s`, in
/// [`RawStaffSummary::from_row`] order.
pub const STAFF_SUMMARY_COLUMNS: &str = "s.staff_id, s.username, s.full_name, s.email";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `applications` row.
pub struct RawApplication {
  pub application_id:       String,
  pub applicant_id:         String,
  pub assigned_staff_id:    Option<String>,
  pub status:               String,
  pub payment_method:       String,
  pub payment_amount_cents: i64,
  pub payment_status:       String,
  pub payment_reference:    Option<String>,
  pub payment_date:         Option<String>,
  pub notes:                Option<String>,
  pub rejection_reason:     Option<String>,
  pub completion_date:      Option<String>,
  pub created_at:           String,
  pub updated_at:           String,
}

impl RawApplication {
  /// Read [`APPLICATION_COLUMNS`] starting at column `at`.
  pub fn from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      application_id:       row.get(at)?,
      applicant_id:         row.get(at + 1)?,
      assigned_staff_id:    row.get(at + 2)?,
      status:               row.get(at + 3)?,
      payment_method:       row.get(at + 4)?,
      payment_amount_cents: row.get(at + 5)?,
      payment_status:       row.get(at + 6)?,
      payment_reference:    row.get(at + 7)?,
      payment_date:         row.get(at + 8)?,
      notes:                row.get(at + 9)?,
      rejection_reason:     row.get(at + 10)?,
      completion_date:      row.get(at + 11)?,
      created_at:           row.get(at + 12)?,
      updated_at:           row.get(at + 13)?,
    })
  }

  pub fn into_application(self) -> Result<Application> {
    Ok(Application {
      application_id:       decode_uuid(&self.application_id)?,
      applicant_id:         decode_uuid(&self.applicant_id)?,
      assigned_staff_id:    decode_opt_uuid(self.assigned_staff_id)?,
      status:               decode_enum(&self.status)?,
      payment_method:       decode_enum(&self.payment_method)?,
      payment_amount_cents: self.payment_amount_cents,
      payment_status:       decode_enum(&self.payment_status)?,
      payment_reference:    self.payment_reference,
      payment_date:         decode_opt_dt(self.payment_date)?,
      notes:                self.notes,
      rejection_reason:     self.rejection_reason,
      completion_date:      decode_opt_dt(self.completion_date)?,
      created_at:           decode_dt(&self.created_at)?,
      updated_at:           decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from an `applicants` row.
pub struct RawApplicant {
  pub applicant_id: String,
  pub email:        String,
  pub fiscal_code:  String,
  pub full_name:    String,
  pub phone:        Option<String>,
  pub birth_date:   Option<String>,
  pub address:      Option<String>,
  pub city:         Option<String>,
  pub postal_code:  Option<String>,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawApplicant {
  /// Read [`APPLICANT_COLUMNS`] starting at column `at`.
  pub fn from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      applicant_id: row.get(at)?,
      email:        row.get(at + 1)?,
      fiscal_code:  row.get(at + 2)?,
      full_name:    row.get(at + 3)?,
      phone:        row.get(at + 4)?,
      birth_date:   row.get(at + 5)?,
      address:      row.get(at + 6)?,
      city:         row.get(at + 7)?,
      postal_code:  row.get(at + 8)?,
      created_at:   row.get(at + 9)?,
      updated_at:   row.get(at + 10)?,
    })
  }

  pub fn into_applicant(self) -> Result<Applicant> {
    Ok(Applicant {
      applicant_id: decode_uuid(&self.applicant_id)?,
      email:        self.email,
      fiscal_code:  self.fiscal_code,
      full_name:    self.full_name,
      phone:        self.phone,
      birth_date:   self.birth_date.as_deref().map(decode_date).transpose()?,
      address:      self.address,
      city:         self.city,
      postal_code:  self.postal_code,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `staff` row.
pub struct RawStaff {
  pub staff_id:   String,
  pub username:   String,
  pub email:      String,
  pub full_name:  String,
  pub role:       String,
  pub is_active:  bool,
  pub created_at: String,
}

impl RawStaff {
  /// Read [`STAFF_COLUMNS`] starting at column 0.
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      staff_id:   row.get(0)?,
      username:   row.get(1)?,
      email:      row.get(2)?,
      full_name:  row.get(3)?,
      role:       row.get(4)?,
      is_active:  row.get(5)?,
      created_at: row.get(6)?,
    })
  }

  pub fn into_staff(self) -> Result<Staff> {
    Ok(Staff {
      staff_id:   decode_uuid(&self.staff_id)?,
      username:   self.username,
      email:      self.email,
      full_name:  self.full_name,
      role:       decode_staff_role(&self.role)?,
      is_active:  self.is_active,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// The nullable staff columns of a `LEFT JOIN staff`.
pub struct RawStaffSummary {
  pub staff_id:  Option<String>,
  pub username:  Option<String>,
  pub full_name: Option<String>,
  pub email:     Option<String>,
}

impl RawStaffSummary {
  pub fn from_row(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      staff_id:  row.get(at)?,
      username:  row.get(at + 1)?,
      full_name: row.get(at + 2)?,
      email:     row.get(at + 3)?,
    })
  }

  pub fn into_summary(self) -> Result<Option<StaffSummary>> {
    let Some(id) = self.staff_id else { return Ok(None) };
    Ok(Some(StaffSummary {
      staff_id:  decode_uuid(&id)?,
      username:  self.username.unwrap_or_default(),
      full_name: self.full_name.unwrap_or_default(),
      email:     self.email.unwrap_or_default(),
    }))
  }
}

/// An application joined with its applicant and assigned staff member.
pub struct RawDetail {
  pub application: RawApplication,
  pub applicant:   RawApplicant,
  pub staff:       RawStaffSummary,
}

impl RawDetail {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let applicant_at = APPLICATION_COLUMN_COUNT;
    let staff_at = applicant_at + APPLICANT_COLUMN_COUNT;
    Ok(Self {
      application: RawApplication::from_row(row, 0)?,
      applicant:   RawApplicant::from_row(row, applicant_at)?,
      staff:       RawStaffSummary::from_row(row, staff_at)?,
    })
  }

  pub fn into_detail(self) -> Result<ApplicationDetail> {
    Ok(ApplicationDetail {
      application:    self.application.into_application()?,
      applicant:      self.applicant.into_applicant()?,
      assigned_staff: self.staff.into_summary()?,
    })
  }
}

/// A listing row: detail columns plus the three per-application counts.
pub struct RawListingRow {
  pub detail:             RawDetail,
  pub unread_messages:    i64,
  pub documents_count:    i64,
  pub approved_documents: i64,
}

impl RawListingRow {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    let counts_at = APPLICATION_COLUMN_COUNT + APPLICANT_COLUMN_COUNT + 4;
    Ok(Self {
      detail:             RawDetail::from_row(row)?,
      unread_messages:    row.get(counts_at)?,
      documents_count:    row.get(counts_at + 1)?,
      approved_documents: row.get(counts_at + 2)?,
    })
  }

  pub fn into_row(self) -> Result<ApplicationRow> {
    let applicant = self.detail.applicant.into_applicant()?;
    Ok(ApplicationRow {
      application:        self.detail.application.into_application()?,
      applicant:          ApplicantSummary {
        applicant_id: applicant.applicant_id,
        full_name:    applicant.full_name,
        email:        applicant.email,
        phone:        applicant.phone,
        fiscal_code:  applicant.fiscal_code,
        city:         applicant.city,
      },
      assigned_staff:     self.detail.staff.into_summary()?,
      unread_messages:    to_count(self.unread_messages),
      documents_count:    to_count(self.documents_count),
      approved_documents: to_count(self.approved_documents),
    })
  }
}

/// Raw strings read directly from an `audit_log` row.
pub struct RawAuditEntry {
  pub seq:            i64,
  pub audit_id:       String,
  pub application_id: String,
  pub staff_id:       Option<String>,
  pub action:         String,
  pub entity_type:    String,
  pub entity_id:      String,
  pub old_value:      Option<String>,
  pub new_value:      Option<String>,
  pub created_at:     String,
}

impl RawAuditEntry {
  pub fn into_entry(self) -> Result<AuditEntry> {
    Ok(AuditEntry {
      audit_id:       decode_uuid(&self.audit_id)?,
      sequence:       self.seq,
      application_id: decode_uuid(&self.application_id)?,
      staff_id:       decode_opt_uuid(self.staff_id)?,
      action:         decode_enum(&self.action)?,
      entity_type:    self.entity_type,
      entity_id:      decode_uuid(&self.entity_id)?,
      old_value:      decode_json(self.old_value)?,
      new_value:      decode_json(self.new_value)?,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read from a `documents` row joined with its verifier.
pub struct RawDocument {
  pub document_id:      String,
  pub application_id:   String,
  pub document_type:    String,
  pub file_name:        String,
  pub is_approved:      bool,
  pub verified_by:      Option<String>,
  pub verified_by_name: Option<String>,
  pub uploaded_at:      String,
}

impl RawDocument {
  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      document_id:      decode_uuid(&self.document_id)?,
      application_id:   decode_uuid(&self.application_id)?,
      document_type:    self.document_type,
      file_name:        self.file_name,
      is_approved:      self.is_approved,
      verified_by:      decode_opt_uuid(self.verified_by)?,
      verified_by_name: self.verified_by_name,
      uploaded_at:      decode_dt(&self.uploaded_at)?,
    })
  }
}
