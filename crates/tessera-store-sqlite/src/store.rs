//! [`SqliteStore`], the SQLite implementation of [`ApplicationStore`].

use std::{path::Path, time::Duration};

use chrono::Utc;
use rusqlite::{
  Connection, OptionalExtension as _, Transaction, TransactionBehavior,
  params_from_iter,
};
use uuid::Uuid;

use tessera_core::{
  applicant::Applicant,
  application::{
    Application, ApplicationDetail, ApplicationRow, Submission, Submitted,
  },
  audit::AuditEntry,
  document::Document,
  lifecycle::{Assignment, StatusChange, creation_audit_entry},
  query::{ApplicationQuery, Page, Pagination},
  staff::{NewStaff, Staff},
  store::ApplicationStore,
};

use crate::{
  Error, Result, audit,
  encode::{
    APPLICANT_COLUMNS, APPLICATION_COLUMNS, RawApplicant, RawApplication,
    RawDetail, RawDocument, RawListingRow, RawStaff, STAFF_COLUMNS,
    STAFF_SUMMARY_COLUMNS, encode_date, encode_dt, encode_uuid,
  },
  listing::{CompiledQuery, search_key},
  schema::SCHEMA,
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Connection tuning.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  /// How long a statement waits for a lock held by another connection
  /// before failing with `SQLITE_BUSY`.
  pub busy_timeout: Duration,
}

impl Default for StoreOptions {
  fn default() -> Self { Self { busy_timeout: Duration::from_millis(2_000) } }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tessera store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with default options.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open_with(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init(options).await?;
    Ok(store)
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init(StoreOptions::default()).await?;
    Ok(store)
  }

  async fn init(&self, options: StoreOptions) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.busy_timeout(options.busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Collaborator-owned records ────────────────────────────────────────
  //
  // Staff accounts, documents and messages are managed by other services in
  // production; these writers exist for bootstrap and tests.

  /// Register a new, active staff member.
  pub async fn add_staff(&self, input: NewStaff) -> Result<Staff> {
    let staff = Staff {
      staff_id:   Uuid::new_v4(),
      username:   input.username,
      email:      input.email,
      full_name:  input.full_name,
      role:       input.role,
      is_active:  true,
      created_at: Utc::now(),
    };

    let id_str    = encode_uuid(staff.staff_id);
    let username  = staff.username.clone();
    let email     = staff.email.clone();
    let full_name = staff.full_name.clone();
    let role_str  = staff.role.as_str();
    let at_str    = encode_dt(staff.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO staff (staff_id, username, email, full_name, role, is_active, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
          rusqlite::params![id_str, username, email, full_name, role_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(staff)
  }

  /// Activate or deactivate a staff member. Returns `false` if not found.
  pub async fn set_staff_active(&self, staff_id: Uuid, active: bool) -> Result<bool> {
    let id_str = encode_uuid(staff_id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE staff SET is_active = ?1 WHERE staff_id = ?2",
          rusqlite::params![active, id_str],
        )?)
      })
      .await?;
    Ok(changed == 1)
  }

  /// Record document metadata against an application.
  pub async fn attach_document(&self, input: NewDocument) -> Result<Document> {
    let document = Document {
      document_id:      Uuid::new_v4(),
      application_id:   input.application_id,
      document_type:    input.document_type,
      file_name:        input.file_name,
      is_approved:      input.is_approved,
      verified_by:      input.verified_by,
      verified_by_name: None,
      uploaded_at:      Utc::now(),
    };

    let doc_id_str    = encode_uuid(document.document_id);
    let app_id_str    = encode_uuid(document.application_id);
    let document_type = document.document_type.clone();
    let file_name     = document.file_name.clone();
    let is_approved   = document.is_approved;
    let verified_by   = document.verified_by.map(encode_uuid);
    let at_str        = encode_dt(document.uploaded_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO documents (
             document_id, application_id, document_type, file_name,
             is_approved, verified_by, uploaded_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            doc_id_str,
            app_id_str,
            document_type,
            file_name,
            is_approved,
            verified_by,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(document)
  }

  /// Record a chat message on an application.
  pub async fn post_message(&self, input: NewMessage) -> Result<Uuid> {
    let message_id = Uuid::new_v4();
    let msg_id_str = encode_uuid(message_id);
    let app_id_str = encode_uuid(input.application_id);
    let sender     = input.sender_type.as_str();
    let at_str     = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO messages (message_id, application_id, sender_type, body, is_read, sent_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            msg_id_str,
            app_id_str,
            sender,
            input.body,
            input.is_read,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(message_id)
  }

  /// Retrieve an applicant by UUID. Returns `None` if not found.
  pub async fn get_applicant(&self, applicant_id: Uuid) -> Result<Option<Applicant>> {
    let id_str = encode_uuid(applicant_id);

    let raw: Option<RawApplicant> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {APPLICANT_COLUMNS} FROM applicants a WHERE a.applicant_id = ?1"),
              rusqlite::params![id_str],
              |row| RawApplicant::from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawApplicant::into_applicant).transpose()
  }
}

/// Input to [`SqliteStore::attach_document`].
#[derive(Debug, Clone)]
pub struct NewDocument {
  pub application_id: Uuid,
  pub document_type:  String,
  pub file_name:      String,
  pub is_approved:    bool,
  pub verified_by:    Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderType {
  Applicant,
  Staff,
}

impl SenderType {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Applicant => "applicant",
      Self::Staff => "staff",
    }
  }
}

/// Input to [`SqliteStore::post_message`].
#[derive(Debug, Clone)]
pub struct NewMessage {
  pub application_id: Uuid,
  pub sender_type:    SenderType,
  pub body:           String,
  pub is_read:        bool,
}

// ─── Transaction bodies ──────────────────────────────────────────────────────
//
// Each runs on the connection thread inside one `BEGIN IMMEDIATE`
// transaction, so reads-for-diff happen under the write lock. Returning early
// drops `tx`, which rolls back.

fn begin(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
  conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

fn submit_in(conn: &mut Connection, submission: Submission) -> Result<Submitted> {
  let tx = begin(conn)?;
  let now = Utc::now();
  let Submission { applicant: profile, payment_method } = submission;

  let existing: Option<RawApplicant> = tx
    .query_row(
      &format!(
        "SELECT {APPLICANT_COLUMNS} FROM applicants a
         WHERE a.email = ?1 OR a.fiscal_code = ?2
         ORDER BY a.created_at
         LIMIT 1"
      ),
      rusqlite::params![profile.email, profile.fiscal_code],
      |row| RawApplicant::from_row(row, 0),
    )
    .optional()?;

  let (applicant_id, created_applicant) = match existing {
    Some(raw) => {
      let mut applicant = raw.into_applicant()?;
      profile.overwrite(&mut applicant, now);
      update_applicant_profile(&tx, &applicant)?;
      (applicant.applicant_id, false)
    }
    None => {
      let applicant = profile.into_applicant(now);
      insert_applicant(&tx, &applicant).map_err(duplicate_or_database)?;
      (applicant.applicant_id, true)
    }
  };

  let application = Application::new_pending(applicant_id, payment_method, now);
  insert_application(&tx, &application)?;
  audit::append(&tx, &creation_audit_entry(&application)?)?;

  tx.commit()?;
  Ok(Submitted { application, applicant_id, created_applicant })
}

fn change_status_in(
  conn: &mut Connection,
  application_id: Uuid,
  change: StatusChange,
  actor: Uuid,
) -> Result<Application> {
  let tx = begin(conn)?;
  let current = load_application(&tx, application_id)?
    .ok_or(tessera_core::Error::ApplicationNotFound(application_id))?;

  let now = Utc::now();
  let next = change.apply(&current, now);
  update_application(&tx, &next)?;
  audit::append(&tx, &change.audit_entry(&current, actor, now))?;

  tx.commit()?;
  Ok(next)
}

fn assign_in(
  conn: &mut Connection,
  application_id: Uuid,
  assignment: Assignment,
) -> Result<Application> {
  let tx = begin(conn)?;

  let target_active: bool = tx
    .query_row(
      "SELECT is_active FROM staff WHERE staff_id = ?1",
      rusqlite::params![encode_uuid(assignment.staff_id)],
      |row| row.get(0),
    )
    .optional()?
    .unwrap_or(false);
  if !target_active {
    return Err(tessera_core::Error::InvalidStaff(assignment.staff_id).into());
  }

  let current = load_application(&tx, application_id)?
    .ok_or(tessera_core::Error::ApplicationNotFound(application_id))?;

  let now = Utc::now();
  let next = assignment.apply(&current, now);
  update_application(&tx, &next)?;
  audit::append(&tx, &assignment.audit_entry(&current, now))?;

  tx.commit()?;
  Ok(next)
}

// ─── Row writers ─────────────────────────────────────────────────────────────

fn load_application(conn: &Connection, application_id: Uuid) -> Result<Option<Application>> {
  let raw: Option<RawApplication> = conn
    .query_row(
      &format!("SELECT {APPLICATION_COLUMNS} FROM applications t WHERE t.application_id = ?1"),
      rusqlite::params![encode_uuid(application_id)],
      |row| RawApplication::from_row(row, 0),
    )
    .optional()?;
  raw.map(RawApplication::into_application).transpose()
}

fn insert_applicant(tx: &Transaction<'_>, a: &Applicant) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO applicants (
       applicant_id, email, fiscal_code, full_name, phone, birth_date,
       address, city, postal_code, search_key, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    rusqlite::params![
      encode_uuid(a.applicant_id),
      a.email,
      a.fiscal_code,
      a.full_name,
      a.phone,
      a.birth_date.map(encode_date),
      a.address,
      a.city,
      a.postal_code,
      search_key(a),
      encode_dt(a.created_at),
      encode_dt(a.updated_at),
    ],
  )?;
  Ok(())
}

fn update_applicant_profile(tx: &Transaction<'_>, a: &Applicant) -> rusqlite::Result<()> {
  tx.execute(
    "UPDATE applicants SET
       full_name = ?1, phone = ?2, birth_date = ?3, address = ?4,
       city = ?5, postal_code = ?6, search_key = ?7, updated_at = ?8
     WHERE applicant_id = ?9",
    rusqlite::params![
      a.full_name,
      a.phone,
      a.birth_date.map(encode_date),
      a.address,
      a.city,
      a.postal_code,
      search_key(a),
      encode_dt(a.updated_at),
      encode_uuid(a.applicant_id),
    ],
  )?;
  Ok(())
}

fn insert_application(tx: &Transaction<'_>, t: &Application) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO applications (
       application_id, applicant_id, assigned_staff_id, status,
       payment_method, payment_amount_cents, payment_status,
       payment_reference, payment_date, notes, rejection_reason,
       completion_date, created_at, updated_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
    rusqlite::params![
      encode_uuid(t.application_id),
      encode_uuid(t.applicant_id),
      t.assigned_staff_id.map(encode_uuid),
      t.status.as_str(),
      t.payment_method.as_str(),
      t.payment_amount_cents,
      t.payment_status.as_str(),
      t.payment_reference,
      t.payment_date.map(encode_dt),
      t.notes,
      t.rejection_reason,
      t.completion_date.map(encode_dt),
      encode_dt(t.created_at),
      encode_dt(t.updated_at),
    ],
  )?;
  Ok(())
}

/// Write the fields the lifecycle engine may change.
fn update_application(tx: &Transaction<'_>, t: &Application) -> rusqlite::Result<()> {
  tx.execute(
    "UPDATE applications SET
       assigned_staff_id = ?1, status = ?2, notes = ?3,
       rejection_reason = ?4, completion_date = ?5, updated_at = ?6
     WHERE application_id = ?7",
    rusqlite::params![
      t.assigned_staff_id.map(encode_uuid),
      t.status.as_str(),
      t.notes,
      t.rejection_reason,
      t.completion_date.map(encode_dt),
      encode_dt(t.updated_at),
      encode_uuid(t.application_id),
    ],
  )?;
  Ok(())
}

/// Map a UNIQUE violation on the applicant dedup keys to
/// [`tessera_core::Error::DuplicateApplicant`].
fn duplicate_or_database(err: rusqlite::Error) -> Error {
  match &err {
    rusqlite::Error::SqliteFailure(e, _)
      if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
    {
      tessera_core::Error::DuplicateApplicant.into()
    }
    _ => Error::Sqlite(err),
  }
}

// ─── ApplicationStore impl ───────────────────────────────────────────────────

impl ApplicationStore for SqliteStore {
  type Error = Error;

  // ── Mutations ─────────────────────────────────────────────────────────────

  async fn submit(&self, submission: Submission) -> Result<Submitted> {
    self
      .conn
      .call(move |conn| Ok(submit_in(conn, submission)))
      .await?
  }

  async fn change_status(
    &self,
    application_id: Uuid,
    change: StatusChange,
    actor: Uuid,
  ) -> Result<Application> {
    self
      .conn
      .call(move |conn| Ok(change_status_in(conn, application_id, change, actor)))
      .await?
  }

  async fn assign(&self, application_id: Uuid, assignment: Assignment) -> Result<Application> {
    self
      .conn
      .call(move |conn| Ok(assign_in(conn, application_id, assignment)))
      .await?
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_application(&self, application_id: Uuid) -> Result<Option<ApplicationDetail>> {
    let id_str = encode_uuid(application_id);

    let raw: Option<RawDetail> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {APPLICATION_COLUMNS}, {APPLICANT_COLUMNS}, {STAFF_SUMMARY_COLUMNS}
                 FROM applications t
                 JOIN applicants a ON a.applicant_id = t.applicant_id
                 LEFT JOIN staff s ON s.staff_id = t.assigned_staff_id
                 WHERE t.application_id = ?1"
              ),
              rusqlite::params![id_str],
              RawDetail::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDetail::into_detail).transpose()
  }

  async fn list_documents(&self, application_id: Uuid) -> Result<Vec<Document>> {
    let id_str = encode_uuid(application_id);

    let raws: Vec<RawDocument> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT d.document_id, d.application_id, d.document_type, d.file_name,
                  d.is_approved, d.verified_by, vs.full_name, d.uploaded_at
           FROM documents d
           LEFT JOIN staff vs ON vs.staff_id = d.verified_by
           WHERE d.application_id = ?1
           ORDER BY d.uploaded_at DESC, d.rowid DESC",
        )?;

        let rows = stmt
          .query_map(rusqlite::params![id_str], |row| {
            Ok(RawDocument {
              document_id:      row.get(0)?,
              application_id:   row.get(1)?,
              document_type:    row.get(2)?,
              file_name:        row.get(3)?,
              is_approved:      row.get(4)?,
              verified_by:      row.get(5)?,
              verified_by_name: row.get(6)?,
              uploaded_at:      row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDocument::into_document).collect()
  }

  async fn list_applications(&self, query: &ApplicationQuery) -> Result<Page<ApplicationRow>> {
    let compiled = CompiledQuery::compile(query);
    let (page_sql, page_params) = compiled.page_statement();
    let (count_sql, count_params) = compiled.count_statement();

    // Data page and total count are independent reads; no shared transaction.
    let rows = self.conn.call(move |conn| {
      let mut stmt = conn.prepare(&page_sql)?;
      let rows = stmt
        .query_map(params_from_iter(page_params), RawListingRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    });
    let count = self.conn.call(move |conn| {
      Ok(conn.query_row(&count_sql, params_from_iter(count_params), |row| {
        row.get::<_, i64>(0)
      })?)
    });
    let (raws, total) = tokio::try_join!(rows, count)?;

    let items = raws
      .into_iter()
      .map(RawListingRow::into_row)
      .collect::<Result<Vec<_>>>()?;
    let total_items = u64::try_from(total).unwrap_or_default();

    Ok(Page { items, pagination: Pagination::new(query, total_items) })
  }

  async fn audit_trail(&self, application_id: Uuid) -> Result<Vec<AuditEntry>> {
    let id_str = encode_uuid(application_id);
    let raws = self
      .conn
      .call(move |conn| Ok(audit::list_for(conn, &id_str)?))
      .await?;
    raws.into_iter().map(|raw| raw.into_entry()).collect()
  }

  async fn get_staff(&self, staff_id: Uuid) -> Result<Option<Staff>> {
    let id_str = encode_uuid(staff_id);

    let raw: Option<RawStaff> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {STAFF_COLUMNS} FROM staff s WHERE s.staff_id = ?1"),
              rusqlite::params![id_str],
              RawStaff::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawStaff::into_staff).transpose()
  }
}

#[cfg(test)]
mod tests {
  use tessera_core::applicant::ApplicantProfile;

  use super::*;

  #[test]
  fn unique_violation_on_applicant_is_duplicate() {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    let tx = begin(&mut conn).unwrap();

    let profile = ApplicantProfile {
      email:       "dup@x.com".into(),
      fiscal_code: "DUP001".into(),
      full_name:   "Dup".into(),
      phone:       None,
      birth_date:  None,
      address:     None,
      city:        None,
      postal_code: None,
    };
    insert_applicant(&tx, &profile.clone().into_applicant(Utc::now())).unwrap();
    let err = insert_applicant(&tx, &profile.into_applicant(Utc::now()))
      .map_err(duplicate_or_database)
      .unwrap_err();

    assert!(matches!(
      tessera_core::Error::from(err),
      tessera_core::Error::DuplicateApplicant
    ));
  }
}
