//! The audit recorder.
//!
//! `append` takes the caller's open [`Transaction`], so an entry can only be
//! written as part of the mutation it describes and disappears with it on
//! rollback. Entries are read back most recent first; the `seq` column breaks
//! ties between equal timestamps in insertion order.

use rusqlite::{Connection, Transaction};
use tessera_core::audit::NewAuditEntry;

use crate::encode::{RawAuditEntry, encode_dt, encode_json, encode_uuid};

/// Append `entry` inside `tx`. Returns the assigned insertion sequence.
pub fn append(tx: &Transaction<'_>, entry: &NewAuditEntry) -> rusqlite::Result<i64> {
  tx.execute(
    "INSERT INTO audit_log (
       audit_id, application_id, staff_id, action, entity_type, entity_id,
       old_value, new_value, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    rusqlite::params![
      encode_uuid(entry.audit_id),
      encode_uuid(entry.application_id),
      entry.staff_id.map(encode_uuid),
      entry.action.as_str(),
      entry.entity_type,
      encode_uuid(entry.entity_id),
      encode_json(entry.old_value.as_ref()),
      encode_json(entry.new_value.as_ref()),
      encode_dt(entry.created_at),
    ],
  )?;
  Ok(tx.last_insert_rowid())
}

/// All entries for `application_id`, most recent first.
pub fn list_for(
  conn: &Connection,
  application_id: &str,
) -> rusqlite::Result<Vec<RawAuditEntry>> {
  let mut stmt = conn.prepare(
    "SELECT seq, audit_id, application_id, staff_id, action, entity_type,
            entity_id, old_value, new_value, created_at
     FROM audit_log
     WHERE application_id = ?1
     ORDER BY created_at DESC, seq DESC",
  )?;

  stmt
    .query_map(rusqlite::params![application_id], |row| {
      Ok(RawAuditEntry {
        seq:            row.get(0)?,
        audit_id:       row.get(1)?,
        application_id: row.get(2)?,
        staff_id:       row.get(3)?,
        action:         row.get(4)?,
        entity_type:    row.get(5)?,
        entity_id:      row.get(6)?,
        old_value:      row.get(7)?,
        new_value:      row.get(8)?,
        created_at:     row.get(9)?,
      })
    })?
    .collect()
}
