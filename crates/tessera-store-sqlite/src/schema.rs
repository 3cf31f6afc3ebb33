//! SQL schema for the Tessera SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS applicants (
    applicant_id TEXT PRIMARY KEY,
    email        TEXT NOT NULL UNIQUE,
    fiscal_code  TEXT NOT NULL UNIQUE,
    full_name    TEXT NOT NULL,
    phone        TEXT,
    birth_date   TEXT,             -- ISO 8601 calendar date
    address      TEXT,
    city         TEXT,
    postal_code  TEXT,
    search_key   TEXT NOT NULL,    -- lowercased name, email and fiscal code
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS staff (
    staff_id   TEXT PRIMARY KEY,
    username   TEXT NOT NULL UNIQUE,
    email      TEXT NOT NULL UNIQUE,
    full_name  TEXT NOT NULL,
    role       TEXT NOT NULL,      -- 'admin' | 'staff'
    is_active  INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS applications (
    application_id       TEXT PRIMARY KEY,
    applicant_id         TEXT NOT NULL REFERENCES applicants(applicant_id),
    assigned_staff_id    TEXT REFERENCES staff(staff_id),
    status               TEXT NOT NULL DEFAULT 'pending',
    payment_method       TEXT NOT NULL,
    payment_amount_cents INTEGER NOT NULL,
    payment_status       TEXT NOT NULL DEFAULT 'unset',
    payment_reference    TEXT,
    payment_date         TEXT,
    notes                TEXT,
    rejection_reason     TEXT,
    completion_date      TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL,
    CHECK (rejection_reason IS NULL OR status = 'rejected')
);

-- Strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS audit_log (
    seq            INTEGER PRIMARY KEY AUTOINCREMENT,
    audit_id       TEXT NOT NULL UNIQUE,
    application_id TEXT NOT NULL REFERENCES applications(application_id),
    staff_id       TEXT REFERENCES staff(staff_id),
    action         TEXT NOT NULL,  -- 'created' | 'status_changed' | 'assigned'
    entity_type    TEXT NOT NULL,
    entity_id      TEXT NOT NULL,
    old_value      TEXT,           -- JSON snapshot or NULL
    new_value      TEXT,           -- JSON snapshot or NULL
    created_at     TEXT NOT NULL
);

-- Written by the document service; read-only here.
CREATE TABLE IF NOT EXISTS documents (
    document_id    TEXT PRIMARY KEY,
    application_id TEXT NOT NULL REFERENCES applications(application_id),
    document_type  TEXT NOT NULL,
    file_name      TEXT NOT NULL,
    is_approved    INTEGER NOT NULL DEFAULT 0,
    verified_by    TEXT REFERENCES staff(staff_id),
    uploaded_at    TEXT NOT NULL
);

-- Written by the chat service; only counted here.
CREATE TABLE IF NOT EXISTS messages (
    message_id     TEXT PRIMARY KEY,
    application_id TEXT NOT NULL REFERENCES applications(application_id),
    sender_type    TEXT NOT NULL,  -- 'applicant' | 'staff'
    body           TEXT NOT NULL,
    is_read        INTEGER NOT NULL DEFAULT 0,
    sent_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS applications_status_idx   ON applications(status);
CREATE INDEX IF NOT EXISTS applications_staff_idx    ON applications(assigned_staff_id);
CREATE INDEX IF NOT EXISTS applications_created_idx  ON applications(created_at);
CREATE INDEX IF NOT EXISTS audit_application_idx     ON audit_log(application_id, created_at);
CREATE INDEX IF NOT EXISTS documents_application_idx ON documents(application_id);
CREATE INDEX IF NOT EXISTS messages_application_idx  ON messages(application_id, is_read);

PRAGMA user_version = 1;
";
