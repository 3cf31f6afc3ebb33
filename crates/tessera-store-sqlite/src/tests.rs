//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use serde_json::json;
use tessera_core::{
  Lifecycle,
  applicant::ApplicantProfile,
  application::{ApplicationStatus, PaymentMethod, PaymentStatus, Submission},
  audit::AuditAction,
  lifecycle::{Assignment, StatusChange},
  query::{ApplicationQuery, SortColumn, SortOrder},
  staff::{NewStaff, Staff, StaffRole},
  store::ApplicationStore,
};
use uuid::Uuid;

use crate::{NewDocument, NewMessage, SenderType, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn count_rows(s: &SqliteStore, table: &'static str) -> i64 {
  s.conn
    .call(move |conn| {
      Ok(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))?)
    })
    .await
    .unwrap()
}

fn profile(email: &str, fiscal_code: &str, full_name: &str) -> ApplicantProfile {
  ApplicantProfile {
    email:       email.into(),
    fiscal_code: fiscal_code.into(),
    full_name:   full_name.into(),
    phone:       Some("+39 011 555 0101".into()),
    birth_date:  NaiveDate::from_ymd_opt(1988, 11, 23),
    address:     Some("Via Roma 1".into()),
    city:        Some("Torino".into()),
    postal_code: Some("10121".into()),
  }
}

fn submission(email: &str, fiscal_code: &str, full_name: &str) -> Submission {
  Submission {
    applicant:      profile(email, fiscal_code, full_name),
    payment_method: PaymentMethod::BankTransfer,
  }
}

async fn staff_member(s: &SqliteStore, username: &str) -> Staff {
  s.add_staff(NewStaff {
    username:  username.into(),
    email:     format!("{username}@example.org"),
    full_name: format!("Staff {username}"),
    role:      StaffRole::Staff,
  })
  .await
  .unwrap()
}

// ─── Submission ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn submit_new_applicant() {
  let s = store().await;

  let submitted = s.submit(submission("a@x.com", "ABC123", "Anna Rossi")).await.unwrap();
  assert!(submitted.created_applicant);
  assert_eq!(submitted.application.status, ApplicationStatus::Pending);
  assert_eq!(submitted.application.payment_status, PaymentStatus::Unset);
  assert_eq!(submitted.application.payment_amount_cents, 5_000);
  assert_eq!(submitted.application.applicant_id, submitted.applicant_id);

  assert_eq!(count_rows(&s, "applicants").await, 1);
  assert_eq!(count_rows(&s, "applications").await, 1);

  let trail = s.audit_trail(submitted.application.application_id).await.unwrap();
  assert_eq!(trail.len(), 1);
  assert_eq!(trail[0].action, AuditAction::Created);
  assert_eq!(trail[0].staff_id, None);
  assert!(trail[0].old_value.is_none());
  let snapshot = trail[0].new_value.as_ref().unwrap();
  assert_eq!(snapshot["status"], "pending");
  assert_eq!(
    snapshot["application_id"],
    json!(submitted.application.application_id)
  );
}

#[tokio::test]
async fn submit_matching_email_reuses_applicant() {
  let s = store().await;
  let first = s.submit(submission("a@x.com", "ABC123", "Anna Rossi")).await.unwrap();

  let mut again = submission("a@x.com", "ZZZ999", "Anna Maria Rossi");
  again.applicant.city = Some("Milano".into());
  let second = s.submit(again).await.unwrap();

  assert!(!second.created_applicant);
  assert_eq!(second.applicant_id, first.applicant_id);
  assert_ne!(
    second.application.application_id,
    first.application.application_id
  );
  assert_eq!(count_rows(&s, "applicants").await, 1);
  assert_eq!(count_rows(&s, "applications").await, 2);
  assert_eq!(count_rows(&s, "audit_log").await, 2);

  let applicant = s.get_applicant(first.applicant_id).await.unwrap().unwrap();
  assert_eq!(applicant.full_name, "Anna Maria Rossi");
  assert_eq!(applicant.city.as_deref(), Some("Milano"));
  // Dedup keys are never rewritten.
  assert_eq!(applicant.fiscal_code, "ABC123");
}

#[tokio::test]
async fn submit_matching_fiscal_code_reuses_applicant() {
  let s = store().await;
  let first = s.submit(submission("a@x.com", "ABC123", "Anna Rossi")).await.unwrap();
  let second = s.submit(submission("anna@new.com", "ABC123", "Anna Rossi")).await.unwrap();

  assert_eq!(second.applicant_id, first.applicant_id);
  assert_eq!(count_rows(&s, "applicants").await, 1);
  let applicant = s.get_applicant(first.applicant_id).await.unwrap().unwrap();
  assert_eq!(applicant.email, "a@x.com");
}

// ─── Status changes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn review_then_reject_scenario() {
  let s = store().await;
  let reviewer = staff_member(&s, "reviewer").await;
  let id = s
    .submit(submission("a@x.com", "ABC123", "Anna Rossi"))
    .await
    .unwrap()
    .application
    .application_id;

  let in_review = s
    .change_status(id, StatusChange::new(ApplicationStatus::InReview), reviewer.staff_id)
    .await
    .unwrap();
  assert_eq!(in_review.status, ApplicationStatus::InReview);
  assert_eq!(in_review.rejection_reason, None);

  let rejected = s
    .change_status(
      id,
      StatusChange::new(ApplicationStatus::Rejected)
        .with_rejection_reason("incomplete documents"),
      reviewer.staff_id,
    )
    .await
    .unwrap();
  assert_eq!(rejected.status, ApplicationStatus::Rejected);
  assert_eq!(rejected.rejection_reason.as_deref(), Some("incomplete documents"));

  // Most recent first.
  let trail = s.audit_trail(id).await.unwrap();
  let actions: Vec<_> = trail.iter().map(|e| e.action).collect();
  assert_eq!(
    actions,
    vec![AuditAction::StatusChanged, AuditAction::StatusChanged, AuditAction::Created]
  );
  assert!(trail[0].sequence > trail[1].sequence);
  assert_eq!(trail[0].staff_id, Some(reviewer.staff_id));
  assert_eq!(trail[0].old_value, Some(json!({ "status": "in_review" })));
  assert_eq!(
    trail[0].new_value,
    Some(json!({
      "status": "rejected",
      "notes": null,
      "rejection_reason": "incomplete documents",
    }))
  );
  assert_eq!(trail[1].old_value, Some(json!({ "status": "pending" })));

  let stored = s.get_application(id).await.unwrap().unwrap();
  assert_eq!(stored.application, rejected);
}

#[tokio::test]
async fn completion_date_survives_later_transitions() {
  let s = store().await;
  let reviewer = staff_member(&s, "reviewer").await;
  let id = s
    .submit(submission("b@x.com", "DEF456", "Bruno Neri"))
    .await
    .unwrap()
    .application
    .application_id;

  let completed = s
    .change_status(id, StatusChange::new(ApplicationStatus::Completed), reviewer.staff_id)
    .await
    .unwrap();
  let stamped = completed.completion_date.expect("completion date");
  assert_eq!(stamped, completed.updated_at);

  let reopened = s
    .change_status(id, StatusChange::new(ApplicationStatus::InReview), reviewer.staff_id)
    .await
    .unwrap();
  assert_eq!(reopened.completion_date, Some(stamped));

  let stored = s.get_application(id).await.unwrap().unwrap();
  assert_eq!(stored.application.completion_date, Some(stamped));
}

#[tokio::test]
async fn change_status_missing_application_writes_nothing() {
  let s = store().await;
  let reviewer = staff_member(&s, "reviewer").await;
  let missing = Uuid::new_v4();

  let err = s
    .change_status(missing, StatusChange::new(ApplicationStatus::InReview), reviewer.staff_id)
    .await
    .unwrap_err();
  assert!(matches!(
    tessera_core::Error::from(err),
    tessera_core::Error::ApplicationNotFound(id) if id == missing
  ));
  assert_eq!(count_rows(&s, "audit_log").await, 0);
}

#[tokio::test]
async fn concurrent_changes_audit_the_overwritten_state() {
  let s = store().await;
  let a = staff_member(&s, "alpha").await;
  let b = staff_member(&s, "beta").await;
  let id = s
    .submit(submission("c@x.com", "GHI789", "Carla Blu"))
    .await
    .unwrap()
    .application
    .application_id;

  let (first, second) = tokio::join!(
    s.change_status(id, StatusChange::new(ApplicationStatus::InReview), a.staff_id),
    s.change_status(id, StatusChange::new(ApplicationStatus::Completed), b.staff_id),
  );
  first.unwrap();
  second.unwrap();

  let trail = s.audit_trail(id).await.unwrap();
  assert_eq!(trail.len(), 3);
  // Whichever committed last saw the other's status as its old value.
  let (latest, earlier) = (&trail[0], &trail[1]);
  assert_eq!(earlier.old_value, Some(json!({ "status": "pending" })));
  assert_eq!(
    latest.old_value.as_ref().unwrap()["status"],
    earlier.new_value.as_ref().unwrap()["status"]
  );

  let stored = s.get_application(id).await.unwrap().unwrap();
  assert_eq!(
    json!(stored.application.status),
    latest.new_value.as_ref().unwrap()["status"]
  );
}

// ─── Assignment ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn assign_active_staff() {
  let s = store().await;
  let admin = staff_member(&s, "admin").await;
  let target = staff_member(&s, "target").await;
  let id = s
    .submit(submission("d@x.com", "JKL012", "Dario Gialli"))
    .await
    .unwrap()
    .application
    .application_id;

  let assigned = s
    .assign(id, Assignment { staff_id: target.staff_id, assigned_by: admin.staff_id })
    .await
    .unwrap();
  assert_eq!(assigned.assigned_staff_id, Some(target.staff_id));

  let trail = s.audit_trail(id).await.unwrap();
  assert_eq!(trail[0].action, AuditAction::Assigned);
  assert_eq!(trail[0].staff_id, Some(admin.staff_id));
  assert_eq!(
    trail[0].new_value,
    Some(json!({ "assigned_to": target.staff_id, "assigned_by": admin.staff_id }))
  );

  let detail = s.get_application(id).await.unwrap().unwrap();
  let summary = detail.assigned_staff.unwrap();
  assert_eq!(summary.staff_id, target.staff_id);
  assert_eq!(summary.username, "target");
}

#[tokio::test]
async fn assign_inactive_or_unknown_staff_is_rejected() {
  let s = store().await;
  let admin = staff_member(&s, "admin").await;
  let retired = staff_member(&s, "retired").await;
  assert!(s.set_staff_active(retired.staff_id, false).await.unwrap());
  let id = s
    .submit(submission("e@x.com", "MNO345", "Elena Viola"))
    .await
    .unwrap()
    .application
    .application_id;

  for target in [retired.staff_id, Uuid::new_v4()] {
    let err = s
      .assign(id, Assignment { staff_id: target, assigned_by: admin.staff_id })
      .await
      .unwrap_err();
    assert!(matches!(
      tessera_core::Error::from(err),
      tessera_core::Error::InvalidStaff(t) if t == target
    ));
  }

  assert_eq!(count_rows(&s, "audit_log").await, 1);
  let stored = s.get_application(id).await.unwrap().unwrap();
  assert_eq!(stored.application.assigned_staff_id, None);
}

#[tokio::test]
async fn assign_missing_application_is_not_found() {
  let s = store().await;
  let admin = staff_member(&s, "admin").await;
  let err = s
    .assign(Uuid::new_v4(), Assignment { staff_id: admin.staff_id, assigned_by: admin.staff_id })
    .await
    .unwrap_err();
  assert!(matches!(
    tessera_core::Error::from(err),
    tessera_core::Error::ApplicationNotFound(_)
  ));
}

// ─── Reads ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn detail_includes_documents_newest_first() {
  let s = store().await;
  let verifier = staff_member(&s, "verifier").await;
  let id = s
    .submit(submission("f@x.com", "PQR678", "Franco Rosa"))
    .await
    .unwrap()
    .application
    .application_id;

  s.attach_document(NewDocument {
    application_id: id,
    document_type:  "identity_card".into(),
    file_name:      "id.pdf".into(),
    is_approved:    true,
    verified_by:    Some(verifier.staff_id),
  })
  .await
  .unwrap();
  s.attach_document(NewDocument {
    application_id: id,
    document_type:  "medical_certificate".into(),
    file_name:      "cert.pdf".into(),
    is_approved:    false,
    verified_by:    None,
  })
  .await
  .unwrap();

  let engine = Lifecycle::new(std::sync::Arc::new(s));
  let (detail, documents) = engine.get(id).await.unwrap();
  assert_eq!(detail.applicant.email, "f@x.com");
  assert!(detail.assigned_staff.is_none());
  assert_eq!(documents.len(), 2);
  assert_eq!(documents[0].file_name, "cert.pdf");
  assert_eq!(documents[1].verified_by_name.as_deref(), Some("Staff verifier"));
}

#[tokio::test]
async fn missing_application_detail_is_none() {
  let s = store().await;
  assert!(s.get_application(Uuid::new_v4()).await.unwrap().is_none());
  assert!(s.get_staff(Uuid::new_v4()).await.unwrap().is_none());
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn third_page_of_forty_five() {
  let s = store().await;
  for i in 0..45 {
    s.submit(submission(&format!("p{i}@x.com"), &format!("FC{i:03}"), "Page Filler"))
      .await
      .unwrap();
  }

  let query = ApplicationQuery::default().with_page(3).with_limit(20);
  let page = s.list_applications(&query).await.unwrap();
  assert_eq!(page.items.len(), 5);
  assert_eq!(page.pagination.current_page, 3);
  assert_eq!(page.pagination.total_items, 45);
  assert_eq!(page.pagination.total_pages, 3);
  assert_eq!(page.pagination.items_per_page, 20);
  assert!(!page.pagination.has_next);
  assert!(page.pagination.has_prev);
}

#[tokio::test]
async fn unknown_sort_key_lists_newest_first() {
  let s = store().await;
  let older = s.submit(submission("old@x.com", "OLD001", "Old")).await.unwrap();
  let newer = s.submit(submission("new@x.com", "NEW001", "New")).await.unwrap();

  let mut query = ApplicationQuery::default();
  query.sort_by = SortColumn::parse("password");
  query.sort_order = SortOrder::parse("DESC");
  let page = s.list_applications(&query).await.unwrap();

  let ids: Vec<_> = page.items.iter().map(|r| r.application.application_id).collect();
  assert_eq!(
    ids,
    vec![newer.application.application_id, older.application.application_id]
  );
}

#[tokio::test]
async fn sort_by_full_name_ascending() {
  let s = store().await;
  for (email, fc, name) in [
    ("z@x.com", "Z1", "zoe Verdi"),
    ("a@x.com", "A1", "Alba Neri"),
    ("m@x.com", "M1", "Mario Bianchi"),
  ] {
    s.submit(submission(email, fc, name)).await.unwrap();
  }

  let mut query = ApplicationQuery::default();
  query.sort_by = SortColumn::FullName;
  query.sort_order = SortOrder::Asc;
  let page = s.list_applications(&query).await.unwrap();
  let names: Vec<_> = page.items.iter().map(|r| r.applicant.full_name.as_str()).collect();
  assert_eq!(names, vec!["Alba Neri", "Mario Bianchi", "zoe Verdi"]);
}

#[tokio::test]
async fn filters_combine_conjunctively() {
  let s = store().await;
  let reviewer = staff_member(&s, "reviewer").await;

  let rossi = s.submit(submission("anna@x.com", "R1", "Anna Rossi")).await.unwrap();
  let rossini = s.submit(submission("luca@x.com", "R2", "Luca Rossini")).await.unwrap();
  s.submit(submission("gino@x.com", "B1", "Gino Bianchi")).await.unwrap();

  for id in [rossi.application.application_id, rossini.application.application_id] {
    s.change_status(id, StatusChange::new(ApplicationStatus::InReview), reviewer.staff_id)
      .await
      .unwrap();
  }
  s.assign(
    rossi.application.application_id,
    Assignment { staff_id: reviewer.staff_id, assigned_by: reviewer.staff_id },
  )
  .await
  .unwrap();

  // Case-insensitive substring over name.
  let mut query = ApplicationQuery::default();
  query.search = Some("ROSS".into());
  assert_eq!(s.list_applications(&query).await.unwrap().pagination.total_items, 2);

  query.status = Some(ApplicationStatus::InReview);
  query.assigned_staff_id = Some(reviewer.staff_id);
  let page = s.list_applications(&query).await.unwrap();
  assert_eq!(page.pagination.total_items, 1);
  assert_eq!(page.items[0].application.application_id, rossi.application.application_id);
  assert_eq!(
    page.items[0].assigned_staff.as_ref().map(|s| s.staff_id),
    Some(reviewer.staff_id)
  );

  // Fiscal code and email are searched too.
  let mut query = ApplicationQuery::default();
  query.search = Some("b1".into());
  assert_eq!(s.list_applications(&query).await.unwrap().pagination.total_items, 1);
  query.search = Some("luca@".into());
  assert_eq!(s.list_applications(&query).await.unwrap().pagination.total_items, 1);

  let mut query = ApplicationQuery::default();
  query.payment_status = Some(PaymentStatus::Paid);
  assert_eq!(s.list_applications(&query).await.unwrap().pagination.total_items, 0);

  // LIKE wildcards in the term match literally.
  let mut query = ApplicationQuery::default();
  query.search = Some("%".into());
  assert_eq!(s.list_applications(&query).await.unwrap().pagination.total_items, 0);
}

#[tokio::test]
async fn search_folds_accented_letters() {
  let s = store().await;
  let submitted = s
    .submit(submission("nicolo@x.com", "NCLRCL80A01L219X", "Nicolò Èrcole"))
    .await
    .unwrap();
  s.submit(submission("anna@x.com", "R1", "Anna Rossi")).await.unwrap();

  for term in ["èrcole", "ÈRCOLE", "NICOLÒ", "nicolò èrcole", "nclrcl80"] {
    let mut query = ApplicationQuery::default();
    query.search = Some(term.into());
    let page = s.list_applications(&query).await.unwrap();
    assert_eq!(page.pagination.total_items, 1, "search {term:?}");
    assert_eq!(page.items[0].application.application_id, submitted.application.application_id);
  }

  // A resubmission renames the applicant; the old name no longer matches.
  s.submit(submission("nicolo@x.com", "NCLRCL80A01L219X", "Nicolò Ågren"))
    .await
    .unwrap();
  let mut query = ApplicationQuery::default();
  query.search = Some("ÅGREN".into());
  assert_eq!(s.list_applications(&query).await.unwrap().pagination.total_items, 2);
  query.search = Some("èrcole".into());
  assert_eq!(s.list_applications(&query).await.unwrap().pagination.total_items, 0);
}

#[tokio::test]
async fn listing_counts_are_scoped_per_application() {
  let s = store().await;
  let busy = s.submit(submission("busy@x.com", "BUSY1", "Busy")).await.unwrap();
  let quiet = s.submit(submission("quiet@x.com", "QUIET1", "Quiet")).await.unwrap();
  let busy_id = busy.application.application_id;

  for approved in [true, true, false] {
    s.attach_document(NewDocument {
      application_id: busy_id,
      document_type:  "attachment".into(),
      file_name:      "scan.pdf".into(),
      is_approved:    approved,
      verified_by:    None,
    })
    .await
    .unwrap();
  }
  for (sender_type, is_read) in [
    (SenderType::Applicant, false),
    (SenderType::Applicant, false),
    (SenderType::Applicant, true),
    (SenderType::Staff, false),
  ] {
    s.post_message(NewMessage {
      application_id: busy_id,
      sender_type,
      body: "ciao".into(),
      is_read,
    })
    .await
    .unwrap();
  }

  let page = s.list_applications(&ApplicationQuery::default()).await.unwrap();
  let busy_row = page
    .items
    .iter()
    .find(|r| r.application.application_id == busy_id)
    .unwrap();
  assert_eq!(busy_row.unread_messages, 2);
  assert_eq!(busy_row.documents_count, 3);
  assert_eq!(busy_row.approved_documents, 2);

  let quiet_row = page
    .items
    .iter()
    .find(|r| r.application.application_id == quiet.application.application_id)
    .unwrap();
  assert_eq!(quiet_row.unread_messages, 0);
  assert_eq!(quiet_row.documents_count, 0);
  assert_eq!(quiet_row.approved_documents, 0);
}

#[tokio::test]
async fn reopened_store_keeps_data() {
  let dir = std::env::temp_dir().join(format!("tessera-{}", Uuid::new_v4()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("tessera.db");

  let id = {
    let s = SqliteStore::open(&path).await.unwrap();
    s.submit(submission("g@x.com", "STU901", "Giulia Oro"))
      .await
      .unwrap()
      .application
      .application_id
  };

  let s = SqliteStore::open(&path).await.unwrap();
  assert!(s.get_application(id).await.unwrap().is_some());
  std::fs::remove_dir_all(&dir).ok();
}
