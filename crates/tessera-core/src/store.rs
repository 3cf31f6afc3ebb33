//! The `ApplicationStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `tessera-store-sqlite`).
//! The [`Lifecycle`](crate::Lifecycle) engine and the HTTP layer depend on
//! this abstraction, not on any concrete backend.
//!
//! Every mutating method is one all-or-nothing transaction: the current row
//! is read for diffing, the update and its audit entry are written, and the
//! transaction commits. Any error rolls the whole transaction back.

use std::future::Future;

use uuid::Uuid;

use crate::{
  application::{Application, ApplicationDetail, ApplicationRow, Submission, Submitted},
  audit::AuditEntry,
  document::Document,
  lifecycle::{Assignment, StatusChange},
  query::{ApplicationQuery, Page},
  staff::Staff,
};

/// Abstraction over the persistent store.
///
/// `Self::Error` converts into [`crate::Error`] so that expected outcomes
/// (`ApplicationNotFound`, `InvalidStaff`, `DuplicateApplicant`) survive the
/// trip through the backend while everything else becomes an opaque
/// [`crate::Error::Store`].
pub trait ApplicationStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + Into<crate::Error> + 'static;

  // ── Mutations ─────────────────────────────────────────────────────────

  /// Find-or-create the applicant by email OR fiscal code, insert a pending
  /// application and append its `created` audit entry.
  fn submit(
    &self,
    submission: Submission,
  ) -> impl Future<Output = Result<Submitted, Self::Error>> + Send + '_;

  /// Apply `change` to the application, re-reading the row inside the
  /// transaction, and append a `status_changed` audit entry attributed to
  /// `actor`.
  fn change_status(
    &self,
    application_id: Uuid,
    change: StatusChange,
    actor: Uuid,
  ) -> impl Future<Output = Result<Application, Self::Error>> + Send + '_;

  /// Assign the application to an active staff member and append an
  /// `assigned` audit entry.
  fn assign(
    &self,
    application_id: Uuid,
    assignment: Assignment,
  ) -> impl Future<Output = Result<Application, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The joined single-item view. Returns `None` if not found.
  fn get_application(
    &self,
    application_id: Uuid,
  ) -> impl Future<Output = Result<Option<ApplicationDetail>, Self::Error>> + Send + '_;

  /// Documents attached to an application, newest upload first.
  fn list_documents(
    &self,
    application_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// One filtered, sorted page of listing rows.
  fn list_applications<'a>(
    &'a self,
    query: &'a ApplicationQuery,
  ) -> impl Future<Output = Result<Page<ApplicationRow>, Self::Error>> + Send + 'a;

  /// Audit history of an application, most recent first.
  fn audit_trail(
    &self,
    application_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AuditEntry>, Self::Error>> + Send + '_;

  /// Retrieve a staff member by id. Returns `None` if not found.
  fn get_staff(
    &self,
    staff_id: Uuid,
  ) -> impl Future<Output = Result<Option<Staff>, Self::Error>> + Send + '_;
}
