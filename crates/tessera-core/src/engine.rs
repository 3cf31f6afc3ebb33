//! The lifecycle engine: the single entry point for application mutations
//! and staff-facing reads.
//!
//! The engine holds an explicit store handle. It never publishes anything
//! itself; a committed status change is returned as a [`Transition`] whose
//! event the transport layer forwards to live subscribers.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
  Error, Result,
  application::{Application, ApplicationDetail, ApplicationRow, Submission, Submitted},
  audit::AuditEntry,
  document::Document,
  lifecycle::{Assignment, StatusChange, StatusUpdated, Transition},
  query::{ApplicationQuery, Page},
  staff::Staff,
  store::ApplicationStore,
};

pub struct Lifecycle<S> {
  store: Arc<S>,
}

impl<S> Clone for Lifecycle<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: ApplicationStore> Lifecycle<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  // ── Mutations ─────────────────────────────────────────────────────────

  /// Register a public submission. No actor is recorded.
  pub async fn submit(&self, submission: Submission) -> Result<Submitted> {
    submission.applicant.validate()?;
    self.store.submit(submission).await.map_err(Into::into)
  }

  /// Change the status of an application on behalf of `actor`.
  ///
  /// The returned event carries the post-commit status and the row's new
  /// `updated_at` as its timestamp.
  pub async fn change_status(
    &self,
    application_id: Uuid,
    change: StatusChange,
    actor: &Staff,
  ) -> Result<Transition> {
    let application = self
      .store
      .change_status(application_id, change, actor.staff_id)
      .await
      .map_err(Into::into)?;

    let event = StatusUpdated {
      application_id,
      new_status: application.status,
      updated_by: actor.full_name.clone(),
      timestamp: application.updated_at,
    };
    Ok(Transition { application, event })
  }

  /// Assign an application to `staff_id` on behalf of `actor`.
  pub async fn assign(
    &self,
    application_id: Uuid,
    staff_id: Uuid,
    actor: &Staff,
  ) -> Result<Application> {
    let assignment = Assignment { staff_id, assigned_by: actor.staff_id };
    self
      .store
      .assign(application_id, assignment)
      .await
      .map_err(Into::into)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The joined application view together with its documents.
  pub async fn get(
    &self,
    application_id: Uuid,
  ) -> Result<(ApplicationDetail, Vec<Document>)> {
    let detail = self
      .store
      .get_application(application_id)
      .await
      .map_err(Into::into)?
      .ok_or(Error::ApplicationNotFound(application_id))?;
    let documents = self
      .store
      .list_documents(application_id)
      .await
      .map_err(Into::into)?;
    Ok((detail, documents))
  }

  pub async fn list(&self, query: &ApplicationQuery) -> Result<Page<ApplicationRow>> {
    self.store.list_applications(query).await.map_err(Into::into)
  }

  /// Audit history, most recent first. Fails if the application is unknown.
  pub async fn audit_trail(&self, application_id: Uuid) -> Result<Vec<AuditEntry>> {
    let entries = self
      .store
      .audit_trail(application_id)
      .await
      .map_err(Into::into)?;
    // Every application has at least its `created` entry.
    if entries.is_empty() {
      return Err(Error::ApplicationNotFound(application_id));
    }
    Ok(entries)
  }

  /// Resolve an acting staff member; inactive staff are treated as absent.
  pub async fn active_staff(&self, staff_id: Uuid) -> Result<Option<Staff>> {
    let staff = self.store.get_staff(staff_id).await.map_err(Into::into)?;
    Ok(staff.filter(|s| s.is_active))
  }
}
