//! Application types: one membership request ("tesseramento") and the views
//! assembled around it.
//!
//! The lifecycle `status` and the payment fields are independent: payment is
//! tracked by its own status and never drives a lifecycle transition.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error,
  applicant::{Applicant, ApplicantProfile, ApplicantSummary},
  staff::StaffSummary,
};

/// Registration fee charged for every new application, in euro cents.
pub const REGISTRATION_FEE_CENTS: i64 = 5_000;

// ─── Enumerations ────────────────────────────────────────────────────────────

/// Lifecycle status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
  /// Initial state of every submission.
  Pending,
  InReview,
  Completed,
  Rejected,
}

impl ApplicationStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::InReview => "in_review",
      Self::Completed => "completed",
      Self::Rejected => "rejected",
    }
  }
}

impl fmt::Display for ApplicationStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ApplicationStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(Self::Pending),
      "in_review" => Ok(Self::InReview),
      "completed" => Ok(Self::Completed),
      "rejected" => Ok(Self::Rejected),
      other => Err(Error::Validation(format!("unknown status: {other:?}"))),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
  Cash,
  Card,
  BankTransfer,
  Paypal,
}

impl PaymentMethod {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Cash => "cash",
      Self::Card => "card",
      Self::BankTransfer => "bank_transfer",
      Self::Paypal => "paypal",
    }
  }
}

impl FromStr for PaymentMethod {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "cash" => Ok(Self::Cash),
      "card" => Ok(Self::Card),
      "bank_transfer" => Ok(Self::BankTransfer),
      "paypal" => Ok(Self::Paypal),
      other => {
        Err(Error::Validation(format!("unknown payment method: {other:?}")))
      }
    }
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
  /// No payment has been recorded yet.
  #[default]
  Unset,
  Pending,
  Paid,
  Refunded,
}

impl PaymentStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Unset => "unset",
      Self::Pending => "pending",
      Self::Paid => "paid",
      Self::Refunded => "refunded",
    }
  }
}

impl FromStr for PaymentStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "unset" => Ok(Self::Unset),
      "pending" => Ok(Self::Pending),
      "paid" => Ok(Self::Paid),
      "refunded" => Ok(Self::Refunded),
      other => {
        Err(Error::Validation(format!("unknown payment status: {other:?}")))
      }
    }
  }
}

// ─── Application ─────────────────────────────────────────────────────────────

/// One membership request, as stored.
///
/// Invariants maintained by [`crate::lifecycle`]:
/// - `rejection_reason` is only ever set while `status` is `Rejected`;
/// - `completion_date` is stamped on the first transition to `Completed` and
///   never cleared afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
  pub application_id:       Uuid,
  pub applicant_id:         Uuid,
  pub assigned_staff_id:    Option<Uuid>,
  pub status:               ApplicationStatus,
  pub payment_method:       PaymentMethod,
  pub payment_amount_cents: i64,
  pub payment_status:       PaymentStatus,
  pub payment_reference:    Option<String>,
  pub payment_date:         Option<DateTime<Utc>>,
  pub notes:                Option<String>,
  pub rejection_reason:     Option<String>,
  pub completion_date:      Option<DateTime<Utc>>,
  pub created_at:           DateTime<Utc>,
  pub updated_at:           DateTime<Utc>,
}

impl Application {
  /// A fresh `pending` application for `applicant_id`.
  pub fn new_pending(
    applicant_id: Uuid,
    payment_method: PaymentMethod,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      application_id: Uuid::new_v4(),
      applicant_id,
      assigned_staff_id: None,
      status: ApplicationStatus::Pending,
      payment_method,
      payment_amount_cents: REGISTRATION_FEE_CENTS,
      payment_status: PaymentStatus::Unset,
      payment_reference: None,
      payment_date: None,
      notes: None,
      rejection_reason: None,
      completion_date: None,
      created_at: now,
      updated_at: now,
    }
  }
}

// ─── Inputs and outcomes ─────────────────────────────────────────────────────

/// A public submission: applicant data plus the chosen payment method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
  #[serde(flatten)]
  pub applicant:      ApplicantProfile,
  pub payment_method: PaymentMethod,
}

/// Result of a committed submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submitted {
  pub application:       Application,
  pub applicant_id:      Uuid,
  /// `true` when a new applicant row was inserted, `false` when an existing
  /// one was matched and updated.
  pub created_applicant: bool,
}

// ─── Views ───────────────────────────────────────────────────────────────────

/// A listing row: the application joined with its applicant, its assigned
/// staff member and three per-application counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRow {
  #[serde(flatten)]
  pub application:        Application,
  pub applicant:          ApplicantSummary,
  pub assigned_staff:     Option<StaffSummary>,
  /// Unread messages sent from the applicant side.
  pub unread_messages:    u64,
  pub documents_count:    u64,
  pub approved_documents: u64,
}

/// The single-item view: the application with the full applicant record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationDetail {
  #[serde(flatten)]
  pub application:    Application,
  pub applicant:      Applicant,
  pub assigned_staff: Option<StaffSummary>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_strings_match_serde_tags() {
    for status in [
      ApplicationStatus::Pending,
      ApplicationStatus::InReview,
      ApplicationStatus::Completed,
      ApplicationStatus::Rejected,
    ] {
      let json = serde_json::to_value(status).unwrap();
      assert_eq!(json, serde_json::Value::String(status.as_str().into()));
      assert_eq!(status.as_str().parse::<ApplicationStatus>().unwrap(), status);
    }
  }

  #[test]
  fn unknown_status_is_a_validation_error() {
    let err = "archived".parse::<ApplicationStatus>().unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
  }

  #[test]
  fn new_pending_charges_the_registration_fee() {
    let app = Application::new_pending(Uuid::new_v4(), PaymentMethod::Card, Utc::now());
    assert_eq!(app.status, ApplicationStatus::Pending);
    assert_eq!(app.payment_amount_cents, REGISTRATION_FEE_CENTS);
    assert_eq!(app.payment_status, PaymentStatus::Unset);
    assert!(app.completion_date.is_none());
  }
}
