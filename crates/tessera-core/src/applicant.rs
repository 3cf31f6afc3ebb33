//! Applicants: the people membership applications are filed for.
//!
//! Applicants are deduplicated on two keys, `email` and `fiscal_code`. A new
//! submission matching either key reuses the existing applicant and
//! overwrites its profile fields.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// A persisted applicant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
  pub applicant_id: Uuid,
  pub email:        String,
  pub fiscal_code:  String,
  pub full_name:    String,
  pub phone:        Option<String>,
  pub birth_date:   Option<NaiveDate>,
  pub address:      Option<String>,
  pub city:         Option<String>,
  pub postal_code:  Option<String>,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
}

/// Applicant data carried by a submission.
///
/// `email` and `fiscal_code` are the dedup keys; everything else is profile
/// data that is overwritten on an existing applicant (last write wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
  pub email:       String,
  pub fiscal_code: String,
  pub full_name:   String,
  pub phone:       Option<String>,
  pub birth_date:  Option<NaiveDate>,
  pub address:     Option<String>,
  pub city:        Option<String>,
  pub postal_code: Option<String>,
}

impl ApplicantProfile {
  /// Build a brand-new [`Applicant`] from this profile.
  pub fn into_applicant(self, now: DateTime<Utc>) -> Applicant {
    Applicant {
      applicant_id: Uuid::new_v4(),
      email:        self.email,
      fiscal_code:  self.fiscal_code,
      full_name:    self.full_name,
      phone:        self.phone,
      birth_date:   self.birth_date,
      address:      self.address,
      city:         self.city,
      postal_code:  self.postal_code,
      created_at:   now,
      updated_at:   now,
    }
  }

  /// Reject profiles that cannot identify an applicant.
  pub fn validate(&self) -> Result<()> {
    if self.full_name.trim().is_empty() {
      return Err(Error::Validation("full_name must not be empty".into()));
    }
    match self.email.trim().split_once('@') {
      Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
      _ => return Err(Error::Validation(format!("invalid email: {:?}", self.email))),
    }
    let code = self.fiscal_code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
      return Err(Error::Validation(format!(
        "invalid fiscal_code: {:?}",
        self.fiscal_code
      )));
    }
    Ok(())
  }

  /// Overwrite the profile fields of `existing`; dedup keys are untouched.
  pub fn overwrite(&self, existing: &mut Applicant, now: DateTime<Utc>) {
    existing.full_name = self.full_name.clone();
    existing.phone = self.phone.clone();
    existing.birth_date = self.birth_date;
    existing.address = self.address.clone();
    existing.city = self.city.clone();
    existing.postal_code = self.postal_code.clone();
    existing.updated_at = now;
  }
}

/// The compact applicant projection joined onto listing rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantSummary {
  pub applicant_id: Uuid,
  pub full_name:    String,
  pub email:        String,
  pub phone:        Option<String>,
  pub fiscal_code:  String,
  pub city:         Option<String>,
}
