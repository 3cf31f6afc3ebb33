//! Error types for `tessera-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("application not found: {0}")]
  ApplicationNotFound(Uuid),

  /// The assignment target does not exist or is not active.
  #[error("staff member {0} does not exist or is inactive")]
  InvalidStaff(Uuid),

  /// A concurrent submission claimed the same email or fiscal code.
  #[error("an applicant with this email or fiscal code is already registered")]
  DuplicateApplicant,

  #[error("invalid input: {0}")]
  Validation(String),

  /// Opaque backend failure (connection loss, unexpected constraint, decode).
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap any backend error as an opaque [`Error::Store`].
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
