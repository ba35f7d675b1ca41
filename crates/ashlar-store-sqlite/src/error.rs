//! Error type for `ashlar-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A domain failure: missing schema, duplicate version, validation, etc.
  #[error(transparent)]
  Core(#[from] ashlar_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self { Self::Database(e.into()) }
}

impl Error {
  /// The domain error, if this is one.
  pub fn core(&self) -> Option<&ashlar_core::Error> {
    match self {
      Self::Core(e) => Some(e),
      _ => None,
    }
  }

  pub fn is_timeout(&self) -> bool {
    matches!(self, Self::Core(ashlar_core::Error::Timeout(_)))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
