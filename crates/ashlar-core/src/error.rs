//! Error types for `ashlar-core`.
//!
//! Every variant is recoverable by the caller. Storage backends wrap this type
//! and translate their own constraint failures into it.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::{schema::SchemaKind, validation::Violation};

#[derive(Debug, Error)]
pub enum Error {
  #[error("{kind} schema {identifier:?} version {version} already exists")]
  DuplicateVersion {
    kind:       SchemaKind,
    identifier: String,
    version:    u32,
  },

  /// The version is zero, or not strictly greater than the highest version
  /// already registered for the identifier.
  #[error(
    "invalid version {version} for {kind} schema {identifier:?} (latest is {latest:?})"
  )]
  InvalidVersion {
    kind:       SchemaKind,
    identifier: String,
    version:    u32,
    latest:     Option<u32>,
  },

  /// `version` is `None` when the lookup asked for the latest version.
  #[error("{kind} schema {identifier:?} version {version:?} not found")]
  SchemaNotFound {
    kind:       SchemaKind,
    identifier: String,
    version:    Option<u32>,
  },

  #[error("{0} schema not found: {1}")]
  SchemaIdNotFound(SchemaKind, Uuid),

  #[error("record not found: {0}")]
  RecordNotFound(Uuid),

  /// A record was re-checked against a schema row other than the one it is
  /// bound to.
  #[error("record is bound to schema {bound}, not {given}")]
  SchemaBindingMismatch { bound: Uuid, given: Uuid },

  #[error("payload failed validation with {} violation(s)", .0.len())]
  ValidationFailed(Vec<Violation>),

  #[error("schema document is not a valid JSON Schema: {0}")]
  InvalidSchema(String),

  #[error("occurrence interval is inverted: {from} > {to}")]
  InvalidInterval {
    from: chrono::DateTime<chrono::Utc>,
    to:   chrono::DateTime<chrono::Utc>,
  },

  #[error("spatial reference mismatch: expected SRID {expected}, got {found}")]
  SridMismatch { expected: i32, found: i32 },

  #[error("coordinate ({x}, {y}) is not finite")]
  InvalidCoordinate { x: f64, y: f64 },

  #[error("malformed stored geometry: {0}")]
  MalformedGeometry(String),

  #[error("invalid field `{field}`: {reason}")]
  InvalidField { field: &'static str, reason: String },

  #[error("{kind} schema {schema_id} is still referenced by records")]
  ReferentialIntegrityViolation { kind: SchemaKind, schema_id: Uuid },

  #[error("operation timed out after {0:?}")]
  Timeout(Duration),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
