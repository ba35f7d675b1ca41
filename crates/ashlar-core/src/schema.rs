//! Schema documents: immutable, versioned JSON Schemas per logical type.
//!
//! A schema row is never updated. Evolving a type means registering a new
//! version next to the old ones; records keep pointing at the exact row they
//! were validated against.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, fields::check_text, validation};

// ─── Kind ────────────────────────────────────────────────────────────────────

/// Which registry table a schema lives in.
///
/// Item schemas are keyed by `slug` and carry a display label; record schemas
/// are keyed by `record_type` and have no label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaKind {
  Item,
  Record,
}

impl SchemaKind {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Item => "item",
      Self::Record => "record",
    }
  }

  /// Name of the identifier column for this kind.
  pub fn identifier_field(self) -> &'static str {
    match self {
      Self::Item => "slug",
      Self::Record => "record_type",
    }
  }
}

impl fmt::Display for SchemaKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── SchemaDocument ──────────────────────────────────────────────────────────

/// One registered schema version, as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDocument {
  pub schema_id:  Uuid,
  pub kind:       SchemaKind,
  /// The slug (item schemas) or record type (record schemas).
  pub identifier: String,
  pub version:    u32,
  /// The JSON Schema itself, byte-for-byte what was registered.
  pub schema:     serde_json::Value,
  /// Display name; always `Some` for item schemas, always `None` for record
  /// schemas.
  pub label:      Option<String>,
  pub created:    DateTime<Utc>,
  /// Equal to `created`; schema rows are never mutated.
  pub modified:   DateTime<Utc>,
}

// ─── NewSchema ───────────────────────────────────────────────────────────────

/// Input to [`crate::registry::SchemaRegistry::register`].
#[derive(Debug, Clone)]
pub struct NewSchema {
  pub kind:       SchemaKind,
  pub identifier: String,
  pub version:    u32,
  pub schema:     serde_json::Value,
  pub label:      Option<String>,
}

impl NewSchema {
  /// A record schema for `record_type` at `version`.
  pub fn record(
    record_type: impl Into<String>,
    version: u32,
    schema: serde_json::Value,
  ) -> Self {
    Self {
      kind: SchemaKind::Record,
      identifier: record_type.into(),
      version,
      schema,
      label: None,
    }
  }

  /// An item schema for `slug` at `version`.
  pub fn item(
    slug: impl Into<String>,
    label: impl Into<String>,
    version: u32,
    schema: serde_json::Value,
  ) -> Self {
    Self {
      kind: SchemaKind::Item,
      identifier: slug.into(),
      version,
      schema,
      label: Some(label.into()),
    }
  }

  /// Checks that need no access to the registry: identifier and label rules,
  /// a positive version, and a compilable schema document.
  pub fn check(&self) -> Result<()> {
    check_text(self.kind.identifier_field(), &self.identifier)?;

    match (self.kind, self.label.as_deref()) {
      (SchemaKind::Item, Some(label)) => check_text("label", label)?,
      (SchemaKind::Item, None) => {
        return Err(Error::InvalidField {
          field:  "label",
          reason: "item schemas require a label".into(),
        });
      }
      (SchemaKind::Record, Some(_)) => {
        return Err(Error::InvalidField {
          field:  "label",
          reason: "record schemas do not carry a label".into(),
        });
      }
      (SchemaKind::Record, None) => {}
    }

    if self.version == 0 {
      return Err(Error::InvalidVersion {
        kind:       self.kind,
        identifier: self.identifier.clone(),
        version:    self.version,
        latest:     None,
      });
    }

    validation::check_schema(&self.schema)
  }
}
