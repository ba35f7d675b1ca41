//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with nanosecond
//! precision. JSON documents are stored as compact text. UUIDs are stored as
//! hyphenated lowercase strings. Points are stored as EWKT.

use ashlar_core::{
  geometry::{self, StoredPoint},
  record::Record,
  schema::{SchemaDocument, SchemaKind},
};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── SchemaKind ──────────────────────────────────────────────────────────────

/// Table holding schemas of `kind`.
pub fn schema_table(kind: SchemaKind) -> &'static str {
  match kind {
    SchemaKind::Item => "item_schemas",
    SchemaKind::Record => "record_schemas",
  }
}

/// Column list matching [`RawSchema`]'s field order. Record schemas have no
/// label column, so a NULL stands in for it.
pub fn schema_columns(kind: SchemaKind) -> &'static str {
  match kind {
    SchemaKind::Item => {
      "schema_id, created, modified, version, schema_json, slug, label"
    }
    SchemaKind::Record => {
      "schema_id, created, modified, version, schema_json, record_type, NULL"
    }
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `item_schemas` or `record_schemas` row.
pub struct RawSchema {
  pub schema_id:   String,
  pub created:     String,
  pub modified:    String,
  pub version:     u32,
  pub schema_json: String,
  pub identifier:  String,
  pub label:       Option<String>,
}

impl RawSchema {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      schema_id:   row.get(0)?,
      created:     row.get(1)?,
      modified:    row.get(2)?,
      version:     row.get(3)?,
      schema_json: row.get(4)?,
      identifier:  row.get(5)?,
      label:       row.get(6)?,
    })
  }

  pub fn into_document(self, kind: SchemaKind) -> Result<SchemaDocument> {
    Ok(SchemaDocument {
      schema_id: decode_uuid(&self.schema_id)?,
      kind,
      identifier: self.identifier,
      version: self.version,
      schema: serde_json::from_str(&self.schema_json)?,
      label: self.label,
      created: decode_dt(&self.created)?,
      modified: decode_dt(&self.modified)?,
    })
  }
}

/// Column list matching [`RawRecord`]'s field order, qualified with the `r`
/// alias used by every record query.
pub const RECORD_COLUMNS: &str = "r.record_id, r.created, r.modified, \
                                  r.occurred_from, r.occurred_to, r.label, \
                                  r.slug, r.geom, r.data_json, r.schema_id";

/// Raw strings read directly from a `records` row.
pub struct RawRecord {
  pub record_id:     String,
  pub created:       String,
  pub modified:      String,
  pub occurred_from: String,
  pub occurred_to:   String,
  pub label:         String,
  pub slug:          String,
  pub geom:          String,
  pub data_json:     String,
  pub schema_id:     String,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:     row.get(0)?,
      created:       row.get(1)?,
      modified:      row.get(2)?,
      occurred_from: row.get(3)?,
      occurred_to:   row.get(4)?,
      label:         row.get(5)?,
      slug:          row.get(6)?,
      geom:          row.get(7)?,
      data_json:     row.get(8)?,
      schema_id:     row.get(9)?,
    })
  }

  pub fn into_record(self) -> Result<Record> {
    Ok(Record {
      record_id:     decode_uuid(&self.record_id)?,
      created:       decode_dt(&self.created)?,
      modified:      decode_dt(&self.modified)?,
      occurred_from: decode_dt(&self.occurred_from)?,
      occurred_to:   decode_dt(&self.occurred_to)?,
      label:         self.label,
      slug:          self.slug,
      geom:          geometry::decode(&StoredPoint::from_raw(self.geom))?,
      data:          serde_json::from_str(&self.data_json)?,
      schema_id:     decode_uuid(&self.schema_id)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_are_fixed_width_and_sortable() {
    let a = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
    let b = a + chrono::Duration::nanoseconds(1_500);
    let (ea, eb) = (encode_dt(a), encode_dt(b));
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb);
    assert_eq!(ea, "2024-05-01T08:00:00.000000000Z");
    assert_eq!(decode_dt(&eb).unwrap(), b);
  }
}
