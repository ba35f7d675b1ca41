//! Records: spatiotemporal events bound to one record schema version.
//!
//! A record references the concrete schema row it was validated against, not
//! the record type in the abstract. Registering newer versions of the type
//! never touches existing records.

use std::ops::RangeInclusive;

use chrono::{DateTime, Datelike as _, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  fields::check_text,
  geometry::{self, Coordinate, StoredPoint},
  schema::SchemaDocument,
  validation,
};

// ─── Record ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  pub record_id:     Uuid,
  pub created:       DateTime<Utc>,
  /// Bumped on every mutation.
  pub modified:      DateTime<Utc>,
  pub occurred_from: DateTime<Utc>,
  pub occurred_to:   DateTime<Utc>,
  pub label:         String,
  pub slug:          String,
  pub geom:          Coordinate,
  pub data:          serde_json::Value,
  /// The record schema row this record is bound to. Never changes.
  pub schema_id:     Uuid,
}

// ─── NewRecord ───────────────────────────────────────────────────────────────

/// Input to [`crate::store::RecordStore::create_record`].
#[derive(Debug, Clone)]
pub struct NewRecord {
  pub record_type:   String,
  /// `None` binds the record to the latest registered version.
  pub version:       Option<u32>,
  pub data:          serde_json::Value,
  pub occurred_from: DateTime<Utc>,
  pub occurred_to:   DateTime<Utc>,
  pub label:         String,
  pub slug:          String,
  pub geom:          Coordinate,
}

impl NewRecord {
  /// Run every write-time check against the resolved schema and return the
  /// encoded geometry ready for insertion.
  pub fn prepare(&self, schema: &SchemaDocument) -> Result<StoredPoint> {
    check_record(
      schema,
      &self.data,
      self.occurred_from,
      self.occurred_to,
      &self.geom,
      &self.label,
      &self.slug,
    )
  }
}

// ─── RecordPatch ─────────────────────────────────────────────────────────────

/// Partial update for [`crate::store::RecordStore::update_record`].
///
/// There is no schema field: a record never moves to another schema version.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
  pub occurred_from: Option<DateTime<Utc>>,
  pub occurred_to:   Option<DateTime<Utc>>,
  pub label:         Option<String>,
  pub slug:          Option<String>,
  pub geom:          Option<Coordinate>,
  pub data:          Option<serde_json::Value>,
}

impl RecordPatch {
  pub fn is_empty(&self) -> bool {
    self.occurred_from.is_none()
      && self.occurred_to.is_none()
      && self.label.is_none()
      && self.slug.is_none()
      && self.geom.is_none()
      && self.data.is_none()
  }

  /// Merge the patch into `record`, re-check the result against the record's
  /// own schema, and stamp `modified` with `now`.
  pub fn apply(
    self,
    mut record: Record,
    schema: &SchemaDocument,
    now: DateTime<Utc>,
  ) -> Result<(Record, StoredPoint)> {
    if schema.schema_id != record.schema_id {
      return Err(Error::SchemaBindingMismatch {
        bound: record.schema_id,
        given: schema.schema_id,
      });
    }

    if let Some(v) = self.occurred_from {
      record.occurred_from = v;
    }
    if let Some(v) = self.occurred_to {
      record.occurred_to = v;
    }
    if let Some(v) = self.label {
      record.label = v;
    }
    if let Some(v) = self.slug {
      record.slug = v;
    }
    if let Some(v) = self.geom {
      record.geom = v;
    }
    if let Some(v) = self.data {
      record.data = v;
    }

    let stored = check_record(
      schema,
      &record.data,
      record.occurred_from,
      record.occurred_to,
      &record.geom,
      &record.label,
      &record.slug,
    )?;
    record.modified = now;
    Ok((record, stored))
  }
}

// ─── Checks ──────────────────────────────────────────────────────────────────

/// Years an occurrence timestamp may fall in. Outside four-digit years the
/// stored RFC 3339 text no longer sorts in time order.
pub const OCCURRENCE_YEARS: RangeInclusive<i32> = 0..=9999;

/// `from <= to`, with both ends inside [`OCCURRENCE_YEARS`]. Inversion is
/// reported first.
pub fn check_interval(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<()> {
  if from > to {
    return Err(Error::InvalidInterval { from, to });
  }
  check_occurrence("occurred_from", from)?;
  check_occurrence("occurred_to", to)
}

fn check_occurrence(field: &'static str, at: DateTime<Utc>) -> Result<()> {
  if !OCCURRENCE_YEARS.contains(&at.year()) {
    return Err(Error::InvalidField {
      field,
      reason: format!("{at} is outside years 0000 to 9999"),
    });
  }
  Ok(())
}

/// Write-time checks shared by create and update, in a fixed order: interval,
/// payload validation, geometry, then text fields. An inverted interval is
/// reported whatever the payload looks like.
fn check_record(
  schema: &SchemaDocument,
  data: &serde_json::Value,
  occurred_from: DateTime<Utc>,
  occurred_to: DateTime<Utc>,
  geom: &Coordinate,
  label: &str,
  slug: &str,
) -> Result<StoredPoint> {
  check_interval(occurred_from, occurred_to)?;
  validation::validate(&schema.schema, data)?.into_result()?;
  let stored = geometry::encode(geom)?;
  check_text("label", label)?;
  check_text("slug", slug)?;
  Ok(stored)
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};
  use serde_json::json;

  use super::*;
  use crate::schema::SchemaKind;

  fn schema() -> SchemaDocument {
    let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    SchemaDocument {
      schema_id:  Uuid::new_v4(),
      kind:       SchemaKind::Record,
      identifier: "incident".into(),
      version:    1,
      schema:     json!({
        "type": "object",
        "properties": { "severity": { "type": "integer" } },
        "required": ["severity"]
      }),
      label:      None,
      created:    at,
      modified:   at,
    }
  }

  fn new_record() -> NewRecord {
    let from = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    NewRecord {
      record_type:   "incident".into(),
      version:       Some(1),
      data:          json!({ "severity": 2 }),
      occurred_from: from,
      occurred_to:   from + Duration::hours(1),
      label:         "Collision".into(),
      slug:          "collision".into(),
      geom:          Coordinate::web_mercator(1.0, 2.0),
    }
  }

  #[test]
  fn prepare_returns_encoded_point() {
    let stored = new_record().prepare(&schema()).unwrap();
    assert_eq!(stored.as_str(), "SRID=3857;POINT(1 2)");
  }

  #[test]
  fn zero_length_interval_is_allowed() {
    let mut input = new_record();
    input.occurred_to = input.occurred_from;
    assert!(input.prepare(&schema()).is_ok());
  }

  #[test]
  fn inverted_interval_wins_over_invalid_payload() {
    let mut input = new_record();
    input.data = json!({});
    input.occurred_to = input.occurred_from - Duration::seconds(1);
    assert!(matches!(
      input.prepare(&schema()),
      Err(Error::InvalidInterval { .. })
    ));
  }

  #[test]
  fn invalid_payload_with_sound_interval_fails_validation() {
    let mut input = new_record();
    input.data = json!({ "severity": "high" });
    assert!(matches!(
      input.prepare(&schema()),
      Err(Error::ValidationFailed(v)) if v.len() == 1
    ));
  }

  #[test]
  fn patch_rechecks_merged_interval() {
    let input = new_record();
    let record = Record {
      record_id:     Uuid::new_v4(),
      created:       input.occurred_from,
      modified:      input.occurred_from,
      occurred_from: input.occurred_from,
      occurred_to:   input.occurred_to,
      label:         input.label.clone(),
      slug:          input.slug.clone(),
      geom:          input.geom,
      data:          input.data.clone(),
      schema_id:     Uuid::nil(),
    };
    let mut schema = schema();
    schema.schema_id = Uuid::nil();

    let patch = RecordPatch {
      occurred_from: Some(input.occurred_to + Duration::days(1)),
      ..Default::default()
    };
    assert!(matches!(
      patch.apply(record, &schema, Utc::now()),
      Err(Error::InvalidInterval { .. })
    ));
  }

  #[test]
  fn occurrence_years_stop_at_9999() {
    let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 0, 0).unwrap();
    let next = Utc.with_ymd_and_hms(10000, 1, 1, 1, 0, 0).unwrap();
    assert!(check_interval(last, last).is_ok());
    assert!(matches!(
      check_interval(last, next),
      Err(Error::InvalidField { field: "occurred_to", .. })
    ));

    let before_zero = Utc.with_ymd_and_hms(-1, 12, 31, 0, 0, 0).unwrap();
    assert!(matches!(
      check_interval(before_zero, last),
      Err(Error::InvalidField { field: "occurred_from", .. })
    ));
    assert!(matches!(
      check_interval(next, last),
      Err(Error::InvalidInterval { .. })
    ));
  }

  #[test]
  fn patch_against_another_schema_row_is_refused() {
    let input = new_record();
    let record = Record {
      record_id:     Uuid::new_v4(),
      created:       input.occurred_from,
      modified:      input.occurred_from,
      occurred_from: input.occurred_from,
      occurred_to:   input.occurred_to,
      label:         input.label.clone(),
      slug:          input.slug.clone(),
      geom:          input.geom,
      data:          input.data.clone(),
      schema_id:     Uuid::new_v4(),
    };
    let schema = schema();
    let patch = RecordPatch {
      label: Some("Side-swipe".into()),
      ..Default::default()
    };
    assert!(matches!(
      patch.apply(record.clone(), &schema, Utc::now()),
      Err(Error::SchemaBindingMismatch { bound, given })
        if bound == record.schema_id && given == schema.schema_id
    ));
  }

  #[test]
  fn empty_patch_is_empty() {
    assert!(RecordPatch::default().is_empty());
    let patch = RecordPatch {
      label: Some("x".into()),
      ..Default::default()
    };
    assert!(!patch.is_empty());
  }
}
