//! The `RecordStore` trait and supporting query types.
//!
//! Backends (e.g. `ashlar-store-sqlite`) implement this alongside
//! [`SchemaRegistry`](crate::registry::SchemaRegistry); record writes resolve
//! their schema through the same backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::record::{NewRecord, Record, RecordPatch};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`RecordStore::list_records`].
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
  /// Records bound to any version of this record type.
  pub record_type:     Option<String>,
  /// Records bound to this exact schema row.
  pub schema_id:       Option<Uuid>,
  /// Keep records whose occurrence interval ends at or after this instant.
  pub occurred_after:  Option<DateTime<Utc>>,
  /// Keep records whose occurrence interval starts at or before this instant.
  pub occurred_before: Option<DateTime<Utc>>,
  /// Defaults to 100.
  pub limit:           Option<usize>,
  pub offset:          Option<usize>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Storage for records.
///
/// Every write validates before touching storage; a failed check never leaves
/// a partial row behind.
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Resolve the record schema, validate the payload, check the interval and
  /// geometry, then persist a record bound to the resolved schema row.
  fn create_record(
    &self,
    input: NewRecord,
  ) -> impl Future<Output = Result<Record, Self::Error>> + Send + '_;

  /// Fails with `RecordNotFound`.
  fn get_record(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<Record, Self::Error>> + Send + '_;

  /// Apply `patch`, re-validating against the record's own schema version.
  /// Bumps `modified`.
  fn update_record(
    &self,
    record_id: Uuid,
    patch: RecordPatch,
  ) -> impl Future<Output = Result<Record, Self::Error>> + Send + '_;

  /// Fails with `RecordNotFound`.
  fn delete_record(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Records matching `query`, ordered by `occurred_from`.
  fn list_records<'a>(
    &'a self,
    query: &'a RecordQuery,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + 'a;
}
