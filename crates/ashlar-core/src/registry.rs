//! The `SchemaRegistry` trait.
//!
//! Schema rows are append-only. There is no update operation: publishing a
//! change means registering a higher version for the same identifier.

use std::future::Future;

use uuid::Uuid;

use crate::schema::{NewSchema, SchemaDocument, SchemaKind};

/// Storage for versioned item and record schemas.
///
/// Implementations must make the "highest version" check and the insert of
/// [`register`](Self::register) atomic, so that of two concurrent
/// registrations of the same `(identifier, version)` exactly one succeeds.
pub trait SchemaRegistry: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Register a new schema version.
  ///
  /// Fails with `DuplicateVersion` if the exact version exists, and with
  /// `InvalidVersion` if the version is zero or lower than the latest one.
  /// Version gaps are allowed.
  fn register(
    &self,
    input: NewSchema,
  ) -> impl Future<Output = Result<SchemaDocument, Self::Error>> + Send + '_;

  /// Fetch one exact version. Fails with `SchemaNotFound`.
  fn resolve<'a>(
    &'a self,
    kind: SchemaKind,
    identifier: &'a str,
    version: u32,
  ) -> impl Future<Output = Result<SchemaDocument, Self::Error>> + Send + 'a;

  /// Fetch the highest registered version. Fails with `SchemaNotFound`.
  fn latest<'a>(
    &'a self,
    kind: SchemaKind,
    identifier: &'a str,
  ) -> impl Future<Output = Result<SchemaDocument, Self::Error>> + Send + 'a;

  /// Fetch a schema row by its id. Fails with `SchemaIdNotFound`.
  fn get_schema(
    &self,
    kind: SchemaKind,
    schema_id: Uuid,
  ) -> impl Future<Output = Result<SchemaDocument, Self::Error>> + Send + '_;

  /// Every version of `identifier`, lowest first. Empty when unknown.
  fn list_versions<'a>(
    &'a self,
    kind: SchemaKind,
    identifier: &'a str,
  ) -> impl Future<Output = Result<Vec<SchemaDocument>, Self::Error>> + Send + 'a;

  /// Remove a schema row that nothing references.
  ///
  /// Fails with `ReferentialIntegrityViolation` while any record is bound to
  /// it.
  fn delete_schema(
    &self,
    kind: SchemaKind,
    schema_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
