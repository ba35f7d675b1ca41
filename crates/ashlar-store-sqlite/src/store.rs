//! [`SqliteStore`]: the SQLite implementation of [`SchemaRegistry`] and
//! [`RecordStore`].

use std::{path::Path, time::Duration};

use ashlar_core::{
  Error as CoreError,
  record::{NewRecord, OCCURRENCE_YEARS, Record, RecordPatch},
  registry::SchemaRegistry,
  schema::{NewSchema, SchemaDocument, SchemaKind},
  store::{RecordQuery, RecordStore},
};
use chrono::{DateTime, Datelike as _, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior, ffi};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    RECORD_COLUMNS, RawRecord, RawSchema, encode_dt, encode_uuid,
    schema_columns, schema_table,
  },
  schema::SCHEMA,
};

// ─── Options ─────────────────────────────────────────────────────────────────

/// Tunables for [`SqliteStore`].
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  /// Deadline applied to each store operation as a whole.
  pub op_timeout: Duration,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      op_timeout: Duration::from_secs(5),
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Ashlar schema registry and record store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection is reference-counted, and all
/// clones share one background thread, which serialises statements.
#[derive(Clone)]
pub struct SqliteStore {
  conn:       tokio_rusqlite::Connection,
  op_timeout: Duration,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with default options.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open_with(
    path: impl AsRef<Path>,
    options: StoreOptions,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self {
      conn,
      op_timeout: options.op_timeout,
    };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self {
      conn,
      op_timeout: StoreOptions::default().op_timeout,
    };
    store.init_schema().await?;
    Ok(store)
  }

  /// A handle on the same database whose operations use `timeout` as their
  /// deadline.
  pub fn with_timeout(&self, timeout: Duration) -> Self {
    Self {
      conn:       self.conn.clone(),
      op_timeout: timeout,
    }
  }

  pub fn op_timeout(&self) -> Duration { self.op_timeout }

  async fn init_schema(&self) -> Result<()> {
    self
      .call("init_schema", |conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await
  }

  /// Run `function` on the connection thread under the handle's deadline.
  ///
  /// Every trait method issues exactly one `call`, so the deadline covers the
  /// whole operation. On expiry the caller gets [`CoreError::Timeout`]; the
  /// statement itself is not interrupted and may still complete.
  pub(crate) async fn call<F, R>(&self, op: &'static str, function: F) -> Result<R>
  where
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<R>
      + Send
      + 'static,
    R: Send + 'static,
  {
    tracing::debug!(op, "store call");
    match tokio::time::timeout(self.op_timeout, self.conn.call(function)).await
    {
      Ok(result) => Ok(result?),
      Err(_elapsed) => {
        tracing::warn!(op, timeout = ?self.op_timeout, "store call timed out");
        Err(CoreError::Timeout(self.op_timeout).into())
      }
    }
  }

  async fn fetch_schema(
    &self,
    op: &'static str,
    kind: SchemaKind,
    lookup: Lookup,
  ) -> Result<Option<SchemaDocument>> {
    self
      .call(op, move |conn| Ok(query_schema(conn, kind, &lookup)))
      .await?
  }
}

/// Extended SQLite result code of a constraint failure, if `err` is one.
fn violated_constraint(err: &Error) -> Option<i32> {
  match err {
    Error::Database(tokio_rusqlite::Error::Rusqlite(
      rusqlite::Error::SqliteFailure(e, _),
    )) if e.code == rusqlite::ErrorCode::ConstraintViolation => {
      Some(e.extended_code)
    }
    _ => None,
  }
}

// ─── Statements ──────────────────────────────────────────────────────────────

/// How a single schema row is found.
enum Lookup {
  Version(String, u32),
  Latest(String),
  Id(Uuid),
}

fn query_schema(
  conn: &rusqlite::Connection,
  kind: SchemaKind,
  lookup: &Lookup,
) -> Result<Option<SchemaDocument>> {
  let ident_col = kind.identifier_field();
  let filter = match lookup {
    Lookup::Version(..) => format!("{ident_col} = ?1 AND version = ?2"),
    Lookup::Latest(_) => {
      format!("{ident_col} = ?1 ORDER BY version DESC LIMIT 1")
    }
    Lookup::Id(_) => "schema_id = ?1".to_owned(),
  };
  let sql = format!(
    "SELECT {} FROM {} WHERE {filter}",
    schema_columns(kind),
    schema_table(kind),
  );

  let mut stmt = conn.prepare(&sql)?;
  let raw = match lookup {
    Lookup::Version(key, v) => stmt
      .query_row(rusqlite::params![key, v], RawSchema::from_row)
      .optional()?,
    Lookup::Latest(key) => stmt
      .query_row(rusqlite::params![key], RawSchema::from_row)
      .optional()?,
    Lookup::Id(id) => stmt
      .query_row(rusqlite::params![encode_uuid(*id)], RawSchema::from_row)
      .optional()?,
  };
  raw.map(|r| r.into_document(kind)).transpose()
}

fn query_record(
  conn: &rusqlite::Connection,
  record_id: Uuid,
) -> Result<Option<Record>> {
  let raw = conn
    .query_row(
      &format!("SELECT {RECORD_COLUMNS} FROM records r WHERE r.record_id = ?1"),
      rusqlite::params![encode_uuid(record_id)],
      RawRecord::from_row,
    )
    .optional()?;
  raw.map(RawRecord::into_record).transpose()
}

/// Resolve the schema, check the input against it and insert the record, all
/// inside one IMMEDIATE transaction.
fn insert_record(
  conn: &mut rusqlite::Connection,
  input: NewRecord,
) -> Result<(Record, SchemaDocument)> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let lookup = match input.version {
    Some(v) => Lookup::Version(input.record_type.clone(), v),
    None => Lookup::Latest(input.record_type.clone()),
  };
  let schema = query_schema(&tx, SchemaKind::Record, &lookup)?.ok_or_else(
    || CoreError::SchemaNotFound {
      kind:       SchemaKind::Record,
      identifier: input.record_type.clone(),
      version:    input.version,
    },
  )?;

  // Every check runs before the insert; nothing is written on failure.
  let geom = input.prepare(&schema)?;

  let now = Utc::now();
  let record = Record {
    record_id:     Uuid::new_v4(),
    created:       now,
    modified:      now,
    occurred_from: input.occurred_from,
    occurred_to:   input.occurred_to,
    label:         input.label,
    slug:          input.slug,
    geom:          input.geom,
    data:          input.data,
    schema_id:     schema.schema_id,
  };

  tx.execute(
    "INSERT INTO records (
       record_id, created, modified, occurred_from, occurred_to,
       label, slug, geom, data_json, schema_id
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    rusqlite::params![
      encode_uuid(record.record_id),
      encode_dt(record.created),
      encode_dt(record.modified),
      encode_dt(record.occurred_from),
      encode_dt(record.occurred_to),
      record.label,
      record.slug,
      geom.into_inner(),
      serde_json::to_string(&record.data)?,
      encode_uuid(record.schema_id),
    ],
  )?;
  tx.commit()?;
  Ok((record, schema))
}

/// Read, patch and write back one record inside one IMMEDIATE transaction, so
/// concurrent patches apply one after the other.
fn patch_record(
  conn: &mut rusqlite::Connection,
  record_id: Uuid,
  patch: RecordPatch,
) -> Result<Record> {
  let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

  let current =
    query_record(&tx, record_id)?.ok_or(CoreError::RecordNotFound(record_id))?;
  if patch.is_empty() {
    return Ok(current);
  }

  let schema_id = current.schema_id;
  let schema = query_schema(&tx, SchemaKind::Record, &Lookup::Id(schema_id))?
    .ok_or(CoreError::SchemaIdNotFound(SchemaKind::Record, schema_id))?;
  let (record, geom) = patch.apply(current, &schema, Utc::now())?;

  tx.execute(
    "UPDATE records
       SET modified = ?2, occurred_from = ?3, occurred_to = ?4,
           label = ?5, slug = ?6, geom = ?7, data_json = ?8
     WHERE record_id = ?1",
    rusqlite::params![
      encode_uuid(record.record_id),
      encode_dt(record.modified),
      encode_dt(record.occurred_from),
      encode_dt(record.occurred_to),
      record.label,
      record.slug,
      geom.into_inner(),
      serde_json::to_string(&record.data)?,
    ],
  )?;
  tx.commit()?;
  Ok(record)
}

/// One end of a listing window, measured against the storable occurrence
/// years.
enum WindowEnd {
  Open,
  At(String),
  /// No stored occurrence can fall on the requested side of this bound.
  Unreachable,
}

impl WindowEnd {
  fn after(t: Option<DateTime<Utc>>) -> Self {
    match t {
      None => Self::Open,
      Some(t) if t.year() > *OCCURRENCE_YEARS.end() => Self::Unreachable,
      Some(t) if t.year() < *OCCURRENCE_YEARS.start() => Self::Open,
      Some(t) => Self::At(encode_dt(t)),
    }
  }

  fn before(t: Option<DateTime<Utc>>) -> Self {
    match t {
      None => Self::Open,
      Some(t) if t.year() < *OCCURRENCE_YEARS.start() => Self::Unreachable,
      Some(t) if t.year() > *OCCURRENCE_YEARS.end() => Self::Open,
      Some(t) => Self::At(encode_dt(t)),
    }
  }

  fn into_param(self) -> Option<Option<String>> {
    match self {
      Self::Open => Some(None),
      Self::At(s) => Some(Some(s)),
      Self::Unreachable => None,
    }
  }
}

// ─── SchemaRegistry impl ─────────────────────────────────────────────────────

impl SchemaRegistry for SqliteStore {
  type Error = Error;

  async fn register(&self, input: NewSchema) -> Result<SchemaDocument> {
    input.check()?;

    let now = Utc::now();
    let doc = SchemaDocument {
      schema_id:  Uuid::new_v4(),
      kind:       input.kind,
      identifier: input.identifier,
      version:    input.version,
      schema:     input.schema,
      label:      input.label,
      created:    now,
      modified:   now,
    };

    let kind          = doc.kind;
    let table         = schema_table(kind);
    let ident_col     = kind.identifier_field();
    let id_str        = encode_uuid(doc.schema_id);
    let at_str        = encode_dt(now);
    let schema_str    = serde_json::to_string(&doc.schema)?;
    let identifier    = doc.identifier.clone();
    let version       = doc.version;
    let label         = doc.label.clone();

    // The max-version check and the insert share one IMMEDIATE transaction,
    // and UNIQUE (identifier, version) backs it up.
    let result = self
      .call("register", move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let latest: Option<u32> = tx.query_row(
          &format!("SELECT MAX(version) FROM {table} WHERE {ident_col} = ?1"),
          rusqlite::params![identifier],
          |r| r.get(0),
        )?;

        if let Some(latest) = latest
          && version <= latest
        {
          let taken: bool = tx.query_row(
            &format!(
              "SELECT EXISTS (SELECT 1 FROM {table} WHERE {ident_col} = ?1 AND version = ?2)"
            ),
            rusqlite::params![identifier, version],
            |r| r.get(0),
          )?;
          let err = if taken {
            CoreError::DuplicateVersion { kind, identifier, version }
          } else {
            CoreError::InvalidVersion {
              kind,
              identifier,
              version,
              latest: Some(latest),
            }
          };
          return Ok(Err(err));
        }

        match kind {
          SchemaKind::Item => tx.execute(
            "INSERT INTO item_schemas
               (schema_id, created, modified, version, schema_json, label, slug)
             VALUES (?1, ?2, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![id_str, at_str, version, schema_str, label, identifier],
          )?,
          SchemaKind::Record => tx.execute(
            "INSERT INTO record_schemas
               (schema_id, created, modified, version, schema_json, record_type)
             VALUES (?1, ?2, ?2, ?3, ?4, ?5)",
            rusqlite::params![id_str, at_str, version, schema_str, identifier],
          )?,
        };
        tx.commit()?;
        Ok(Ok(()))
      })
      .await;

    match result {
      Ok(Ok(())) => {
        tracing::info!(
          kind = %doc.kind,
          identifier = %doc.identifier,
          version = doc.version,
          schema_id = %doc.schema_id,
          "registered schema",
        );
        Ok(doc)
      }
      Ok(Err(e)) => {
        tracing::debug!(error = %e, "schema registration rejected");
        Err(e.into())
      }
      Err(e) if violated_constraint(&e) == Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => {
        tracing::warn!(
          kind = %doc.kind,
          identifier = %doc.identifier,
          version = doc.version,
          "unique constraint rejected schema registration",
        );
        Err(
          CoreError::DuplicateVersion {
            kind:       doc.kind,
            identifier: doc.identifier,
            version:    doc.version,
          }
          .into(),
        )
      }
      Err(e) => Err(e),
    }
  }

  async fn resolve(
    &self,
    kind: SchemaKind,
    identifier: &str,
    version: u32,
  ) -> Result<SchemaDocument> {
    let lookup = Lookup::Version(identifier.to_owned(), version);
    self
      .fetch_schema("resolve", kind, lookup)
      .await?
      .ok_or_else(|| {
        CoreError::SchemaNotFound {
          kind,
          identifier: identifier.to_owned(),
          version: Some(version),
        }
        .into()
      })
  }

  async fn latest(
    &self,
    kind: SchemaKind,
    identifier: &str,
  ) -> Result<SchemaDocument> {
    self
      .fetch_schema("latest", kind, Lookup::Latest(identifier.to_owned()))
      .await?
      .ok_or_else(|| {
        CoreError::SchemaNotFound {
          kind,
          identifier: identifier.to_owned(),
          version: None,
        }
        .into()
      })
  }

  async fn get_schema(
    &self,
    kind: SchemaKind,
    schema_id: Uuid,
  ) -> Result<SchemaDocument> {
    self
      .fetch_schema("get_schema", kind, Lookup::Id(schema_id))
      .await?
      .ok_or_else(|| CoreError::SchemaIdNotFound(kind, schema_id).into())
  }

  async fn list_versions(
    &self,
    kind: SchemaKind,
    identifier: &str,
  ) -> Result<Vec<SchemaDocument>> {
    let sql = format!(
      "SELECT {} FROM {} WHERE {} = ?1 ORDER BY version ASC",
      schema_columns(kind),
      schema_table(kind),
      kind.identifier_field(),
    );
    let identifier = identifier.to_owned();

    let raws: Vec<RawSchema> = self
      .call("list_versions", move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![identifier], RawSchema::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(|r| r.into_document(kind)).collect()
  }

  async fn delete_schema(&self, kind: SchemaKind, schema_id: Uuid) -> Result<()> {
    let table  = schema_table(kind);
    let id_str = encode_uuid(schema_id);

    let outcome = self
      .call("delete_schema", move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: bool = tx.query_row(
          &format!("SELECT EXISTS (SELECT 1 FROM {table} WHERE schema_id = ?1)"),
          rusqlite::params![id_str],
          |r| r.get(0),
        )?;
        if !exists {
          return Ok(Err(CoreError::SchemaIdNotFound(kind, schema_id)));
        }

        if kind == SchemaKind::Record {
          let referenced: bool = tx.query_row(
            "SELECT EXISTS (SELECT 1 FROM records WHERE schema_id = ?1)",
            rusqlite::params![id_str],
            |r| r.get(0),
          )?;
          if referenced {
            return Ok(Err(CoreError::ReferentialIntegrityViolation {
              kind,
              schema_id,
            }));
          }
        }

        tx.execute(
          &format!("DELETE FROM {table} WHERE schema_id = ?1"),
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(Ok(()))
      })
      .await;

    match outcome {
      Ok(Ok(())) => {
        tracing::info!(%kind, %schema_id, "deleted schema");
        Ok(())
      }
      Ok(Err(e)) => Err(e.into()),
      Err(e) if violated_constraint(&e) == Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
        Err(CoreError::ReferentialIntegrityViolation { kind, schema_id }.into())
      }
      Err(e) => Err(e),
    }
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = Error;

  async fn create_record(&self, input: NewRecord) -> Result<Record> {
    let (record, schema) = self
      .call("create_record", move |conn| Ok(insert_record(conn, input)))
      .await??;

    tracing::debug!(
      record_id = %record.record_id,
      record_type = %schema.identifier,
      version = schema.version,
      "created record",
    );
    Ok(record)
  }

  async fn get_record(&self, record_id: Uuid) -> Result<Record> {
    self
      .call("get_record", move |conn| Ok(query_record(conn, record_id)))
      .await??
      .ok_or_else(|| CoreError::RecordNotFound(record_id).into())
  }

  async fn update_record(
    &self,
    record_id: Uuid,
    patch: RecordPatch,
  ) -> Result<Record> {
    self
      .call("update_record", move |conn| {
        Ok(patch_record(conn, record_id, patch))
      })
      .await?
  }

  async fn delete_record(&self, record_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(record_id);

    let changed = self
      .call("delete_record", move |conn| {
        Ok(conn.execute(
          "DELETE FROM records WHERE record_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(CoreError::RecordNotFound(record_id).into());
    }
    Ok(())
  }

  async fn list_records(&self, query: &RecordQuery) -> Result<Vec<Record>> {
    let record_type = query.record_type.clone();
    let schema_id   = query.schema_id.map(encode_uuid);
    let (Some(after), Some(before)) = (
      WindowEnd::after(query.occurred_after).into_param(),
      WindowEnd::before(query.occurred_before).into_param(),
    ) else {
      return Ok(Vec::new());
    };
    let limit_val   = i64::try_from(query.limit.unwrap_or(100)).unwrap_or(i64::MAX);
    let offset_val  = i64::try_from(query.offset.unwrap_or(0)).unwrap_or(i64::MAX);

    let raws: Vec<RawRecord> = self
      .call("list_records", move |conn| {
        let sql = format!(
          "SELECT {RECORD_COLUMNS}
           FROM records r
           JOIN record_schemas s ON s.schema_id = r.schema_id
           WHERE (?1 IS NULL OR s.record_type = ?1)
             AND (?2 IS NULL OR r.schema_id = ?2)
             AND (?3 IS NULL OR r.occurred_to >= ?3)
             AND (?4 IS NULL OR r.occurred_from <= ?4)
           ORDER BY r.occurred_from, r.record_id
           LIMIT ?5 OFFSET ?6"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              record_type,
              schema_id,
              after,
              before,
              limit_val,
              offset_val,
            ],
            RawRecord::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }
}
