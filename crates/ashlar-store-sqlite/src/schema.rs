//! SQL schema for the Ashlar SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Schema tables are strictly append-only.
-- No UPDATE is ever issued against them; DELETE only for unreferenced rows.
CREATE TABLE IF NOT EXISTS item_schemas (
    schema_id   TEXT PRIMARY KEY,
    created     TEXT NOT NULL,
    modified    TEXT NOT NULL,
    version     INTEGER NOT NULL CHECK (version > 0),
    schema_json TEXT NOT NULL,
    label       TEXT NOT NULL,
    slug        TEXT NOT NULL,
    UNIQUE (slug, version)
);

CREATE TABLE IF NOT EXISTS record_schemas (
    schema_id   TEXT PRIMARY KEY,
    created     TEXT NOT NULL,
    modified    TEXT NOT NULL,
    version     INTEGER NOT NULL CHECK (version > 0),
    schema_json TEXT NOT NULL,
    record_type TEXT NOT NULL,
    UNIQUE (record_type, version)
);

-- Timestamps are fixed-width RFC 3339 (nanoseconds, `Z`), so text order is
-- chronological order.
CREATE TABLE IF NOT EXISTS records (
    record_id     TEXT PRIMARY KEY,
    created       TEXT NOT NULL,
    modified      TEXT NOT NULL,
    occurred_from TEXT NOT NULL,
    occurred_to   TEXT NOT NULL,
    label         TEXT NOT NULL,
    slug          TEXT NOT NULL,
    geom          TEXT NOT NULL CHECK (geom LIKE 'SRID=3857;POINT(%'),
    data_json     TEXT NOT NULL,
    schema_id     TEXT NOT NULL
                  REFERENCES record_schemas(schema_id) ON DELETE RESTRICT,
    CHECK (occurred_from <= occurred_to)
);

CREATE INDEX IF NOT EXISTS records_schema_idx   ON records(schema_id);
CREATE INDEX IF NOT EXISTS records_occurred_idx ON records(occurred_from, occurred_to);

PRAGMA user_version = 1;
";
