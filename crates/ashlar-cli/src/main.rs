//! `ashlar`, the administration tool for the Ashlar schema registry and record
//! store.
//!
//! Reads `ashlar.toml` (or the path given with `--config`), opens the SQLite
//! store, runs one command and prints the result as JSON.
//!
//! ```
//! ashlar schema register --kind record --identifier incident --version 1 --file incident.json
//! ashlar record create --record-type incident --data payload.json \
//!   --from 2024-06-01T09:00:00Z --to 2024-06-01T10:00:00Z \
//!   --label "Rear-end collision" --slug rear-end --x -8366553.5 --y 4859000.25
//! ```

mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, bail};
use ashlar_core::{
  geometry::{Coordinate, STORAGE_SRID},
  record::{NewRecord, RecordPatch},
  registry::SchemaRegistry,
  schema::{NewSchema, SchemaKind},
  store::{RecordQuery, RecordStore},
  validation::{self, ValidationResult},
};
use ashlar_store_sqlite::SqliteStore;
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::Settings;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(author, version, about = "Ashlar schema registry and record store")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "ashlar.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Register and inspect schema versions.
  #[command(subcommand)]
  Schema(SchemaCommand),
  /// Create, inspect and edit records.
  #[command(subcommand)]
  Record(RecordCommand),
  /// Check a payload against a registered record schema without storing it.
  Validate {
    #[arg(long)]
    record_type: String,
    /// Defaults to the latest version.
    #[arg(long)]
    version:     Option<u32>,
    /// JSON file holding the payload.
    #[arg(long)]
    data:        PathBuf,
  },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum KindArg {
  Item,
  Record,
}

impl From<KindArg> for SchemaKind {
  fn from(k: KindArg) -> Self {
    match k {
      KindArg::Item => Self::Item,
      KindArg::Record => Self::Record,
    }
  }
}

#[derive(Subcommand, Debug)]
enum SchemaCommand {
  /// Register a new immutable schema version.
  Register {
    #[arg(long, value_enum)]
    kind:       KindArg,
    /// Slug (item schemas) or record type (record schemas).
    #[arg(long)]
    identifier: String,
    #[arg(long)]
    version:    u32,
    /// JSON Schema document.
    #[arg(long)]
    file:       PathBuf,
    /// Display label; required for item schemas.
    #[arg(long)]
    label:      Option<String>,
  },
  /// Print one version, or the latest when `--version` is omitted.
  Show {
    #[arg(long, value_enum)]
    kind:       KindArg,
    #[arg(long)]
    identifier: String,
    #[arg(long)]
    version:    Option<u32>,
  },
  /// List every version of an identifier.
  Versions {
    #[arg(long, value_enum)]
    kind:       KindArg,
    #[arg(long)]
    identifier: String,
  },
  /// Delete a schema row that no record references.
  Delete {
    #[arg(long, value_enum)]
    kind:      KindArg,
    schema_id: Uuid,
  },
}

#[derive(Args, Debug)]
struct PointArgs {
  #[arg(long, allow_hyphen_values = true)]
  x:    Option<f64>,
  #[arg(long, allow_hyphen_values = true)]
  y:    Option<f64>,
  /// Spatial reference of `--x`/`--y`; only 3857 is stored.
  #[arg(long, default_value_t = STORAGE_SRID)]
  srid: i32,
}

impl PointArgs {
  fn coordinate(&self) -> anyhow::Result<Option<Coordinate>> {
    match (self.x, self.y) {
      (Some(x), Some(y)) => Ok(Some(Coordinate::new(x, y, self.srid))),
      (None, None) => Ok(None),
      _ => bail!("--x and --y must be given together"),
    }
  }
}

#[derive(Subcommand, Debug)]
enum RecordCommand {
  /// Validate and store a new record.
  Create {
    #[arg(long)]
    record_type: String,
    /// Defaults to the latest version.
    #[arg(long)]
    version:     Option<u32>,
    /// JSON file holding the payload.
    #[arg(long)]
    data:        PathBuf,
    #[arg(long)]
    from:        DateTime<Utc>,
    #[arg(long)]
    to:          DateTime<Utc>,
    #[arg(long)]
    label:       String,
    #[arg(long)]
    slug:        String,
    #[command(flatten)]
    point:       PointArgs,
  },
  Get {
    record_id: Uuid,
  },
  /// Change fields of a record; the schema binding never changes.
  Update {
    record_id: Uuid,
    #[arg(long)]
    data:      Option<PathBuf>,
    #[arg(long)]
    from:      Option<DateTime<Utc>>,
    #[arg(long)]
    to:        Option<DateTime<Utc>>,
    #[arg(long)]
    label:     Option<String>,
    #[arg(long)]
    slug:      Option<String>,
    #[command(flatten)]
    point:     PointArgs,
  },
  Delete {
    record_id: Uuid,
  },
  List {
    #[arg(long)]
    record_type: Option<String>,
    #[arg(long)]
    schema_id:   Option<Uuid>,
    #[arg(long)]
    after:       Option<DateTime<Utc>>,
    #[arg(long)]
    before:      Option<DateTime<Utc>>,
    #[arg(long)]
    limit:       Option<usize>,
    #[arg(long)]
    offset:      Option<usize>,
  },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr so stdout stays machine-readable.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;
  let store_path = settings.store_path();

  let store = SqliteStore::open_with(&store_path, settings.store_options())
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  tracing::debug!(path = ?store_path, "opened store");

  match cli.command {
    Command::Schema(cmd) => run_schema(&store, cmd).await,
    Command::Record(cmd) => run_record(&store, cmd).await,
    Command::Validate {
      record_type,
      version,
      data,
    } => {
      let schema = match version {
        Some(v) => store.resolve(SchemaKind::Record, &record_type, v).await?,
        None => store.latest(SchemaKind::Record, &record_type).await?,
      };
      let payload = read_json(&data)?;
      let result = validation::validate(&schema.schema, &payload)?;
      print_json(&result)?;
      if let ValidationResult::Invalid(violations) = result {
        bail!("payload has {} violation(s)", violations.len());
      }
      Ok(())
    }
  }
}

async fn run_schema(store: &SqliteStore, cmd: SchemaCommand) -> anyhow::Result<()> {
  match cmd {
    SchemaCommand::Register {
      kind,
      identifier,
      version,
      file,
      label,
    } => {
      let input = NewSchema {
        kind: kind.into(),
        identifier,
        version,
        schema: read_json(&file)?,
        label,
      };
      print_json(&store.register(input).await?)
    }
    SchemaCommand::Show {
      kind,
      identifier,
      version,
    } => {
      let doc = match version {
        Some(v) => store.resolve(kind.into(), &identifier, v).await?,
        None => store.latest(kind.into(), &identifier).await?,
      };
      print_json(&doc)
    }
    SchemaCommand::Versions { kind, identifier } => {
      print_json(&store.list_versions(kind.into(), &identifier).await?)
    }
    SchemaCommand::Delete { kind, schema_id } => {
      store.delete_schema(kind.into(), schema_id).await?;
      Ok(())
    }
  }
}

async fn run_record(store: &SqliteStore, cmd: RecordCommand) -> anyhow::Result<()> {
  match cmd {
    RecordCommand::Create {
      record_type,
      version,
      data,
      from,
      to,
      label,
      slug,
      point,
    } => {
      let Some(geom) = point.coordinate()? else {
        bail!("--x and --y are required");
      };
      let input = NewRecord {
        record_type,
        version,
        data: read_json(&data)?,
        occurred_from: from,
        occurred_to: to,
        label,
        slug,
        geom,
      };
      print_json(&store.create_record(input).await?)
    }
    RecordCommand::Get { record_id } => {
      print_json(&store.get_record(record_id).await?)
    }
    RecordCommand::Update {
      record_id,
      data,
      from,
      to,
      label,
      slug,
      point,
    } => {
      let patch = RecordPatch {
        occurred_from: from,
        occurred_to: to,
        label,
        slug,
        geom: point.coordinate()?,
        data: data.as_deref().map(read_json).transpose()?,
      };
      print_json(&store.update_record(record_id, patch).await?)
    }
    RecordCommand::Delete { record_id } => {
      store.delete_record(record_id).await?;
      Ok(())
    }
    RecordCommand::List {
      record_type,
      schema_id,
      after,
      before,
      limit,
      offset,
    } => {
      let query = RecordQuery {
        record_type,
        schema_id,
        occurred_after: after,
        occurred_before: before,
        limit,
        offset,
      };
      print_json(&store.list_records(&query).await?)
    }
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn read_json(path: &Path) -> anyhow::Result<serde_json::Value> {
  let text = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read {path:?}"))?;
  serde_json::from_str(&text)
    .with_context(|| format!("{path:?} is not valid JSON"))
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[cfg(test)]
mod tests {
  use clap::CommandFactory;

  use super::*;

  #[test]
  fn cli_definition_is_consistent() { Cli::command().debug_assert(); }

  #[test]
  fn parses_record_create_with_negative_coordinates() {
    let cli = Cli::try_parse_from([
      "ashlar",
      "record",
      "create",
      "--record-type",
      "incident",
      "--data",
      "payload.json",
      "--from",
      "2024-06-01T09:00:00Z",
      "--to",
      "2024-06-01T10:00:00Z",
      "--label",
      "Collision",
      "--slug",
      "collision",
      "--x",
      "-8366553.5",
      "--y",
      "4859000.25",
    ])
    .unwrap();

    let Command::Record(RecordCommand::Create { point, version, .. }) =
      cli.command
    else {
      panic!("expected record create");
    };
    assert_eq!(version, None);
    assert_eq!(
      point.coordinate().unwrap(),
      Some(Coordinate::web_mercator(-8_366_553.5, 4_859_000.25))
    );
  }

  #[test]
  fn lone_x_is_rejected() {
    let point = PointArgs {
      x:    Some(1.0),
      y:    None,
      srid: STORAGE_SRID,
    };
    assert!(point.coordinate().is_err());
  }
}
