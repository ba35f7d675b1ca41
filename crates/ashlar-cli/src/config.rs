//! Runtime configuration, read from `ashlar.toml` and `ASHLAR_*` variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use ashlar_store_sqlite::StoreOptions;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// SQLite database file; a leading `~/` is expanded.
  #[serde(default = "default_store_path")]
  pub store_path:    PathBuf,
  /// Deadline for each store operation, in milliseconds.
  #[serde(default = "default_op_timeout_ms")]
  pub op_timeout_ms: u64,
}

fn default_store_path() -> PathBuf { PathBuf::from("ashlar.db") }

fn default_op_timeout_ms() -> u64 { 5_000 }

impl Settings {
  /// Layer the optional config file under `ASHLAR_*` environment variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("ASHLAR"))
      .build()
      .with_context(|| format!("failed to read config file {path:?}"))?;

    settings
      .try_deserialize()
      .context("failed to deserialise Settings")
  }

  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      op_timeout: Duration::from_millis(self.op_timeout_ms),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_config(contents: &str) -> PathBuf {
    let path = std::env::temp_dir()
      .join(format!("ashlar-config-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&path, contents).unwrap();
    path
  }

  #[test]
  fn reads_values_from_file() {
    let path = temp_config(
      "store_path = \"/var/lib/ashlar/catalog.db\"\nop_timeout_ms = 250\n",
    );
    let settings = Settings::load(&path).unwrap();
    assert_eq!(settings.store_path(), PathBuf::from("/var/lib/ashlar/catalog.db"));
    assert_eq!(settings.store_options().op_timeout, Duration::from_millis(250));
    std::fs::remove_file(path).ok();
  }

  #[test]
  fn partial_file_falls_back_to_defaults() {
    let path = temp_config("op_timeout_ms = 10\n");
    let settings = Settings::load(&path).unwrap();
    assert_eq!(settings.store_path, PathBuf::from("ashlar.db"));
    assert_eq!(settings.op_timeout_ms, 10);
    std::fs::remove_file(path).ok();
  }

  #[test]
  fn absolute_paths_are_left_alone() {
    let path = Path::new("/tmp/ashlar.db");
    assert_eq!(expand_tilde(path), path);
  }
}
