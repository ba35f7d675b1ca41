//! Structural validation of JSON payloads against registered schema documents.
//!
//! Everything here is a pure function of `(schema, payload)`: no registry or
//! store access, so it can be exercised without a database. Validation never
//! stops at the first problem; callers get every violation at once.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single reason a payload does not conform to its schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
  /// JSON pointer to the offending location in the payload (`""` for the
  /// root). Missing required properties are reported at their parent object.
  pub path:    String,
  pub message: String,
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "violations", rename_all = "snake_case")]
pub enum ValidationResult {
  Valid,
  Invalid(Vec<Violation>),
}

impl ValidationResult {
  pub fn is_valid(&self) -> bool { matches!(self, Self::Valid) }

  /// Turn `Invalid` into [`Error::ValidationFailed`].
  pub fn into_result(self) -> Result<()> {
    match self {
      Self::Valid => Ok(()),
      Self::Invalid(violations) => Err(Error::ValidationFailed(violations)),
    }
  }
}

/// Confirm that `schema` compiles as a JSON Schema document.
pub fn check_schema(schema: &serde_json::Value) -> Result<()> {
  jsonschema::validator_for(schema)
    .map(drop)
    .map_err(|e| Error::InvalidSchema(e.to_string()))
}

/// Validate `payload` against `schema`, collecting every violation.
///
/// Fails only when the schema itself cannot be compiled.
pub fn validate(
  schema: &serde_json::Value,
  payload: &serde_json::Value,
) -> Result<ValidationResult> {
  let validator = jsonschema::validator_for(schema)
    .map_err(|e| Error::InvalidSchema(e.to_string()))?;

  let violations: Vec<Violation> = validator
    .iter_errors(payload)
    .map(|error| Violation {
      path:    error.instance_path.to_string(),
      message: error.to_string(),
    })
    .collect();

  if violations.is_empty() {
    Ok(ValidationResult::Valid)
  } else {
    Ok(ValidationResult::Invalid(violations))
  }
}
