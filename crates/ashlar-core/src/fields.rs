//! Limits on the short text columns (labels, slugs, record types).

use crate::{Error, Result};

/// Upper bound, in characters, for every label and identifier column.
pub const MAX_TEXT_LEN: usize = 50;

/// Reject empty or over-long values for the named field.
pub fn check_text(field: &'static str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(Error::InvalidField {
      field,
      reason: "must not be empty".into(),
    });
  }
  let len = value.chars().count();
  if len > MAX_TEXT_LEN {
    return Err(Error::InvalidField {
      field,
      reason: format!("{len} characters exceeds the limit of {MAX_TEXT_LEN}"),
    });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_value_at_limit() {
    let value = "x".repeat(MAX_TEXT_LEN);
    assert!(check_text("label", &value).is_ok());
  }

  #[test]
  fn rejects_value_over_limit() {
    let value = "x".repeat(MAX_TEXT_LEN + 1);
    let err = check_text("slug", &value).unwrap_err();
    assert!(matches!(err, Error::InvalidField { field: "slug", .. }));
  }

  #[test]
  fn counts_characters_not_bytes() {
    // 50 two-byte characters.
    let value = "é".repeat(MAX_TEXT_LEN);
    assert!(check_text("label", &value).is_ok());
  }

  #[test]
  fn rejects_blank() {
    assert!(check_text("label", "   ").is_err());
    assert!(check_text("label", "").is_err());
  }
}
