//! Point geometry and its stored form.
//!
//! Every stored point uses one projected spatial reference, Web Mercator
//! (EPSG:3857, metres). The codec refuses coordinates in any other system
//! rather than reprojecting them; reprojection belongs to the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Spatial reference identifier of every stored point.
pub const STORAGE_SRID: i32 = 3857;

/// An in-memory point tagged with the spatial reference it is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
  pub x:    f64,
  pub y:    f64,
  pub srid: i32,
}

impl Coordinate {
  pub fn new(x: f64, y: f64, srid: i32) -> Self { Self { x, y, srid } }

  /// A point already expressed in the storage reference system.
  pub fn web_mercator(x: f64, y: f64) -> Self { Self::new(x, y, STORAGE_SRID) }
}

/// The persisted text form of a point: EWKT, e.g. `SRID=3857;POINT(1 2)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPoint(String);

impl StoredPoint {
  /// Wrap text read back from storage. Not checked until [`decode`].
  pub fn from_raw(raw: impl Into<String>) -> Self { Self(raw.into()) }

  pub fn as_str(&self) -> &str { &self.0 }

  pub fn into_inner(self) -> String { self.0 }
}

impl fmt::Display for StoredPoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Encode a coordinate for storage.
pub fn encode(coord: &Coordinate) -> Result<StoredPoint> {
  if coord.srid != STORAGE_SRID {
    return Err(Error::SridMismatch {
      expected: STORAGE_SRID,
      found:    coord.srid,
    });
  }
  if !coord.x.is_finite() || !coord.y.is_finite() {
    return Err(Error::InvalidCoordinate {
      x: coord.x,
      y: coord.y,
    });
  }
  Ok(StoredPoint(format!(
    "SRID={STORAGE_SRID};POINT({} {})",
    coord.x, coord.y
  )))
}

/// Decode a stored point. The result always carries [`STORAGE_SRID`].
pub fn decode(stored: &StoredPoint) -> Result<Coordinate> {
  let malformed = || Error::MalformedGeometry(stored.0.clone());

  let (srid_part, point_part) =
    stored.0.split_once(';').ok_or_else(malformed)?;

  let srid: i32 = srid_part
    .trim()
    .strip_prefix("SRID=")
    .and_then(|s| s.parse().ok())
    .ok_or_else(malformed)?;
  if srid != STORAGE_SRID {
    return Err(Error::MalformedGeometry(format!(
      "stored SRID {srid} differs from {STORAGE_SRID}"
    )));
  }

  let body = point_part
    .trim()
    .strip_prefix("POINT(")
    .and_then(|s| s.strip_suffix(')'))
    .ok_or_else(malformed)?;

  let mut parts = body.split_whitespace();
  let x: f64 = parts
    .next()
    .and_then(|s| s.parse().ok())
    .ok_or_else(malformed)?;
  let y: f64 = parts
    .next()
    .and_then(|s| s.parse().ok())
    .ok_or_else(malformed)?;
  if parts.next().is_some() || !x.is_finite() || !y.is_finite() {
    return Err(malformed());
  }

  Ok(Coordinate::web_mercator(x, y))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn encodes_as_ewkt() {
    let stored = encode(&Coordinate::web_mercator(-8_366_553.5, 4_859_000.25))
      .unwrap();
    assert_eq!(stored.as_str(), "SRID=3857;POINT(-8366553.5 4859000.25)");
  }

  #[test]
  fn decode_recovers_exact_values() {
    let coord = Coordinate::web_mercator(0.1 + 0.2, -1.0e-7);
    let decoded = decode(&encode(&coord).unwrap()).unwrap();
    assert_eq!(decoded, coord);
  }

  #[test]
  fn foreign_srid_is_refused() {
    let wgs84 = Coordinate::new(-75.16, 39.95, 4326);
    assert!(matches!(
      encode(&wgs84),
      Err(Error::SridMismatch { expected: 3857, found: 4326 })
    ));
  }

  #[test]
  fn non_finite_coordinates_are_refused() {
    assert!(matches!(
      encode(&Coordinate::web_mercator(f64::NAN, 0.0)),
      Err(Error::InvalidCoordinate { .. })
    ));
    assert!(matches!(
      encode(&Coordinate::web_mercator(0.0, f64::INFINITY)),
      Err(Error::InvalidCoordinate { .. })
    ));
  }

  #[test]
  fn decode_rejects_garbage() {
    for raw in [
      "",
      "POINT(1 2)",
      "SRID=3857;POINT(1)",
      "SRID=3857;POINT(1 2 3)",
      "SRID=3857;LINESTRING(1 2, 3 4)",
      "SRID=abc;POINT(1 2)",
    ] {
      assert!(
        matches!(
          decode(&StoredPoint::from_raw(raw)),
          Err(Error::MalformedGeometry(_))
        ),
        "{raw:?} should not decode"
      );
    }
  }

  #[test]
  fn decode_does_not_reproject_foreign_rows() {
    let stored = StoredPoint::from_raw("SRID=4326;POINT(1 2)");
    assert!(matches!(decode(&stored), Err(Error::MalformedGeometry(_))));
  }
}
