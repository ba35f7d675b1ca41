//! Core types and trait definitions for the Ashlar record catalogue.
//!
//! Holds the schema and record model, the pure validation engine and
//! geometry codec, and the storage traits. No database or HTTP dependencies.

#![allow(async_fn_in_trait)]

pub mod error;
pub mod fields;
pub mod geometry;
pub mod record;
pub mod registry;
pub mod schema;
pub mod store;
pub mod validation;

pub use error::{Error, Result};
