//! Header and coordinate types shared by `.3dbv` and `.3dbx` documents.

use std::path::PathBuf;

use serde::Serialize;

/// A 2D point in design units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Coordinate {
    pub x: f64,
    pub y: f64,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self::default()
    }
}

/// Document header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Header {
    /// Format version, kept as text (`2.5` and `"2.5"` both become "2.5").
    pub version: String,
    /// Length unit, e.g. "micron".
    pub unit: String,
    /// Database units per `unit`.
    pub precision: i64,
    /// Resolved include paths, in declaration order.
    pub includes: Vec<PathBuf>,
}
