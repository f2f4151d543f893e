//! Chiplet definition types (`.3dbv`).

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::header::{Coordinate, Header};

/// What kind of object a chiplet definition describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChipletType {
    Die,
    Interposer,
    Rdl,
    Ip,
    Substrate,
    Hier,
}

impl ChipletType {
    pub const ALL: [ChipletType; 6] = [
        ChipletType::Die,
        ChipletType::Interposer,
        ChipletType::Rdl,
        ChipletType::Ip,
        ChipletType::Substrate,
        ChipletType::Hier,
    ];

    /// Parse a type token (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChipletType::Die => "die",
            ChipletType::Interposer => "interposer",
            ChipletType::Rdl => "rdl",
            ChipletType::Ip => "ip",
            ChipletType::Substrate => "substrate",
            ChipletType::Hier => "hier",
        }
    }
}

impl fmt::Display for ChipletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chiplet face a region sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Front,
    Back,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Front, Side::Back];

    /// Parse a side token (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "front" => Some(Side::Front),
            "back" => Some(Side::Back),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Front => "front",
            Side::Back => "back",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-edge widths, in `[left, bottom, right, top]` order in the source.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EdgeWidths {
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
    pub top: f64,
}

impl EdgeWidths {
    pub fn from_array(values: [f64; 4]) -> Self {
        let [left, bottom, right, top] = values;
        Self { left, bottom, right, top }
    }
}

/// A named polygon on one face of a chiplet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChipletRegion {
    pub name: String,
    /// `None` when the region names no side.
    pub side: Option<Side>,
    /// Bump map file (`bmap`).
    pub bmap: Option<PathBuf>,
    /// Pad map file (`pmap`).
    pub pmap: Option<PathBuf>,
    pub layer: Option<String>,
    pub gds_layer: Option<String>,
    /// Polygon boundary. Not checked for a minimum vertex count here.
    pub coords: Vec<Coordinate>,
}

/// Implementation files attached to a chiplet definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChipletExternal {
    pub lef_files: Vec<PathBuf>,
    pub tech_lef_files: Vec<PathBuf>,
    pub lib_files: Vec<PathBuf>,
    pub def_file: Option<PathBuf>,
}

/// One chiplet template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChipletDef {
    pub name: String,
    #[serde(rename = "type")]
    pub chiplet_type: ChipletType,
    pub design_width: Option<f64>,
    pub design_height: Option<f64>,
    pub offset: Coordinate,
    pub seal_ring_width: Option<EdgeWidths>,
    pub scribe_line_remaining_width: Option<EdgeWidths>,
    pub thickness: Option<f64>,
    pub shrink: Option<f64>,
    pub tsv: bool,
    pub regions: BTreeMap<String, ChipletRegion>,
    pub external: ChipletExternal,
}

impl ChipletDef {
    /// A definition with only the required type set.
    pub fn new(name: impl Into<String>, chiplet_type: ChipletType) -> Self {
        Self {
            name: name.into(),
            chiplet_type,
            design_width: None,
            design_height: None,
            offset: Coordinate::origin(),
            seal_ring_width: None,
            scribe_line_remaining_width: None,
            thickness: None,
            shrink: None,
            tsv: false,
            regions: BTreeMap::new(),
            external: ChipletExternal::default(),
        }
    }
}

/// Parsed `.3dbv` document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbvData {
    pub header: Header,
    pub chiplet_defs: BTreeMap<String, ChipletDef>,
}
