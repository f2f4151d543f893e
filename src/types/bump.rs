//! Bump map types (`.bmap`).

use serde::Serialize;

/// Column value meaning "no port" / "no net".
pub const ABSENT_TOKEN: &str = "-";

/// One bump: `bumpInstName bumpCellType x y portName netName`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BumpMapEntry {
    pub bump_inst_name: String,
    pub bump_cell_type: String,
    pub x: f64,
    pub y: f64,
    /// `None` when the column is `-`.
    pub port_name: Option<String>,
    /// `None` when the column is `-`.
    pub net_name: Option<String>,
}

/// Parsed `.bmap` file, entries in file order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BumpMapData {
    pub entries: Vec<BumpMapEntry>,
}

impl BumpMapData {
    /// Entries connected to `net`.
    pub fn on_net<'a>(&'a self, net: &'a str) -> impl Iterator<Item = &'a BumpMapEntry> {
        self.entries
            .iter()
            .filter(move |e| e.net_name.as_deref() == Some(net))
    }

    /// Entries with neither a port nor a net.
    pub fn unassigned(&self) -> impl Iterator<Item = &BumpMapEntry> {
        self.entries
            .iter()
            .filter(|e| e.port_name.is_none() && e.net_name.is_none())
    }
}
