//! Data model for 3D chiplet stacking descriptions.
//!
//! - `Header` - version/unit/precision shared by the structured formats
//! - `DbvData` - chiplet definitions (`.3dbv`)
//! - `DbxData` - design assembly (`.3dbx`)
//! - `BumpMapData` - bump locations (`.bmap`)
//!
//! Fields that a document may set to an explicit null are `Option`s. A
//! `None` there means "present but null" (or "-" in a bump map) and is never
//! replaced by placeholder text.

mod assembly;
mod bump;
mod chiplet;
mod header;

pub use assembly::{
    ChipletInst, ChipletInstExternal, ChipletLibrary, Connection, DbxData, DesignDef,
    DesignExternal, Orientation, RegionRef,
};
pub use bump::{BumpMapData, BumpMapEntry, ABSENT_TOKEN};
pub use chiplet::{
    ChipletDef, ChipletExternal, ChipletRegion, ChipletType, DbvData, EdgeWidths, Side,
};
pub use header::{Coordinate, Header};
