//! blox3d - 3DBlox file parser
//!
//! Parses the three 3DBlox formats used to describe 3D-stacked chiplet
//! designs into typed data models:
//! - `.3dbv` chiplet definitions
//! - `.3dbx` assemblies (instances, stack placement, connections)
//! - `.bmap` bump maps
//!
//! Explicit nulls in the source stay `None` in the models; they are never
//! turned into text.

pub mod cli;
pub mod config;
pub mod error;
pub mod log_sink;
pub mod output;
pub mod parser;
pub mod types;

pub use config::{Config, OutputFormat, ParseOptions};
pub use error::{BloxError, Result};
pub use log_sink::{LogCrateSink, LogEntry, LogSink, MemorySink, NullSink};
pub use parser::{
    parse, parse_assembly, parse_bump_map, parse_chiplet_definitions, BloxParser, BmapParser,
    DbvParser, DbxParser, Format, Parsed,
};
pub use types::{
    BumpMapData, BumpMapEntry, ChipletDef, ChipletExternal, ChipletInst, ChipletInstExternal,
    ChipletLibrary, ChipletRegion, ChipletType, Connection, Coordinate, DbvData, DbxData,
    DesignDef, DesignExternal, EdgeWidths, Header, Orientation, RegionRef, Side,
};
