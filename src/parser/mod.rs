//! Parsers for 3DBlox files.
//!
//! Three formats are supported:
//! - `.3dbv` chiplet definitions ([`DbvParser`])
//! - `.3dbx` assemblies, which include chiplet definitions ([`DbxParser`])
//! - `.bmap` bump maps ([`BmapParser`])
//!
//! The two structured formats go through the same pipeline: `#!define`
//! expansion, YAML loading into a [`document::Node`] tree, then a walk of
//! that tree with the helpers in [`base`]. Bump maps are line based.
//!
//! # Usage
//!
//! ```ignore
//! use blox3d::parser::{parse, Parsed};
//!
//! match parse(Path::new("designs/top.3dbx"))? {
//!     Parsed::Assembly(dbx) => println!("{} instances", dbx.chiplet_instances.len()),
//!     other => println!("{}", other.format()),
//! }
//! ```

pub mod base;
pub mod bmap;
pub mod dbv;
pub mod dbx;
pub mod document;
pub mod macros;
pub mod paths;
pub mod span;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::config::ParseOptions;
use crate::error::{BloxError, Result};
use crate::log_sink::{default_sink, LogSink};
use crate::types::{BumpMapData, DbvData, DbxData};

pub use bmap::BmapParser;
pub use dbv::DbvParser;
pub use dbx::DbxParser;
pub use macros::{expand_macros, Expanded, MacroTable};
pub use span::Location;

/// File formats, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// `.3dbv`
    ChipletDefinitions,
    /// `.3dbx`
    Assembly,
    /// `.bmap`
    BumpMap,
}

impl Format {
    /// Detect the format from a path's extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "3dbv" => Some(Format::ChipletDefinitions),
            "3dbx" => Some(Format::Assembly),
            "bmap" => Some(Format::BumpMap),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::ChipletDefinitions => "3dbv",
            Format::Assembly => "3dbx",
            Format::BumpMap => "bmap",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Format::ChipletDefinitions => "chiplet definitions",
            Format::Assembly => "assembly",
            Format::BumpMap => "bump map",
        };
        f.write_str(name)
    }
}

/// Result of [`parse`]: one of the three document models.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Parsed {
    ChipletDefinitions(DbvData),
    Assembly(DbxData),
    BumpMap(BumpMapData),
}

impl Parsed {
    pub fn format(&self) -> Format {
        match self {
            Parsed::ChipletDefinitions(_) => Format::ChipletDefinitions,
            Parsed::Assembly(_) => Format::Assembly,
            Parsed::BumpMap(_) => Format::BumpMap,
        }
    }
}

/// Entry point holding the log sink and options shared by one or more
/// parse calls. Holds no state between calls.
#[derive(Clone)]
pub struct BloxParser {
    sink: Arc<dyn LogSink>,
    options: ParseOptions,
}

impl Default for BloxParser {
    fn default() -> Self {
        Self::new()
    }
}

impl BloxParser {
    /// Parser logging to the `log` facade with default options.
    pub fn new() -> Self {
        Self {
            sink: default_sink(),
            options: ParseOptions::default(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse a file, choosing the parser by extension.
    pub fn parse(&self, path: &Path) -> Result<Parsed> {
        match Format::from_path(path) {
            Some(Format::ChipletDefinitions) => self
                .parse_chiplet_definitions(path)
                .map(Parsed::ChipletDefinitions),
            Some(Format::Assembly) => self.parse_assembly(path).map(Parsed::Assembly),
            Some(Format::BumpMap) => self.parse_bump_map(path).map(Parsed::BumpMap),
            None => {
                let error = BloxError::UnknownFormat {
                    path: path.to_path_buf(),
                };
                self.sink.log(log::Level::Error, &error.to_string(), &[]);
                Err(error)
            }
        }
    }

    pub fn parse_chiplet_definitions(&self, path: &Path) -> Result<DbvData> {
        DbvParser::new(self.sink.clone())
            .with_defines(self.options.defines.clone())
            .parse_file(path)
    }

    pub fn parse_assembly(&self, path: &Path) -> Result<DbxData> {
        DbxParser::new(self.sink.clone())
            .with_options(self.options.clone())
            .parse_file(path)
    }

    pub fn parse_bump_map(&self, path: &Path) -> Result<BumpMapData> {
        BmapParser::new(self.sink.clone()).parse_file(path)
    }
}

/// Parse any supported file with default options.
pub fn parse(path: &Path) -> Result<Parsed> {
    BloxParser::new().parse(path)
}

/// Parse a `.3dbv` file with default options.
pub fn parse_chiplet_definitions(path: &Path) -> Result<DbvData> {
    BloxParser::new().parse_chiplet_definitions(path)
}

/// Parse a `.3dbx` file and its includes with default options.
pub fn parse_assembly(path: &Path) -> Result<DbxData> {
    BloxParser::new().parse_assembly(path)
}

/// Parse a `.bmap` file.
pub fn parse_bump_map(path: &Path) -> Result<BumpMapData> {
    BloxParser::new().parse_bump_map(path)
}
