//! Design assembly types (`.3dbx`).

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{BloxError, Result};

use super::chiplet::ChipletDef;
use super::header::{Coordinate, Header};

/// Placement transform of a stacked instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Orientation {
    #[default]
    R0,
    R90,
    R180,
    R270,
    #[serde(rename = "MY")]
    My,
    #[serde(rename = "MY_R90")]
    MyR90,
    #[serde(rename = "MX")]
    Mx,
    #[serde(rename = "MX_R90")]
    MxR90,
    #[serde(rename = "MZ")]
    Mz,
    #[serde(rename = "MZ_R90")]
    MzR90,
    #[serde(rename = "MZ_R180")]
    MzR180,
    #[serde(rename = "MZ_R270")]
    MzR270,
    #[serde(rename = "MZ_MY")]
    MzMy,
    #[serde(rename = "MZ_MY_R90")]
    MzMyR90,
    #[serde(rename = "MZ_MX")]
    MzMx,
    #[serde(rename = "MZ_MX_R90")]
    MzMxR90,
}

impl Orientation {
    pub const ALL: [Orientation; 16] = [
        Orientation::R0,
        Orientation::R90,
        Orientation::R180,
        Orientation::R270,
        Orientation::My,
        Orientation::MyR90,
        Orientation::Mx,
        Orientation::MxR90,
        Orientation::Mz,
        Orientation::MzR90,
        Orientation::MzR180,
        Orientation::MzR270,
        Orientation::MzMy,
        Orientation::MzMyR90,
        Orientation::MzMx,
        Orientation::MzMxR90,
    ];

    /// Parse an orientation token. Tokens are upper case in the format;
    /// lower case input is accepted.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_uppercase();
        Self::ALL.into_iter().find(|o| o.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::R0 => "R0",
            Orientation::R90 => "R90",
            Orientation::R180 => "R180",
            Orientation::R270 => "R270",
            Orientation::My => "MY",
            Orientation::MyR90 => "MY_R90",
            Orientation::Mx => "MX",
            Orientation::MxR90 => "MX_R90",
            Orientation::Mz => "MZ",
            Orientation::MzR90 => "MZ_R90",
            Orientation::MzR180 => "MZ_R180",
            Orientation::MzR270 => "MZ_R270",
            Orientation::MzMy => "MZ_MY",
            Orientation::MzMyR90 => "MZ_MY_R90",
            Orientation::MzMx => "MZ_MX",
            Orientation::MzMxR90 => "MZ_MX_R90",
        }
    }

    /// Whether the instance is flipped upside down in the stack.
    pub fn is_flipped(&self) -> bool {
        self.as_str().starts_with("MZ")
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Files attached to the whole design.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DesignExternal {
    pub verilog_file: Option<PathBuf>,
}

/// The `Design` section. `name` is required but may be null.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct DesignDef {
    pub name: Option<String>,
    pub external: DesignExternal,
}

/// Files attached to one instance.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChipletInstExternal {
    pub verilog_file: Option<PathBuf>,
    pub sdc_file: Option<PathBuf>,
    pub def_file: Option<PathBuf>,
}

/// A placed chiplet.
///
/// `reference` is stored as written; it is only looked up against the
/// chiplet library when a consumer asks for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChipletInst {
    pub name: String,
    pub reference: Option<String>,
    pub external: ChipletInstExternal,
    pub loc: Coordinate,
    pub z: f64,
    pub orient: Orientation,
}

impl ChipletInst {
    pub fn new(name: impl Into<String>, reference: Option<String>) -> Self {
        Self {
            name: name.into(),
            reference,
            external: ChipletInstExternal::default(),
            loc: Coordinate::origin(),
            z: 0.0,
            orient: Orientation::R0,
        }
    }
}

/// A `<instance>.regions.<region>` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionRef {
    pub instance: String,
    pub region: String,
}

impl RegionRef {
    /// Split an endpoint string. Returns `None` when it is not of the
    /// `<instance>.regions.<region>` form.
    pub fn parse(s: &str) -> Option<Self> {
        let (instance, rest) = s.split_once(".regions.")?;
        if instance.is_empty() || rest.is_empty() {
            return None;
        }
        Some(Self {
            instance: instance.to_string(),
            region: rest.to_string(),
        })
    }
}

impl fmt::Display for RegionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.regions.{}", self.instance, self.region)
    }
}

/// A link between two regions. A null side has no physical region.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Connection {
    pub name: String,
    pub top: Option<String>,
    pub bot: Option<String>,
    pub thickness: f64,
}

impl Connection {
    /// True when at least one side is null; such connections are not drawn.
    pub fn is_virtual(&self) -> bool {
        self.top.is_none() || self.bot.is_none()
    }

    pub fn top_region(&self) -> Option<RegionRef> {
        self.top.as_deref().and_then(RegionRef::parse)
    }

    pub fn bot_region(&self) -> Option<RegionRef> {
        self.bot.as_deref().and_then(RegionRef::parse)
    }
}

/// Chiplet definitions merged from an assembly's includes.
///
/// Later includes replace earlier definitions of the same name.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct ChipletLibrary {
    defs: BTreeMap<String, ChipletDef>,
}

impl ChipletLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge definitions, replacing any existing entry with the same name.
    /// Returns the names that were replaced.
    pub fn merge(&mut self, defs: BTreeMap<String, ChipletDef>) -> Vec<String> {
        let mut replaced = Vec::new();
        for (name, def) in defs {
            if self.defs.insert(name.clone(), def).is_some() {
                replaced.push(name);
            }
        }
        replaced
    }

    pub fn get(&self, name: &str) -> Option<&ChipletDef> {
        self.defs.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

/// Parsed `.3dbx` document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbxData {
    /// The assembly document this was parsed from.
    pub file: PathBuf,
    pub header: Header,
    pub design: DesignDef,
    pub chiplet_instances: BTreeMap<String, ChipletInst>,
    pub connections: BTreeMap<String, Connection>,
    /// Definitions loaded from `Header.include`.
    pub library: ChipletLibrary,
}

impl DbxData {
    /// Look up the chiplet definition an instance refers to.
    ///
    /// Dangling and null references are reported here rather than while
    /// parsing.
    pub fn resolve(&self, instance_name: &str) -> Result<&ChipletDef> {
        let instance =
            self.chiplet_instances
                .get(instance_name)
                .ok_or_else(|| BloxError::UndeclaredReference {
                    file: self.file.clone(),
                    context: "ChipletInst".to_string(),
                    name: instance_name.to_string(),
                })?;

        let context = format!("ChipletInst.{}.reference", instance.name);
        let reference = instance
            .reference
            .as_deref()
            .ok_or_else(|| BloxError::UndeclaredReference {
                file: self.file.clone(),
                context: context.clone(),
                name: "null".to_string(),
            })?;

        self.library
            .get(reference)
            .ok_or_else(|| BloxError::UndeclaredReference {
                file: self.file.clone(),
                context,
                name: reference.to_string(),
            })
    }

    /// Connections with a physical region on both sides.
    pub fn physical_connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values().filter(|c| !c.is_virtual())
    }
}
