//! Structured document loading.
//!
//! Macro-expanded text is parsed as YAML and converted into a closed `Node`
//! tree. Format parsers match on `Node` exhaustively instead of poking at
//! `serde_yaml::Value` directly, so every shape the loader can produce is
//! handled in one place.

use std::fmt;
use std::path::Path;

use crate::error::{BloxError, Result};

use super::span::Location;

/// A scalar leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    /// Human-readable kind, used in type mismatch messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Scalar::Null => "null",
            Scalar::Bool(_) => "boolean",
            Scalar::Int(_) => "integer",
            Scalar::Float(_) => "number",
            Scalar::String(_) => "string",
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

/// An ordered mapping with unique string keys.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mapping {
    entries: Vec<(String, Node)>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert, replacing an existing entry with the same key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: Node) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }
}

/// A node of a loaded document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Mapping(Mapping),
    Sequence(Vec<Node>),
    Scalar(Scalar),
}

impl Node {
    pub fn null() -> Self {
        Node::Scalar(Scalar::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Scalar(Scalar::Null))
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Node::Mapping(m) => Some(m),
            Node::Sequence(_) | Node::Scalar(_) => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(s) => Some(s),
            Node::Mapping(_) | Node::Scalar(_) => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Node::Scalar(s) => Some(s),
            Node::Mapping(_) | Node::Sequence(_) => None,
        }
    }

    /// Human-readable kind, used in type mismatch messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Mapping(_) => "mapping",
            Node::Sequence(_) => "sequence",
            Node::Scalar(s) => s.kind(),
        }
    }

    /// Short description of the node for error messages.
    pub fn describe(&self) -> String {
        match self {
            Node::Mapping(m) => format!("mapping with {} entries", m.len()),
            Node::Sequence(s) => format!("sequence of {} elements", s.len()),
            Node::Scalar(Scalar::Null) => "null".to_string(),
            Node::Scalar(Scalar::String(s)) => format!("string '{s}'"),
            Node::Scalar(s) => format!("{} {}", s.kind(), s),
        }
    }
}

/// Parse structured text into a node tree.
///
/// An empty document loads as an empty mapping. `file` is used for error
/// reporting only.
pub fn load_document(text: &str, file: &Path) -> Result<Node> {
    let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| BloxError::Syntax {
        file: file.to_path_buf(),
        location: Location::from_yaml_error(&e),
        message: e.to_string(),
        help: None,
    })?;

    let node = convert(value, file)?;
    if node.is_null() {
        return Ok(Node::Mapping(Mapping::new()));
    }
    Ok(node)
}

/// Load a document whose root must be a mapping.
pub fn load_mapping(text: &str, file: &Path) -> Result<Mapping> {
    match load_document(text, file)? {
        Node::Mapping(m) => Ok(m),
        other => Err(BloxError::TypeMismatch {
            file: file.to_path_buf(),
            context: "document".to_string(),
            key: "<root>".to_string(),
            expected: "mapping".to_string(),
            found: other.describe(),
        }),
    }
}

fn convert(value: serde_yaml::Value, file: &Path) -> Result<Node> {
    use serde_yaml::Value;

    Ok(match value {
        Value::Null => Node::null(),
        Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
        Value::Number(n) => Node::Scalar(number_scalar(&n)),
        Value::String(s) => Node::Scalar(Scalar::String(s)),
        Value::Sequence(seq) => Node::Sequence(
            seq.into_iter()
                .map(|v| convert(v, file))
                .collect::<Result<Vec<_>>>()?,
        ),
        Value::Mapping(map) => {
            let mut mapping = Mapping::new();
            for (key, value) in map {
                let key = mapping_key(key, file)?;
                mapping.insert(key, convert(value, file)?);
            }
            Node::Mapping(mapping)
        }
        // Tags carry no meaning in these formats.
        Value::Tagged(tagged) => convert(tagged.value, file)?,
    })
}

fn number_scalar(n: &serde_yaml::Number) -> Scalar {
    match n.as_i64() {
        Some(i) => Scalar::Int(i),
        // Floats, and integers beyond the i64 range
        None => Scalar::Float(n.as_f64().unwrap_or(f64::NAN)),
    }
}

fn mapping_key(key: serde_yaml::Value, file: &Path) -> Result<String> {
    use serde_yaml::Value;

    match key {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(BloxError::Syntax {
            file: file.to_path_buf(),
            location: None,
            message: format!("unsupported mapping key: {other:?}"),
            help: Some("mapping keys must be plain scalars".to_string()),
        }),
    }
}
