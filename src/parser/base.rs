//! Helpers shared by the structured-format parsers.
//!
//! `DocumentContext` knows which document is being walked and where to log.
//! Every error it produces is logged at `error` level and tagged with the
//! document path before being handed back.
//!
//! Field extraction distinguishes three cases:
//! - key absent: `MissingField` (for required fields)
//! - key present with null: `Ok(None)`, never converted to text
//! - key present with a value: converted, or `TypeMismatch`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::Level;

use crate::error::{BloxError, Result};
use crate::log_sink::LogSink;
use crate::types::{Coordinate, Header};

use super::document::{self, Mapping, Node, Scalar};
use super::macros::{Expanded, MacroTable};
use super::paths;

/// Conversion from a non-null node to a typed value.
pub trait FromNode: Sized {
    /// What the conversion expects, for error messages.
    const EXPECTED: &'static str;

    fn from_node(node: &Node) -> Option<Self>;
}

impl FromNode for String {
    const EXPECTED: &'static str = "string";

    fn from_node(node: &Node) -> Option<Self> {
        match node.as_scalar()? {
            Scalar::String(s) => Some(s.clone()),
            Scalar::Int(i) => Some(i.to_string()),
            Scalar::Float(x) => Some(float_text(*x)),
            Scalar::Bool(b) => Some(b.to_string()),
            Scalar::Null => None,
        }
    }
}

impl FromNode for f64 {
    const EXPECTED: &'static str = "number";

    fn from_node(node: &Node) -> Option<Self> {
        match node.as_scalar()? {
            Scalar::Int(i) => Some(*i as f64),
            Scalar::Float(x) => Some(*x),
            Scalar::String(s) => s.trim().parse().ok(),
            Scalar::Bool(_) | Scalar::Null => None,
        }
    }
}

impl FromNode for i64 {
    const EXPECTED: &'static str = "integer";

    fn from_node(node: &Node) -> Option<Self> {
        match node.as_scalar()? {
            Scalar::Int(i) => Some(*i),
            Scalar::Float(x) if x.fract() == 0.0 && x.is_finite() => Some(*x as i64),
            Scalar::String(s) => s.trim().parse().ok(),
            Scalar::Float(_) | Scalar::Bool(_) | Scalar::Null => None,
        }
    }
}

impl FromNode for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_node(node: &Node) -> Option<Self> {
        match node.as_scalar()? {
            Scalar::Bool(b) => Some(*b),
            Scalar::Int(0) => Some(false),
            Scalar::Int(1) => Some(true),
            Scalar::String(s) => match s.trim().to_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            Scalar::Int(_) | Scalar::Float(_) | Scalar::Null => None,
        }
    }
}

/// Render a float the way it reads in the source (`2.0` stays "2.0").
fn float_text(x: f64) -> String {
    if x.fract() == 0.0 && x.is_finite() {
        format!("{x:.1}")
    } else {
        x.to_string()
    }
}

/// The value at `key` unless it is absent or null.
pub fn present<'a>(map: &'a Mapping, key: &str) -> Option<&'a Node> {
    map.get(key).filter(|node| !node.is_null())
}

/// Join a context path and a key: `ChipletDef.SoC` + `regions`.
pub fn child(context: &str, key: &str) -> String {
    if context.is_empty() {
        key.to_string()
    } else {
        format!("{context}.{key}")
    }
}

/// Per-document parsing state: the document path and the log sink.
pub struct DocumentContext {
    file: PathBuf,
    base_dir: PathBuf,
    sink: Arc<dyn LogSink>,
}

impl DocumentContext {
    /// `file` should already be absolute; its parent is the base for
    /// relative references.
    pub fn new(file: impl Into<PathBuf>, sink: Arc<dyn LogSink>) -> Self {
        let file = file.into();
        let base_dir = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            file,
            base_dir,
            sink,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }

    /// Log through the sink with the document path attached.
    pub fn log(&self, level: Level, message: &str, fields: &[(&str, &str)]) {
        let file = self.file.display().to_string();
        let mut all: Vec<(&str, &str)> = vec![("file", file.as_str())];
        all.extend_from_slice(fields);
        self.sink.log(level, message, &all);
    }

    /// Log a fatal error and hand it back for returning.
    pub fn fail(&self, error: BloxError) -> BloxError {
        self.log(Level::Error, &error.to_string(), &[]);
        error
    }

    /// Read the whole document. The file is closed before returning.
    pub fn read_source(&self) -> Result<String> {
        self.log(Level::Debug, "loading document", &[]);
        std::fs::read_to_string(&self.file).map_err(|e| {
            self.fail(BloxError::Io {
                path: self.file.clone(),
                message: e.to_string(),
            })
        })
    }

    /// Run the macro preprocessor over `source`, starting from `macros`.
    pub fn expand(&self, source: &str, macros: MacroTable) -> Result<Expanded> {
        let expanded = macros.expand(source, &self.file).map_err(|e| self.fail(e))?;
        for (name, value) in expanded.macros.bindings() {
            self.log(
                Level::Debug,
                "macro defined",
                &[("name", name.as_str()), ("value", value.as_str())],
            );
        }
        Ok(expanded)
    }

    /// Load expanded text as a document whose root is a mapping.
    pub fn load(&self, text: &str) -> Result<Mapping> {
        document::load_mapping(text, &self.file).map_err(|e| self.fail(e))
    }

    pub fn missing(&self, context: &str, key: &str) -> BloxError {
        self.fail(BloxError::MissingField {
            file: self.file.clone(),
            context: context.to_string(),
            key: key.to_string(),
        })
    }

    pub fn mismatch(&self, context: &str, key: &str, expected: &str, found: &Node) -> BloxError {
        self.fail(BloxError::TypeMismatch {
            file: self.file.clone(),
            context: context.to_string(),
            key: key.to_string(),
            expected: expected.to_string(),
            found: found.describe(),
        })
    }

    pub fn unrecognized(
        &self,
        context: &str,
        kind: &str,
        value: &str,
        expected: &[&str],
    ) -> BloxError {
        self.fail(BloxError::UnrecognizedEnumValue {
            file: self.file.clone(),
            context: context.to_string(),
            kind: kind.to_string(),
            value: value.to_string(),
            expected: expected.join(", "),
        })
    }

    /// Convert a present, non-null node.
    pub fn convert<T: FromNode>(&self, node: &Node, context: &str, key: &str) -> Result<T> {
        T::from_node(node).ok_or_else(|| self.mismatch(context, key, T::EXPECTED, node))
    }

    /// Required key, null allowed: `None` means the value was an explicit null.
    pub fn extract_value<T: FromNode>(
        &self,
        map: &Mapping,
        key: &str,
        context: &str,
    ) -> Result<Option<T>> {
        let node = map.get(key).ok_or_else(|| self.missing(context, key))?;
        if node.is_null() {
            return Ok(None);
        }
        self.convert(node, context, key).map(Some)
    }

    /// Required key with a non-null value.
    pub fn require_value<T: FromNode>(&self, map: &Mapping, key: &str, context: &str) -> Result<T> {
        let node = map.get(key).ok_or_else(|| self.missing(context, key))?;
        if node.is_null() {
            return Err(self.mismatch(context, key, T::EXPECTED, node));
        }
        self.convert(node, context, key)
    }

    /// Optional key: absent and null both give `None`.
    pub fn optional_value<T: FromNode>(
        &self,
        map: &Mapping,
        key: &str,
        context: &str,
    ) -> Result<Option<T>> {
        match map.get(key) {
            None => Ok(None),
            Some(node) if node.is_null() => Ok(None),
            Some(node) => self.convert(node, context, key).map(Some),
        }
    }

    /// A nested mapping section. Absent and null sections give `None`.
    pub fn section<'a>(
        &self,
        map: &'a Mapping,
        key: &str,
        context: &str,
    ) -> Result<Option<&'a Mapping>> {
        match map.get(key) {
            None => Ok(None),
            Some(Node::Mapping(m)) => Ok(Some(m)),
            Some(node) if node.is_null() => Ok(None),
            Some(node) => Err(self.mismatch(context, key, "mapping", node)),
        }
    }

    /// A nested mapping section that must be present.
    pub fn require_section<'a>(
        &self,
        map: &'a Mapping,
        key: &str,
        context: &str,
    ) -> Result<&'a Mapping> {
        match map.get(key) {
            None => Err(self.missing(context, key)),
            Some(Node::Mapping(m)) => Ok(m),
            Some(node) => Err(self.mismatch(context, key, "mapping", node)),
        }
    }

    /// The mapping body of a named entry (`ChipletDef.<name>` etc.).
    pub fn entry<'a>(&self, node: &'a Node, context: &str, name: &str) -> Result<&'a Mapping> {
        match node {
            Node::Mapping(m) => Ok(m),
            other => Err(self.mismatch(context, name, "mapping", other)),
        }
    }

    /// Exactly `N` numbers from a sequence node.
    pub fn parse_numbers<const N: usize>(
        &self,
        node: &Node,
        context: &str,
        key: &str,
    ) -> Result<[f64; N]> {
        let expected = format!("sequence of {N} numbers");
        let items = match node {
            Node::Sequence(items) if items.len() == N => items,
            other => return Err(self.mismatch(context, key, &expected, other)),
        };

        let mut out = [0.0; N];
        for (slot, item) in out.iter_mut().zip(items) {
            *slot = f64::from_node(item)
                .ok_or_else(|| self.mismatch(context, key, &expected, item))?;
        }
        Ok(out)
    }

    /// `[x, y]`.
    pub fn parse_coordinate(&self, node: &Node, context: &str, key: &str) -> Result<Coordinate> {
        let [x, y] = self.parse_numbers::<2>(node, context, key)?;
        Ok(Coordinate::new(x, y))
    }

    /// `[[x, y], ...]` in order. An empty sequence is fine.
    pub fn parse_coordinates(
        &self,
        node: &Node,
        context: &str,
        key: &str,
    ) -> Result<Vec<Coordinate>> {
        match node {
            Node::Sequence(items) => items
                .iter()
                .map(|item| self.parse_coordinate(item, context, key))
                .collect(),
            other => Err(self.mismatch(context, key, "sequence of coordinates", other)),
        }
    }

    /// A scalar or a sequence of scalars, as strings. Null entries are
    /// skipped; a null value gives an empty list.
    pub fn string_list(&self, node: &Node, context: &str, key: &str) -> Result<Vec<String>> {
        match node {
            Node::Scalar(Scalar::Null) => Ok(Vec::new()),
            Node::Scalar(_) => Ok(vec![self.convert(node, context, key)?]),
            Node::Sequence(items) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(|item| self.convert(item, context, key))
                .collect(),
            Node::Mapping(_) => {
                Err(self.mismatch(context, key, "string or sequence of strings", node))
            }
        }
    }

    /// Resolve one reference relative to this document (wildcards expand).
    pub fn resolve_path(&self, pattern: &str) -> Result<Vec<PathBuf>> {
        paths::resolve_path(&self.base_dir, pattern, &self.file).map_err(|e| self.fail(e))
    }

    /// Resolve references in order, flattening wildcard matches.
    pub fn resolve_paths<S: AsRef<str>>(&self, patterns: &[S]) -> Result<Vec<PathBuf>> {
        let resolved = paths::resolve_paths(&self.base_dir, patterns, &self.file)
            .map_err(|e| self.fail(e))?;
        self.log(
            Level::Debug,
            "resolved references",
            &[("count", resolved.len().to_string().as_str())],
        );
        Ok(resolved)
    }

    /// Resolve a reference that must name a single file. A wildcard is
    /// accepted when it matches exactly one file.
    pub fn resolve_single(&self, pattern: &str) -> Result<PathBuf> {
        let mut resolved = self.resolve_path(pattern)?;
        if resolved.len() == 1 {
            return Ok(resolved.remove(0));
        }
        Err(self.fail(BloxError::UnresolvedPath {
            file: self.file.clone(),
            path: paths::absolutize(&self.base_dir, pattern),
            message: format!("expected exactly one match, found {}", resolved.len()),
        }))
    }

    /// Optional single-file reference: absent and null give `None`.
    pub fn optional_file(
        &self,
        map: &Mapping,
        key: &str,
        context: &str,
    ) -> Result<Option<PathBuf>> {
        match self.optional_value::<String>(map, key, context)? {
            Some(pattern) => self.resolve_single(&pattern).map(Some),
            None => Ok(None),
        }
    }

    /// Optional list of file references: absent and null give an empty list.
    pub fn optional_files(&self, map: &Mapping, key: &str, context: &str) -> Result<Vec<PathBuf>> {
        match map.get(key) {
            Some(node) => {
                let patterns = self.string_list(node, context, key)?;
                self.resolve_paths(&patterns)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Parse a `Header` section.
    pub fn parse_header(&self, map: &Mapping) -> Result<Header> {
        const CONTEXT: &str = "Header";

        let version = self.require_value::<String>(map, "version", CONTEXT)?;
        let unit = self.require_value::<String>(map, "unit", CONTEXT)?;
        let precision = self.require_value::<i64>(map, "precision", CONTEXT)?;
        let includes = self.optional_files(map, "include", CONTEXT)?;

        Ok(Header {
            version,
            unit,
            precision,
            includes,
        })
    }

    /// Warn about keys a parser does not understand. They are dropped.
    pub fn ignore_unknown(&self, map: &Mapping, known: &[&str], context: &str) {
        for key in map.keys().filter(|k| !known.contains(k)) {
            let path = child(context, key);
            self.log(
                Level::Warn,
                "ignoring unsupported field",
                &[("field", path.as_str())],
            );
        }
    }
}
