//! `#!define` macro expansion.
//!
//! A line of the form `#!define NAME VALUE` binds `NAME` for every line that
//! follows it and is dropped from the output. Substitution is plain text
//! replacement in a single left-to-right pass: the replacement text is never
//! scanned again, and where several names match at one position the longest
//! wins. Redefining a name rebinds it for the lines after the redefinition.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{BloxError, Result};

use super::span::Location;

/// The directive prefix.
pub const DEFINE_DIRECTIVE: &str = "#!define";

/// Macro bindings for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroTable {
    bindings: BTreeMap<String, String>,
}

/// Result of preprocessing a document.
#[derive(Debug, Clone)]
pub struct Expanded {
    /// Text with directives removed and macros substituted.
    pub text: String,
    /// Bindings in effect at the end of the document.
    pub macros: MacroTable,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing bindings (explicit threading between documents).
    pub fn seeded(bindings: &BTreeMap<String, String>) -> Self {
        Self {
            bindings: bindings.clone(),
        }
    }

    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.bindings.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(|s| s.as_str())
    }

    pub fn bindings(&self) -> &BTreeMap<String, String> {
        &self.bindings
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Substitute every bound name in `line`.
    pub fn substitute(&self, line: &str) -> String {
        if self.bindings.is_empty() {
            return line.to_string();
        }

        let mut out = String::with_capacity(line.len());
        let mut rest = line;

        while let Some(c) = rest.chars().next() {
            let hit = self
                .bindings
                .iter()
                .filter(|(name, _)| rest.starts_with(name.as_str()))
                .max_by_key(|(name, _)| name.len());

            match hit {
                Some((name, value)) => {
                    out.push_str(value);
                    rest = &rest[name.len()..];
                }
                None => {
                    out.push(c);
                    rest = &rest[c.len_utf8()..];
                }
            }
        }

        out
    }

    /// Expand a whole document, consuming the table.
    ///
    /// `file` is only used for error reporting.
    pub fn expand(mut self, source: &str, file: &Path) -> Result<Expanded> {
        let mut lines = Vec::new();

        for (index, line) in source.lines().enumerate() {
            let trimmed = line.trim_start();
            if let Some(rest) = directive_body(trimmed) {
                let (name, value) = parse_define(rest).ok_or_else(|| BloxError::Syntax {
                    file: file.to_path_buf(),
                    location: Some(Location::line_start(index + 1)),
                    message: format!("malformed define directive: '{}'", line.trim()),
                    help: Some("use #!define NAME VALUE".to_string()),
                })?;
                self.define(name, value);
                continue;
            }

            lines.push(self.substitute(line));
        }

        let mut text = lines.join("\n");
        if source.ends_with('\n') {
            text.push('\n');
        }

        Ok(Expanded { text, macros: self })
    }
}

/// Expand `source` with no predefined bindings.
pub fn expand_macros(source: &str, file: &Path) -> Result<Expanded> {
    MacroTable::new().expand(source, file)
}

/// The text after `#!define`, if the line is a define directive.
fn directive_body(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(DEFINE_DIRECTIVE)?;
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest),
        // `#!defineX` is an ordinary comment line.
        Some(_) => None,
    }
}

fn parse_define(body: &str) -> Option<(&str, &str)> {
    let body = body.trim();
    let (name, value) = body.split_once(char::is_whitespace)?;
    let value = value.trim();
    if name.is_empty() || value.is_empty() {
        return None;
    }
    Some((name, value))
}
