use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::parser::span::Location;

/// Main error type for blox3d operations.
///
/// Every variant is fatal to the document being parsed.
#[derive(Error, Diagnostic, Debug)]
pub enum BloxError {
    #[error("IO error with {path}: {message}")]
    #[diagnostic(code(blox3d::io))]
    Io { path: PathBuf, message: String },

    #[error("{}{}: syntax error: {message}", file.display(), at_location(location))]
    #[diagnostic(code(blox3d::syntax))]
    Syntax {
        file: PathBuf,
        location: Option<Location>,
        message: String,
        #[help]
        help: Option<String>,
    },

    #[error("{}: missing required field '{key}' in {context}", file.display())]
    #[diagnostic(code(blox3d::missing_field))]
    MissingField {
        file: PathBuf,
        context: String,
        key: String,
    },

    #[error("{}: field '{key}' in {context} expected {expected}, found {found}", file.display())]
    #[diagnostic(code(blox3d::type_mismatch))]
    TypeMismatch {
        file: PathBuf,
        context: String,
        key: String,
        expected: String,
        found: String,
    },

    #[error("{}: cannot resolve {}: {message}", file.display(), path.display())]
    #[diagnostic(code(blox3d::unresolved_path))]
    UnresolvedPath {
        file: PathBuf,
        path: PathBuf,
        message: String,
    },

    #[error("{}: unrecognized {kind} '{value}' in {context}", file.display())]
    #[diagnostic(code(blox3d::unrecognized_value), help("expected one of: {expected}"))]
    UnrecognizedEnumValue {
        file: PathBuf,
        context: String,
        kind: String,
        value: String,
        expected: String,
    },

    #[error("{}: {context} refers to undeclared '{name}'", file.display())]
    #[diagnostic(code(blox3d::undeclared_reference))]
    UndeclaredReference {
        file: PathBuf,
        context: String,
        name: String,
    },

    #[error("{}: failed to load included document {}", file.display(), include.display())]
    #[diagnostic(code(blox3d::include))]
    Include {
        file: PathBuf,
        include: PathBuf,
        #[source]
        source: Box<BloxError>,
    },

    #[error("Failed to serialize output: {message}")]
    #[diagnostic(code(blox3d::serialize))]
    Serialize { message: String },

    #[error("Unknown file format: {}", path.display())]
    #[diagnostic(
        code(blox3d::unknown_format),
        help("expected a .3dbv, .3dbx or .bmap file")
    )]
    UnknownFormat { path: PathBuf },
}

impl BloxError {
    /// Follow `Include` wrappers down to the error that started the failure.
    pub fn innermost(&self) -> &BloxError {
        match self {
            BloxError::Include { source, .. } => source.innermost(),
            other => other,
        }
    }
}

fn at_location(location: &Option<Location>) -> String {
    match location {
        Some(loc) => format!(":{}", loc),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, BloxError>;
