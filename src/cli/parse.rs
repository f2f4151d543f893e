//! Parse command implementation.
//!
//! Parses one file and prints its data model as JSON, YAML or indented
//! text. Null fields stay null in the output.

use std::fmt::Write;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use serde_json::Value;

use crate::config::{Config, OutputFormat};
use crate::error::{BloxError, Result};
use crate::output::{display_path, Printer};
use crate::parser::Parsed;

/// Parse a file and print its data model
#[derive(Args, Debug)]
pub struct ParseArgs {
    /// File to parse (.3dbv, .3dbx or .bmap)
    pub file: PathBuf,

    /// Output format (default from config, else json)
    #[arg(long, short, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write to a file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Predefine a macro, as `#!define NAME VALUE`
    #[arg(short = 'D', long = "define", value_name = "NAME=VALUE")]
    pub defines: Vec<String>,
}

pub fn run(args: ParseArgs, config: Config, printer: &Printer) -> Result<()> {
    let format = args.format.unwrap_or(config.format);
    let config = config.with_defines(&args.defines)?;

    let parsed = super::parser_for(&config).parse(&args.file)?;
    let text = render(&parsed, format)?;

    match &args.output {
        Some(path) => {
            fs::write(path, &text).map_err(|e| BloxError::Io {
                path: path.clone(),
                message: format!("Failed to write output: {}", e),
            })?;
            printer.success(
                "Wrote",
                &format!("{} ({})", display_path(path), parsed.format()),
            );
        }
        None => print!("{}", text),
    }

    Ok(())
}

/// Serialize a data model. JSON output ends with a newline.
pub fn render(parsed: &Parsed, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(parsed)
            .map(|mut text| {
                text.push('\n');
                text
            })
            .map_err(|e| BloxError::Serialize {
                message: e.to_string(),
            }),
        OutputFormat::Yaml => serde_yaml::to_string(parsed).map_err(|e| BloxError::Serialize {
            message: e.to_string(),
        }),
        OutputFormat::Pretty => {
            let value = serde_json::to_value(parsed).map_err(|e| BloxError::Serialize {
                message: e.to_string(),
            })?;
            let mut text = String::new();
            pretty(&value, 0, &mut text);
            Ok(text)
        }
    }
}

/// Nested mappings and lists of mappings become indented blocks; everything
/// else stays on its key's line.
fn pretty(value: &Value, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    let Value::Object(map) = value else {
        let _ = writeln!(out, "{pad}{}", inline(value));
        return;
    };

    for (key, value) in map {
        match value {
            Value::Object(_) => {
                let _ = writeln!(out, "{pad}{key}:");
                pretty(value, indent + 1, out);
            }
            Value::Array(items) if items.first().is_some_and(Value::is_object) => {
                let _ = writeln!(out, "{pad}{key}:");
                for item in items {
                    pretty(item, indent + 1, out);
                    out.push('\n');
                }
            }
            other => {
                let _ = writeln!(out, "{pad}{key}: {}", inline(other));
            }
        }
    }
}

fn inline(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(inline).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let fields: Vec<String> = map
                .iter()
                .map(|(key, value)| format!("{key}: {}", inline(value)))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
        other => other.to_string(),
    }
}
