//! Bump-map (`.bmap`) parser.
//!
//! One bump per line, six whitespace-separated columns:
//!
//! ```text
//! bumpInstName bumpCellType x y portName netName
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. `-` in the port or
//! net column means the bump has none.

use std::path::Path;
use std::sync::Arc;

use log::Level;

use crate::error::{BloxError, Result};
use crate::log_sink::LogSink;
use crate::types::{BumpMapData, BumpMapEntry, ABSENT_TOKEN};

use super::base::DocumentContext;
use super::paths;
use super::span::Location;

const COLUMNS: usize = 6;
const COLUMN_HELP: &str = "expected: bumpInstName bumpCellType x y portName netName";

/// Parser for bump-map files.
pub struct BmapParser {
    sink: Arc<dyn LogSink>,
}

impl BmapParser {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    /// Read and parse a `.bmap` file.
    pub fn parse_file(&self, path: &Path) -> Result<BumpMapData> {
        let ctx = DocumentContext::new(paths::absolute(path), self.sink.clone());
        let source = ctx.read_source()?;
        parse_lines(&ctx, &source)
    }

    /// Parse bump-map text; `path` is used for error reporting.
    pub fn parse_str(&self, source: &str, path: &Path) -> Result<BumpMapData> {
        let ctx = DocumentContext::new(paths::absolute(path), self.sink.clone());
        parse_lines(&ctx, source)
    }
}

fn parse_lines(ctx: &DocumentContext, source: &str) -> Result<BumpMapData> {
    let mut entries = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        entries.push(parse_entry(ctx, index + 1, raw)?);
    }

    let count = entries.len().to_string();
    ctx.log(Level::Info, "parsed bump map", &[("bumps", count.as_str())]);

    Ok(BumpMapData { entries })
}

fn parse_entry(ctx: &DocumentContext, line_number: usize, raw: &str) -> Result<BumpMapEntry> {
    let columns: Vec<&str> = raw.split_whitespace().collect();
    let [inst, cell, x, y, port, net] = columns.as_slice() else {
        return Err(ctx.fail(BloxError::Syntax {
            file: ctx.file().to_path_buf(),
            location: Some(Location::line_start(line_number)),
            message: format!(
                "expected {COLUMNS} columns, found {}: '{}'",
                columns.len(),
                raw.trim()
            ),
            help: Some(COLUMN_HELP.to_string()),
        }));
    };

    Ok(BumpMapEntry {
        bump_inst_name: inst.to_string(),
        bump_cell_type: cell.to_string(),
        x: coordinate(ctx, line_number, "x", x)?,
        y: coordinate(ctx, line_number, "y", y)?,
        port_name: optional_column(port),
        net_name: optional_column(net),
    })
}

fn coordinate(ctx: &DocumentContext, line_number: usize, key: &str, token: &str) -> Result<f64> {
    token.parse().map_err(|_| {
        ctx.fail(BloxError::TypeMismatch {
            file: ctx.file().to_path_buf(),
            context: format!("line {line_number}"),
            key: key.to_string(),
            expected: "number".to_string(),
            found: format!("'{token}'"),
        })
    })
}

fn optional_column(token: &str) -> Option<String> {
    (token != ABSENT_TOKEN).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::{MemorySink, NullSink};

    fn parse(source: &str) -> Result<BumpMapData> {
        BmapParser::new(Arc::new(NullSink)).parse_str(source, Path::new("/d/soc.bmap"))
    }

    #[test]
    fn test_unassigned_bump() {
        let data = parse("bump3 BUMP 200.0 200.0 - -\n").unwrap();

        assert_eq!(
            data.entries,
            vec![BumpMapEntry {
                bump_inst_name: "bump3".to_string(),
                bump_cell_type: "BUMP".to_string(),
                x: 200.0,
                y: 200.0,
                port_name: None,
                net_name: None,
            }]
        );
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let source = "# header\n\n   # indented comment\nb1 BUMP 0 0 VDD VDD\n\t\nb2 BUMP 10 -5.5 io0 net_a\n";

        let data = parse(source).unwrap();

        assert_eq!(data.entries.len(), 2);
        assert_eq!(data.entries[0].port_name.as_deref(), Some("VDD"));
        assert_eq!(data.entries[1].y, -5.5);
        assert_eq!(data.entries[1].net_name.as_deref(), Some("net_a"));
    }

    #[test]
    fn test_file_order_is_kept() {
        let data = parse("z BUMP 0 0 - -\na BUMP 0 0 - -\nm BUMP 0 0 - -\n").unwrap();
        let names: Vec<_> = data.entries.iter().map(|e| e.bump_inst_name.as_str()).collect();

        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_wrong_column_count() {
        let err = parse("b1 BUMP 0 0 - -\nb2 BUMP 1 1 -\n").unwrap_err();

        match err {
            BloxError::Syntax {
                location, message, ..
            } => {
                assert_eq!(location, Some(Location::line_start(2)));
                assert!(message.contains("b2 BUMP 1 1 -"));
                assert!(message.contains("found 5"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(parse("b1 BUMP 0 0 - - extra\n").is_err());
    }

    #[test]
    fn test_bad_coordinate() {
        let err = parse("b1 BUMP 1.0 abc - -\n").unwrap_err();

        assert!(matches!(err, BloxError::TypeMismatch { key, context, .. }
            if key == "y" && context == "line 1"));
    }

    #[test]
    fn test_dash_inside_name_is_text() {
        let data = parse("b1 BUMP 0 0 -p n-\n").unwrap();

        assert_eq!(data.entries[0].port_name.as_deref(), Some("-p"));
        assert_eq!(data.entries[0].net_name.as_deref(), Some("n-"));
    }

    #[test]
    fn test_empty_map() {
        assert!(parse("").unwrap().entries.is_empty());
    }

    #[test]
    fn test_error_is_logged() {
        let sink = MemorySink::new();

        let _ = BmapParser::new(sink.clone()).parse_str("x\n", Path::new("/d/a.bmap"));

        assert_eq!(sink.at_level(Level::Error).len(), 1);
    }
}
