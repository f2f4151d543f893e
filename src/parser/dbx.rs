//! Assembly (`.3dbx`) parser.
//!
//! An assembly places chiplet instances in a stack and connects their
//! regions. `Header.include` names chiplet-definition documents; they are
//! loaded in include order before anything else and merged into the
//! assembly's chiplet library, later includes replacing earlier
//! definitions of the same name.
//!
//! Instance references are stored as written. Whether they name a
//! definition in the library is checked by `DbxData::resolve`, not here.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use log::Level;

use crate::config::ParseOptions;
use crate::error::{BloxError, Result};
use crate::log_sink::LogSink;
use crate::types::{
    ChipletInst, ChipletInstExternal, ChipletLibrary, Connection, DbxData, DesignDef,
    DesignExternal, Header, Orientation,
};

use super::base::{child, DocumentContext};
use super::dbv::DbvParser;
use super::document::Mapping;
use super::macros::MacroTable;
use super::paths;

const ROOT_KEYS: &[&str] = &["Header", "Design", "ChipletInst", "Stack", "Connection"];
const DESIGN_KEYS: &[&str] = &["name", "external"];
const DESIGN_EXTERNAL_KEYS: &[&str] = &["verilog_file"];
const INSTANCE_KEYS: &[&str] = &["reference", "external"];
const INSTANCE_EXTERNAL_KEYS: &[&str] = &["verilog_file", "sdc_file", "def_file"];
const STACK_KEYS: &[&str] = &["loc", "z", "orient"];
const CONNECTION_KEYS: &[&str] = &["top", "bot", "thickness"];

/// Parser for assembly documents.
pub struct DbxParser {
    sink: Arc<dyn LogSink>,
    options: ParseOptions,
}

impl DbxParser {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    /// Read and parse a `.3dbx` file and its includes.
    pub fn parse_file(&self, path: &Path) -> Result<DbxData> {
        let ctx = DocumentContext::new(paths::absolute(path), self.sink.clone());
        let source = ctx.read_source()?;
        self.parse_in(&ctx, &source)
    }

    /// Parse `.3dbx` text as if it had been read from `path`. Includes are
    /// still read from disk, relative to `path`.
    pub fn parse_str(&self, source: &str, path: &Path) -> Result<DbxData> {
        let ctx = DocumentContext::new(paths::absolute(path), self.sink.clone());
        self.parse_in(&ctx, source)
    }

    fn parse_in(&self, ctx: &DocumentContext, source: &str) -> Result<DbxData> {
        let expanded = ctx.expand(source, MacroTable::seeded(&self.options.defines))?;
        let root = ctx.load(&expanded.text)?;
        ctx.ignore_unknown(&root, ROOT_KEYS, "");

        let header = ctx.parse_header(ctx.require_section(&root, "Header", "document")?)?;
        let library = self.load_includes(ctx, &header, &expanded.macros)?;

        let design = parse_design(ctx, ctx.require_section(&root, "Design", "document")?)?;

        let mut chiplet_instances = BTreeMap::new();
        if let Some(instances) = ctx.section(&root, "ChipletInst", "document")? {
            for (name, node) in instances.iter() {
                let map = ctx.entry(node, "ChipletInst", name)?;
                chiplet_instances.insert(name.to_string(), parse_instance(ctx, name, map)?);
            }
        }

        if let Some(stack) = ctx.section(&root, "Stack", "document")? {
            apply_stack(ctx, stack, &mut chiplet_instances)?;
        }

        let mut connections = BTreeMap::new();
        if let Some(section) = ctx.section(&root, "Connection", "document")? {
            for (name, node) in section.iter() {
                let map = ctx.entry(node, "Connection", name)?;
                connections.insert(name.to_string(), parse_connection(ctx, name, map)?);
            }
        }

        let instances = chiplet_instances.len().to_string();
        let connection_count = connections.len().to_string();
        let chiplets = library.len().to_string();
        ctx.log(
            Level::Info,
            "parsed assembly",
            &[
                ("instances", instances.as_str()),
                ("connections", connection_count.as_str()),
                ("chiplets", chiplets.as_str()),
            ],
        );

        Ok(DbxData {
            file: ctx.file().to_path_buf(),
            header,
            design,
            chiplet_instances,
            connections,
            library,
        })
    }

    /// Load every include as a chiplet-definition document, in order.
    fn load_includes(
        &self,
        ctx: &DocumentContext,
        header: &Header,
        macros: &MacroTable,
    ) -> Result<ChipletLibrary> {
        let mut library = ChipletLibrary::new();

        if !self.options.follow_includes {
            if !header.includes.is_empty() {
                let count = header.includes.len().to_string();
                ctx.log(
                    Level::Debug,
                    "includes not followed",
                    &[("count", count.as_str())],
                );
            }
            return Ok(library);
        }

        let seed = if self.options.inherit_defines {
            macros.clone()
        } else {
            MacroTable::seeded(&self.options.defines)
        };
        let parser = DbvParser::new(ctx.sink().clone());

        for include in &header.includes {
            let shown = include.display().to_string();
            ctx.log(
                Level::Debug,
                "loading include",
                &[("include", shown.as_str())],
            );

            if !include.is_file() {
                return Err(ctx.fail(BloxError::UnresolvedPath {
                    file: ctx.file().to_path_buf(),
                    path: include.clone(),
                    message: "included document does not exist".to_string(),
                }));
            }

            let data = parser
                .parse_file_with(include, seed.clone())
                .map_err(|e| {
                    // The included document already logged the failure.
                    let err = BloxError::Include {
                        file: ctx.file().to_path_buf(),
                        include: include.clone(),
                        source: Box::new(e),
                    };
                    ctx.log(Level::Debug, &err.to_string(), &[]);
                    err
                })?;

            for name in library.merge(data.chiplet_defs) {
                ctx.log(
                    Level::Debug,
                    "chiplet definition replaced by later include",
                    &[("chiplet", name.as_str()), ("include", shown.as_str())],
                );
            }
        }

        Ok(library)
    }
}

fn parse_design(ctx: &DocumentContext, map: &Mapping) -> Result<DesignDef> {
    const CONTEXT: &str = "Design";
    ctx.ignore_unknown(map, DESIGN_KEYS, CONTEXT);

    let name = ctx.extract_value(map, "name", CONTEXT)?;

    let mut external = DesignExternal::default();
    if let Some(section) = ctx.section(map, "external", CONTEXT)? {
        let context = child(CONTEXT, "external");
        ctx.ignore_unknown(section, DESIGN_EXTERNAL_KEYS, &context);
        external.verilog_file = ctx.optional_file(section, "verilog_file", &context)?;
    }

    Ok(DesignDef { name, external })
}

fn parse_instance(ctx: &DocumentContext, name: &str, map: &Mapping) -> Result<ChipletInst> {
    let context = child("ChipletInst", name);
    ctx.ignore_unknown(map, INSTANCE_KEYS, &context);

    let mut instance = ChipletInst::new(name, ctx.extract_value(map, "reference", &context)?);

    if let Some(section) = ctx.section(map, "external", &context)? {
        let context = child(&context, "external");
        ctx.ignore_unknown(section, INSTANCE_EXTERNAL_KEYS, &context);
        instance.external = ChipletInstExternal {
            verilog_file: ctx.optional_file(section, "verilog_file", &context)?,
            sdc_file: ctx.optional_file(section, "sdc_file", &context)?,
            def_file: ctx.optional_file(section, "def_file", &context)?,
        };
    }

    Ok(instance)
}

/// Place declared instances. Every stack entry needs `loc`, `z` and `orient`.
fn apply_stack(
    ctx: &DocumentContext,
    stack: &Mapping,
    instances: &mut BTreeMap<String, ChipletInst>,
) -> Result<()> {
    for (name, node) in stack.iter() {
        let instance = instances.get_mut(name).ok_or_else(|| {
            ctx.fail(BloxError::UndeclaredReference {
                file: ctx.file().to_path_buf(),
                context: "Stack".to_string(),
                name: name.to_string(),
            })
        })?;

        let context = child("Stack", name);
        let map = ctx.entry(node, "Stack", name)?;
        ctx.ignore_unknown(map, STACK_KEYS, &context);

        let loc = map.get("loc").ok_or_else(|| ctx.missing(&context, "loc"))?;
        instance.loc = ctx.parse_coordinate(loc, &context, "loc")?;
        instance.z = ctx.require_value(map, "z", &context)?;

        let orient = ctx.require_value::<String>(map, "orient", &context)?;
        instance.orient = Orientation::parse(&orient).ok_or_else(|| {
            let expected: Vec<&str> = Orientation::ALL.iter().map(|o| o.as_str()).collect();
            ctx.unrecognized(&context, "orientation", &orient, &expected)
        })?;
    }
    Ok(())
}

fn parse_connection(ctx: &DocumentContext, name: &str, map: &Mapping) -> Result<Connection> {
    let context = child("Connection", name);
    ctx.ignore_unknown(map, CONNECTION_KEYS, &context);

    Ok(Connection {
        name: name.to_string(),
        top: ctx.extract_value(map, "top", &context)?,
        bot: ctx.extract_value(map, "bot", &context)?,
        thickness: ctx.require_value(map, "thickness", &context)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::{MemorySink, NullSink};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    const HEADER: &str = "Header:\n  version: 2.5\n  unit: micron\n  precision: 2000\n";

    const ASSEMBLY: &str = r#"
Header:
  version: 2.5
  unit: micron
  precision: 2000

Design:
  name: ~

ChipletInst:
  soc_inst:
    reference: SoC
  floating:
    reference: ~

Stack:
  soc_inst:
    loc: [100, 200.5]
    z: 0
    orient: MY_R90

Connection:
  soc_to_virtual:
    top: soc_inst.regions.r1
    bot: ~
    thickness: 0
  both_virtual:
    top: ~
    bot: null
    thickness: 1.5
"#;

    fn parse(source: &str) -> Result<DbxData> {
        DbxParser::new(Arc::new(NullSink)).parse_str(source, Path::new("/designs/top.3dbx"))
    }

    fn chiplet_doc(name: &str, width: u32) -> String {
        format!("{HEADER}ChipletDef:\n  {name}:\n    type: die\n    design_area: [{width}, 100]\n")
    }

    fn project(files: &[(&str, String)]) -> TempDir {
        let dir = tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        dir
    }

    #[test]
    fn test_parse_assembly() {
        let data = parse(ASSEMBLY).unwrap();

        assert_eq!(data.header.unit, "micron");
        assert_eq!(data.design.name, None);
        assert_eq!(data.chiplet_instances.len(), 2);

        let soc = &data.chiplet_instances["soc_inst"];
        assert_eq!(soc.reference.as_deref(), Some("SoC"));
        assert_eq!(soc.loc.x, 100.0);
        assert_eq!(soc.loc.y, 200.5);
        assert_eq!(soc.orient, Orientation::MyR90);

        // No stack entry: defaults.
        let floating = &data.chiplet_instances["floating"];
        assert_eq!(floating.reference, None);
        assert_eq!(floating.orient, Orientation::R0);
    }

    #[test]
    fn test_null_connections_are_kept() {
        let data = parse(ASSEMBLY).unwrap();

        let half = &data.connections["soc_to_virtual"];
        assert_eq!(half.top.as_deref(), Some("soc_inst.regions.r1"));
        assert_eq!(half.bot, None);
        assert!(half.is_virtual());

        let both = &data.connections["both_virtual"];
        assert_eq!(both.top, None);
        assert_eq!(both.bot, None);
        assert_eq!(both.thickness, 1.5);
        assert_eq!(data.physical_connections().count(), 0);
    }

    #[test]
    fn test_null_differs_from_none_text() {
        let source = format!(
            "{HEADER}Design:\n  name: none\nConnection:\n  c:\n    top: None\n    bot: ~\n    thickness: 1\n"
        );

        let data = parse(&source).unwrap();

        assert_eq!(data.design.name.as_deref(), Some("none"));
        assert_eq!(data.connections["c"].top.as_deref(), Some("None"));
        assert_eq!(data.connections["c"].bot, None);
    }

    #[test]
    fn test_connection_requires_keys() {
        let missing_bot = format!("{HEADER}Design: {{name: x}}\nConnection:\n  c:\n    top: ~\n    thickness: 1\n");
        let null_thickness = format!("{HEADER}Design: {{name: x}}\nConnection:\n  c:\n    top: ~\n    bot: ~\n    thickness: ~\n");

        assert!(matches!(
            parse(&missing_bot),
            Err(BloxError::MissingField { key, .. }) if key == "bot"
        ));
        assert!(matches!(
            parse(&null_thickness),
            Err(BloxError::TypeMismatch { key, .. }) if key == "thickness"
        ));
    }

    #[test]
    fn test_design_name_required() {
        let source = format!("{HEADER}Design:\n  external: {{}}\n");

        assert!(matches!(
            parse(&source),
            Err(BloxError::MissingField { context, key, .. })
                if context == "Design" && key == "name"
        ));
    }

    #[test]
    fn test_instance_reference_required() {
        let source = format!("{HEADER}Design: {{name: top}}\nChipletInst:\n  a: {{}}\n");

        assert!(matches!(
            parse(&source),
            Err(BloxError::MissingField { key, .. }) if key == "reference"
        ));
    }

    #[test]
    fn test_stack_undeclared_instance() {
        let source = format!(
            "{HEADER}Design: {{name: top}}\nChipletInst:\n  a: {{reference: A}}\nStack:\n  b: {{loc: [0, 0], z: 0, orient: R0}}\n"
        );

        let err = parse(&source).unwrap_err();

        assert!(matches!(err, BloxError::UndeclaredReference { context, name, .. }
            if context == "Stack" && name == "b"));
    }

    #[test]
    fn test_stack_bad_orientation() {
        let source = format!(
            "{HEADER}Design: {{name: top}}\nChipletInst:\n  a: {{reference: A}}\nStack:\n  a: {{loc: [0, 0], z: 0, orient: R45}}\n"
        );

        assert!(matches!(
            parse(&source),
            Err(BloxError::UnrecognizedEnumValue { value, .. }) if value == "R45"
        ));
    }

    #[test]
    fn test_stack_requires_z() {
        let source = format!(
            "{HEADER}Design: {{name: top}}\nChipletInst:\n  a: {{reference: A}}\nStack:\n  a: {{loc: [0, 0], orient: R0}}\n"
        );

        assert!(matches!(
            parse(&source),
            Err(BloxError::MissingField { key, .. }) if key == "z"
        ));
    }

    #[test]
    fn test_includes_merge_into_library() {
        let dir = project(&[
            ("cpu.3dbv", chiplet_doc("CPU", 400)),
            (
                "top.3dbx",
                format!(
                    "{HEADER}  include:\n    - cpu.3dbv\nDesign: {{name: top}}\nChipletInst:\n  c0: {{reference: CPU}}\n  ghost: {{reference: GPU}}\n"
                ),
            ),
        ]);

        let data = DbxParser::new(Arc::new(NullSink))
            .parse_file(&dir.path().join("top.3dbx"))
            .unwrap();

        assert_eq!(data.library.len(), 1);
        assert_eq!(data.resolve("c0").unwrap().design_width, Some(400.0));
        // Dangling references parse, and fail on lookup.
        assert!(matches!(
            data.resolve("ghost"),
            Err(BloxError::UndeclaredReference { name, .. }) if name == "GPU"
        ));
    }

    #[test]
    fn test_last_include_wins() {
        let dir = project(&[
            ("a.3dbv", chiplet_doc("CPU", 100)),
            ("b.3dbv", chiplet_doc("CPU", 200)),
            (
                "top.3dbx",
                format!("{HEADER}  include: [a.3dbv, b.3dbv]\nDesign: {{name: top}}\n"),
            ),
        ]);

        let data = DbxParser::new(Arc::new(NullSink))
            .parse_file(&dir.path().join("top.3dbx"))
            .unwrap();

        assert_eq!(
            data.library.get("CPU").and_then(|d| d.design_width),
            Some(200.0)
        );
    }

    #[test]
    fn test_missing_include() {
        let dir = project(&[(
            "top.3dbx",
            format!("{HEADER}  include: [nope.3dbv]\nDesign: {{name: top}}\n"),
        )]);

        let err = DbxParser::new(Arc::new(NullSink))
            .parse_file(&dir.path().join("top.3dbx"))
            .unwrap_err();

        assert!(matches!(err, BloxError::UnresolvedPath { .. }));
    }

    #[test]
    fn test_broken_include_fails_assembly() {
        let dir = project(&[
            ("bad.3dbv", format!("{HEADER}ChipletDef:\n  X:\n    tsv: true\n")),
            (
                "top.3dbx",
                format!("{HEADER}  include: [bad.3dbv]\nDesign: {{name: top}}\n"),
            ),
        ]);

        let err = DbxParser::new(Arc::new(NullSink))
            .parse_file(&dir.path().join("top.3dbx"))
            .unwrap_err();

        match &err {
            BloxError::Include { include, .. } => {
                assert_eq!(include.file_name().unwrap(), "bad.3dbv");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(matches!(err.innermost(), BloxError::MissingField { key, .. } if key == "type"));
    }

    #[test]
    fn test_broken_include_logged_once() {
        let dir = project(&[
            ("bad.3dbv", format!("{HEADER}ChipletDef:\n  X:\n    tsv: true\n")),
            (
                "top.3dbx",
                format!("{HEADER}  include: [bad.3dbv]\nDesign: {{name: top}}\n"),
            ),
        ]);
        let sink = MemorySink::new();

        let _ = DbxParser::new(sink.clone()).parse_file(&dir.path().join("top.3dbx"));

        let errors = sink.at_level(Level::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("'type'"));
        assert!(sink
            .at_level(Level::Debug)
            .iter()
            .any(|e| e.message.contains("failed to load included document")));
    }

    #[test]
    fn test_follow_includes_off() {
        let dir = project(&[(
            "top.3dbx",
            format!("{HEADER}  include: [absent.3dbv]\nDesign: {{name: top}}\n"),
        )]);
        let options = ParseOptions {
            follow_includes: false,
            ..ParseOptions::default()
        };

        let data = DbxParser::new(Arc::new(NullSink))
            .with_options(options)
            .parse_file(&dir.path().join("top.3dbx"))
            .unwrap();

        assert_eq!(data.header.includes.len(), 1);
        assert!(data.library.is_empty());
    }

    #[test]
    fn test_macros_do_not_leak_into_includes() {
        let include = format!("{HEADER}ChipletDef:\n  CPU:\n    type: KIND\n");
        let dir = project(&[
            ("cpu.3dbv", include),
            (
                "top.3dbx",
                format!("#!define KIND die\n{HEADER}  include: [cpu.3dbv]\nDesign: {{name: top}}\n"),
            ),
        ]);
        let top = dir.path().join("top.3dbx");

        let err = DbxParser::new(Arc::new(NullSink)).parse_file(&top).unwrap_err();
        assert!(matches!(
            err.innermost(),
            BloxError::UnrecognizedEnumValue { value, .. } if value == "KIND"
        ));

        let options = ParseOptions {
            inherit_defines: true,
            ..ParseOptions::default()
        };
        let data = DbxParser::new(Arc::new(NullSink))
            .with_options(options)
            .parse_file(&top)
            .unwrap();
        assert!(data.library.get("CPU").is_some());
    }

    #[test]
    fn test_instance_external_files() {
        let source = format!(
            "{HEADER}Design:\n  name: top\n  external:\n    verilog_file: top.v\nChipletInst:\n  a:\n    reference: A\n    external:\n      verilog_file: rtl/a.v\n      sdc_file: a.sdc\n"
        );

        let data = parse(&source).unwrap();

        assert_eq!(
            data.design.external.verilog_file,
            Some(PathBuf::from("/designs/top.v"))
        );
        let external = &data.chiplet_instances["a"].external;
        assert_eq!(external.verilog_file, Some(PathBuf::from("/designs/rtl/a.v")));
        assert_eq!(external.sdc_file, Some(PathBuf::from("/designs/a.sdc")));
        assert_eq!(external.def_file, None);
    }

    #[test]
    fn test_include_replacement_is_logged() {
        let dir = project(&[
            ("a.3dbv", chiplet_doc("CPU", 100)),
            ("b.3dbv", chiplet_doc("CPU", 200)),
            (
                "top.3dbx",
                format!("{HEADER}  include: [a.3dbv, b.3dbv]\nDesign: {{name: top}}\n"),
            ),
        ]);
        let sink = MemorySink::new();

        DbxParser::new(sink.clone())
            .parse_file(&dir.path().join("top.3dbx"))
            .unwrap();

        assert!(sink
            .at_level(Level::Debug)
            .iter()
            .any(|e| e.message == "chiplet definition replaced by later include"));
        // One completion line per document: two includes and the assembly.
        assert_eq!(sink.at_level(Level::Info).len(), 3);
    }
}
