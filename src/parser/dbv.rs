//! Chiplet-definition (`.3dbv`) parser.
//!
//! A `.3dbv` document has a `Header` and a `ChipletDef` mapping of chiplet
//! name to definition. File references inside a definition resolve against
//! the document's own directory.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use log::Level;

use crate::error::Result;
use crate::log_sink::LogSink;
use crate::types::{
    ChipletDef, ChipletExternal, ChipletRegion, ChipletType, Coordinate, DbvData, EdgeWidths, Side,
};

use super::base::{child, present, DocumentContext};
use super::document::{Mapping, Node};
use super::macros::MacroTable;
use super::paths;

const ROOT_KEYS: &[&str] = &["Header", "ChipletDef"];

const CHIPLET_KEYS: &[&str] = &[
    "type",
    "design_area",
    "offset",
    "seal_ring_width",
    "scribe_line_remaining_width",
    "thickness",
    "shrink",
    "tsv",
    "regions",
    "external",
];

const REGION_KEYS: &[&str] = &["bmap", "pmap", "side", "layer", "gds_layer", "coords"];

const EXTERNAL_KEYS: &[&str] = &["LEF_file", "APR_tech_file", "liberty_file", "DEF_file"];

/// Parser for chiplet-definition documents.
pub struct DbvParser {
    sink: Arc<dyn LogSink>,
    defines: BTreeMap<String, String>,
}

impl DbvParser {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            defines: BTreeMap::new(),
        }
    }

    /// Macros bound before the document's own `#!define` lines.
    pub fn with_defines(mut self, defines: BTreeMap<String, String>) -> Self {
        self.defines = defines;
        self
    }

    /// Read and parse a `.3dbv` file.
    pub fn parse_file(&self, path: &Path) -> Result<DbvData> {
        let ctx = DocumentContext::new(paths::absolute(path), self.sink.clone());
        let source = ctx.read_source()?;
        self.parse_in(&ctx, &source, MacroTable::seeded(&self.defines))
    }

    /// Parse `.3dbv` text as if it had been read from `path`.
    pub fn parse_str(&self, source: &str, path: &Path) -> Result<DbvData> {
        let ctx = DocumentContext::new(paths::absolute(path), self.sink.clone());
        self.parse_in(&ctx, source, MacroTable::seeded(&self.defines))
    }

    /// Read and parse a file with an explicit starting macro table. Used for
    /// assembly includes.
    pub(crate) fn parse_file_with(&self, path: &Path, macros: MacroTable) -> Result<DbvData> {
        let ctx = DocumentContext::new(paths::absolute(path), self.sink.clone());
        let source = ctx.read_source()?;
        self.parse_in(&ctx, &source, macros)
    }

    fn parse_in(&self, ctx: &DocumentContext, source: &str, macros: MacroTable) -> Result<DbvData> {
        let expanded = ctx.expand(source, macros)?;
        let root = ctx.load(&expanded.text)?;
        let data = parse_root(ctx, &root)?;

        let count = data.chiplet_defs.len().to_string();
        ctx.log(
            Level::Info,
            "parsed chiplet definitions",
            &[("chiplets", count.as_str())],
        );
        Ok(data)
    }
}

fn parse_root(ctx: &DocumentContext, root: &Mapping) -> Result<DbvData> {
    ctx.ignore_unknown(root, ROOT_KEYS, "");

    let header = ctx.parse_header(ctx.require_section(root, "Header", "document")?)?;

    let mut chiplet_defs = BTreeMap::new();
    if let Some(defs) = ctx.section(root, "ChipletDef", "document")? {
        for (name, node) in defs.iter() {
            chiplet_defs.insert(name.to_string(), parse_chiplet(ctx, name, node)?);
        }
    }

    Ok(DbvData {
        header,
        chiplet_defs,
    })
}

fn parse_chiplet(ctx: &DocumentContext, name: &str, node: &Node) -> Result<ChipletDef> {
    let context = child("ChipletDef", name);
    let map = ctx.entry(node, "ChipletDef", name)?;
    ctx.ignore_unknown(map, CHIPLET_KEYS, &context);

    let type_name = ctx.require_value::<String>(map, "type", &context)?;
    let chiplet_type = ChipletType::parse(&type_name).ok_or_else(|| {
        let expected: Vec<&str> = ChipletType::ALL.iter().map(|t| t.as_str()).collect();
        ctx.unrecognized(&context, "chiplet type", &type_name, &expected)
    })?;

    let mut def = ChipletDef::new(name, chiplet_type);

    if let Some(area) = present(map, "design_area") {
        let [width, height] = ctx.parse_numbers::<2>(area, &context, "design_area")?;
        def.design_width = Some(width);
        def.design_height = Some(height);
    }

    def.offset = match present(map, "offset") {
        Some(offset) => ctx.parse_coordinate(offset, &context, "offset")?,
        None => Coordinate::origin(),
    };

    def.seal_ring_width = edge_widths(ctx, map, "seal_ring_width", &context)?;
    def.scribe_line_remaining_width =
        edge_widths(ctx, map, "scribe_line_remaining_width", &context)?;
    def.thickness = ctx.optional_value(map, "thickness", &context)?;
    def.shrink = ctx.optional_value(map, "shrink", &context)?;
    def.tsv = ctx.optional_value(map, "tsv", &context)?.unwrap_or(false);

    if let Some(regions) = ctx.section(map, "regions", &context)? {
        let regions_context = child(&context, "regions");
        for (region_name, region) in regions.iter() {
            def.regions.insert(
                region_name.to_string(),
                parse_region(ctx, region_name, region, &regions_context)?,
            );
        }
    }

    if let Some(external) = ctx.section(map, "external", &context)? {
        def.external = parse_external(ctx, external, &child(&context, "external"))?;
    }

    Ok(def)
}

fn edge_widths(
    ctx: &DocumentContext,
    map: &Mapping,
    key: &str,
    context: &str,
) -> Result<Option<EdgeWidths>> {
    match present(map, key) {
        Some(node) => Ok(Some(EdgeWidths::from_array(
            ctx.parse_numbers::<4>(node, context, key)?,
        ))),
        None => Ok(None),
    }
}

fn parse_region(
    ctx: &DocumentContext,
    name: &str,
    node: &Node,
    regions_context: &str,
) -> Result<ChipletRegion> {
    let context = child(regions_context, name);
    let map = ctx.entry(node, regions_context, name)?;
    ctx.ignore_unknown(map, REGION_KEYS, &context);

    let side = match ctx.optional_value::<String>(map, "side", &context)? {
        Some(name) => Some(Side::parse(&name).ok_or_else(|| {
            let expected: Vec<&str> = Side::ALL.iter().map(|s| s.as_str()).collect();
            ctx.unrecognized(&context, "side", &name, &expected)
        })?),
        None => None,
    };

    let coords = match present(map, "coords") {
        Some(coords) => ctx.parse_coordinates(coords, &context, "coords")?,
        None => Vec::new(),
    };

    Ok(ChipletRegion {
        name: name.to_string(),
        side,
        bmap: ctx.optional_file(map, "bmap", &context)?,
        pmap: ctx.optional_file(map, "pmap", &context)?,
        layer: ctx.optional_value(map, "layer", &context)?,
        gds_layer: ctx.optional_value(map, "gds_layer", &context)?,
        coords,
    })
}

fn parse_external(ctx: &DocumentContext, map: &Mapping, context: &str) -> Result<ChipletExternal> {
    ctx.ignore_unknown(map, EXTERNAL_KEYS, context);

    Ok(ChipletExternal {
        lef_files: ctx.optional_files(map, "LEF_file", context)?,
        tech_lef_files: ctx.optional_files(map, "APR_tech_file", context)?,
        lib_files: ctx.optional_files(map, "liberty_file", context)?,
        def_file: ctx.optional_file(map, "DEF_file", context)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BloxError;
    use crate::log_sink::{MemorySink, NullSink};
    use std::fs;
    use std::path::PathBuf;
    use tempfile::tempdir;

    const DOC: &str = "/designs/soc/chiplets.3dbv";

    const SOC: &str = r#"
Header:
  version: 2.5
  unit: micron
  precision: 2000

ChipletDef:
  SoC:
    type: die
    design_area: [955, 1082]
    thickness: 300
    shrink: 1.0
    tsv: false
    regions:
      r1:
        side: front
        layer: M9
        coords:
          - [0, 0]
          - [955, 0]
          - [955, 1082]
          - [0, 1082]
"#;

    fn parse(source: &str) -> Result<DbvData> {
        DbvParser::new(Arc::new(NullSink)).parse_str(source, Path::new(DOC))
    }

    #[test]
    fn test_parse_soc_definition() {
        let data = parse(SOC).unwrap();

        assert_eq!(data.header.version, "2.5");
        assert_eq!(data.header.precision, 2000);

        let soc = &data.chiplet_defs["SoC"];
        assert_eq!(soc.chiplet_type, ChipletType::Die);
        assert_eq!(soc.design_width, Some(955.0));
        assert_eq!(soc.design_height, Some(1082.0));
        assert_eq!(soc.thickness, Some(300.0));
        assert_eq!(soc.offset, Coordinate::origin());
        assert!(!soc.tsv);

        let r1 = &soc.regions["r1"];
        assert_eq!(r1.side, Some(Side::Front));
        assert_eq!(r1.layer.as_deref(), Some("M9"));
        assert_eq!(r1.coords.len(), 4);
        assert_eq!(r1.bmap, None);
    }

    #[test]
    fn test_missing_type() {
        let source = "Header: {version: 1, unit: micron, precision: 1}\nChipletDef:\n  A:\n    tsv: true\n";

        let err = parse(source).unwrap_err();

        assert!(matches!(err, BloxError::MissingField { context, key, .. }
            if context == "ChipletDef.A" && key == "type"));
    }

    #[test]
    fn test_unknown_type() {
        let source = "Header: {version: 1, unit: micron, precision: 1}\nChipletDef:\n  A:\n    type: wafer\n";

        let err = parse(source).unwrap_err();

        assert!(matches!(err, BloxError::UnrecognizedEnumValue { value, .. } if value == "wafer"));
    }

    #[test]
    fn test_unknown_side() {
        let source = "Header: {version: 1, unit: micron, precision: 1}\nChipletDef:\n  A:\n    type: die\n    regions:\n      r1:\n        side: left\n";

        let err = parse(source).unwrap_err();

        assert!(matches!(err, BloxError::UnrecognizedEnumValue { context, .. }
            if context == "ChipletDef.A.regions.r1"));
    }

    #[test]
    fn test_region_without_side() {
        let source = "Header: {version: 1, unit: micron, precision: 1}\nChipletDef:\n  A:\n    type: die\n    regions:\n      r1:\n        layer: M1\n        coords: [[0, 0], [1, 0], [1, 1]]\n";

        let dbv = parse(source).unwrap();
        let r1 = &dbv.chiplet_defs["A"].regions["r1"];

        assert_eq!(r1.side, None);
        assert_eq!(r1.layer.as_deref(), Some("M1"));
        assert_eq!(r1.coords.len(), 3);
    }

    #[test]
    fn test_missing_header() {
        let err = parse("ChipletDef: {}\n").unwrap_err();

        assert!(matches!(err, BloxError::MissingField { key, .. } if key == "Header"));
    }

    #[test]
    fn test_edge_widths_need_four_values() {
        let ok = "Header: {version: 1, unit: micron, precision: 1}\nChipletDef:\n  A:\n    type: interposer\n    seal_ring_width: [1, 2, 3, 4]\n";
        let bad = "Header: {version: 1, unit: micron, precision: 1}\nChipletDef:\n  A:\n    type: interposer\n    scribe_line_remaining_width: [1, 2, 3]\n";

        let def = &parse(ok).unwrap().chiplet_defs["A"];
        assert_eq!(
            def.seal_ring_width,
            Some(EdgeWidths {
                left: 1.0,
                bottom: 2.0,
                right: 3.0,
                top: 4.0
            })
        );
        assert!(matches!(parse(bad), Err(BloxError::TypeMismatch { .. })));
    }

    #[test]
    fn test_offset_and_design_area_optional() {
        let source = "Header: {version: 1, unit: micron, precision: 1}\nChipletDef:\n  A:\n    type: die\n    offset: [5, 7.5]\n";

        let def = &parse(source).unwrap().chiplet_defs["A"];

        assert_eq!(def.offset, Coordinate::new(5.0, 7.5));
        assert_eq!(def.design_width, None);
        assert_eq!(def.design_height, None);
    }

    #[test]
    fn test_macro_path_in_external() {
        let source = r#"#!define NG45_PATH ../Nangate45
Header: {version: 1, unit: micron, precision: 1}
ChipletDef:
  A:
    type: die
    external:
      LEF_file: NG45_PATH/macros.lef
      DEF_file: NG45_PATH/a.def
"#;

        let def = &parse(source).unwrap().chiplet_defs["A"];

        assert_eq!(
            def.external.lef_files,
            vec![PathBuf::from("/designs/Nangate45/macros.lef")]
        );
        assert_eq!(
            def.external.def_file,
            Some(PathBuf::from("/designs/Nangate45/a.def"))
        );
    }

    #[test]
    fn test_predefined_macros() {
        let mut defines = BTreeMap::new();
        defines.insert("KIND".to_string(), "rdl".to_string());
        let source = "Header: {version: 1, unit: micron, precision: 1}\nChipletDef:\n  A:\n    type: KIND\n";

        let data = DbvParser::new(Arc::new(NullSink))
            .with_defines(defines)
            .parse_str(source, Path::new(DOC))
            .unwrap();

        assert_eq!(data.chiplet_defs["A"].chiplet_type, ChipletType::Rdl);
    }

    #[test]
    fn test_wildcard_external_files() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("lef")).unwrap();
        fs::write(dir.path().join("lef/foo_tech.lef"), "").unwrap();
        fs::write(dir.path().join("lef/foo_cells.lef"), "").unwrap();
        let doc = dir.path().join("a.3dbv");
        fs::write(
            &doc,
            "Header: {version: 1, unit: micron, precision: 1}\nChipletDef:\n  A:\n    type: die\n    external:\n      APR_tech_file: lef/*_tech.lef\n      liberty_file: lib/*.lib\n",
        )
        .unwrap();

        let err = DbvParser::new(Arc::new(NullSink)).parse_file(&doc).unwrap_err();
        assert!(matches!(err, BloxError::UnresolvedPath { .. }));

        fs::create_dir(dir.path().join("lib")).unwrap();
        let def = DbvParser::new(Arc::new(NullSink))
            .parse_file(&doc)
            .unwrap()
            .chiplet_defs
            .remove("A")
            .unwrap();

        assert_eq!(
            def.external.tech_lef_files,
            vec![paths::normalize(&dir.path().join("lef/foo_tech.lef"))]
        );
        assert!(def.external.lib_files.is_empty());
    }

    #[test]
    fn test_unknown_fields_are_warned() {
        let sink = MemorySink::new();
        let source = "Header: {version: 1, unit: micron, precision: 1}\nChipletDef:\n  A:\n    type: die\n    aux_layer: M10\n";

        let data = DbvParser::new(sink.clone())
            .parse_str(source, Path::new(DOC))
            .unwrap();

        assert!(data.chiplet_defs.contains_key("A"));
        let warnings = sink.at_level(Level::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0]
            .fields
            .contains(&("field".to_string(), "ChipletDef.A.aux_layer".to_string())));
    }

    #[test]
    fn test_completion_is_logged() {
        let sink = MemorySink::new();

        DbvParser::new(sink.clone())
            .parse_str(SOC, Path::new(DOC))
            .unwrap();

        let info = sink.at_level(Level::Info);
        assert_eq!(info.len(), 1);
        assert!(info[0]
            .fields
            .contains(&("chiplets".to_string(), "1".to_string())));
    }
}
