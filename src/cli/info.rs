//! Info command implementation.
//!
//! Prints a human-readable summary of one file to stderr.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::Args;

use crate::config::Config;
use crate::error::Result;
use crate::output::{display_path, plural, Printer};
use crate::parser::Parsed;
use crate::types::{BumpMapData, ChipletDef, DbvData, DbxData, Header};

/// Summarize a file
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// File to summarize (.3dbv, .3dbx or .bmap)
    pub file: PathBuf,
}

pub fn run(args: InfoArgs, config: Config, printer: &Printer) -> Result<()> {
    let parsed = super::parser_for(&config).parse(&args.file)?;

    printer.info(
        "File",
        &format!("{} ({})", display_path(&args.file), parsed.format()),
    );

    match &parsed {
        Parsed::ChipletDefinitions(dbv) => print_chiplets(dbv, printer),
        Parsed::Assembly(dbx) => print_assembly(dbx, printer),
        Parsed::BumpMap(bmap) => print_bumps(bmap, printer),
    }

    Ok(())
}

fn print_header(header: &Header, printer: &Printer) {
    printer.info(
        "Header",
        &format!(
            "version {}, unit {}, precision {}",
            header.version, header.unit, header.precision
        ),
    );
    for include in &header.includes {
        printer.info("Include", &display_path(include));
    }
}

fn describe_chiplet(def: &ChipletDef) -> String {
    let size = match (def.design_width, def.design_height) {
        (Some(w), Some(h)) => format!(" {} x {}", w, h),
        _ => String::new(),
    };
    format!(
        "{} ({}){}, {}",
        def.name,
        def.chiplet_type,
        size,
        plural(def.regions.len(), "region", "regions")
    )
}

fn print_chiplets(dbv: &DbvData, printer: &Printer) {
    print_header(&dbv.header, printer);
    for def in dbv.chiplet_defs.values() {
        printer.info("Chiplet", &describe_chiplet(def));
    }
}

fn print_assembly(dbx: &DbxData, printer: &Printer) {
    print_header(&dbx.header, printer);

    let design = dbx.design.name.as_deref().unwrap_or("(unnamed)");
    printer.info("Design", design);
    printer.info(
        "Library",
        &plural(dbx.library.len(), "chiplet definition", "chiplet definitions"),
    );

    for instance in dbx.chiplet_instances.values() {
        let reference = instance.reference.as_deref().unwrap_or("null");
        let line = format!(
            "{} -> {} at ({}, {}, z {}) {}",
            instance.name, reference, instance.loc.x, instance.loc.y, instance.z, instance.orient
        );
        match dbx.resolve(&instance.name) {
            Ok(def) => printer.info(
                "Instance",
                &format!("{} {}", line, printer.dim(&describe_chiplet(def))),
            ),
            Err(_) => printer.warning("Instance", &format!("{} (unresolved)", line)),
        }
    }

    for connection in dbx.connections.values() {
        let top = connection.top.as_deref().unwrap_or("null");
        let bot = connection.bot.as_deref().unwrap_or("null");
        let mut line = format!("{}: {} -> {}", connection.name, top, bot);
        if connection.is_virtual() {
            line.push_str(&format!(" {}", printer.dim("(virtual)")));
        }
        printer.info("Connection", &line);
    }
}

fn print_bumps(bmap: &BumpMapData, printer: &Printer) {
    let nets: BTreeSet<&str> = bmap
        .entries
        .iter()
        .filter_map(|e| e.net_name.as_deref())
        .collect();

    printer.info("Bumps", &plural(bmap.entries.len(), "bump", "bumps"));
    printer.info("Nets", &plural(nets.len(), "net", "nets"));
    printer.info(
        "Unassigned",
        &plural(bmap.unassigned().count(), "bump", "bumps"),
    );
}
