//! Validate command implementation.
//!
//! Parses each file and reports which ones fail. Every file is checked even
//! after a failure.

use std::path::PathBuf;

use clap::Args;

use crate::config::Config;
use crate::output::{display_path, plural, Printer};

/// Check that files parse
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Files to validate
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

/// Returns whether every file parsed.
pub fn run(args: ValidateArgs, config: Config, printer: &Printer) -> bool {
    let parser = super::parser_for(&config);
    let mut failed = 0;

    for file in &args.files {
        match parser.parse(file) {
            Ok(parsed) => {
                printer.success(
                    "Valid",
                    &format!("{} ({})", display_path(file), parsed.format()),
                );
            }
            Err(err) => {
                failed += 1;
                printer.error("Invalid", &display_path(file));
                eprintln!("{:?}", miette::Report::new(err));
            }
        }
    }

    let checked = plural(args.files.len(), "file", "files");
    if failed == 0 {
        printer.success("Finished", &format!("{} valid", checked));
    } else {
        printer.error(
            "Finished",
            &format!("{} checked, {} invalid", checked, failed),
        );
    }

    failed == 0
}
