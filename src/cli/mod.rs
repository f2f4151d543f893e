pub mod completions;
pub mod info;
pub mod parse;
pub mod validate;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;
use crate::parser::BloxParser;

/// blox3d - 3DBlox chiplet, assembly and bump map parser
#[derive(Parser, Debug)]
#[command(name = "blox3d")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: blox3d.yaml in the current directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse a file and print its data model
    Parse(parse::ParseArgs),

    /// Check that files parse
    Validate(validate::ValidateArgs),

    /// Summarize a file
    Info(info::InfoArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

impl Cli {
    /// The configuration named by `--config`, or the discovered one.
    pub fn load_config(&self) -> Result<Config> {
        match &self.config {
            Some(path) => Config::load(path),
            None => Config::discover(Path::new(".")),
        }
    }
}

/// A parser logging through the `log` facade with the config's options.
pub fn parser_for(config: &Config) -> BloxParser {
    BloxParser::new().with_options(config.parse_options())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["blox3d", "info", "top.3dbx", "-v", "--config", "c.yaml"])
            .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("c.yaml")));
        assert!(matches!(cli.command, Commands::Info(_)));
    }
}
