//! Parser configuration.
//!
//! `ParseOptions` is what the library consumes. `Config` is the optional
//! `blox3d.yaml` file the CLI reads it from, next to CLI flags.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{BloxError, Result};

/// The name of the configuration file looked up by the CLI.
pub const CONFIG_FILENAME: &str = "blox3d.yaml";

/// Options applied to every document of one parse call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Macro bindings seeded into every document before its own
    /// `#!define` lines.
    pub defines: BTreeMap<String, String>,
    /// Expand included chiplet definitions with the including assembly's
    /// bindings as well. Off by default: includes see only `defines` and
    /// their own directives.
    pub inherit_defines: bool,
    /// Load `Header.include` documents of an assembly. When off, include
    /// paths are still resolved but nothing is merged.
    pub follow_includes: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            defines: BTreeMap::new(),
            inherit_defines: false,
            follow_includes: true,
        }
    }
}

/// Output format for the `parse` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
    /// Indented `key: value` text for reading in a terminal.
    Pretty,
}

/// Project configuration loaded from blox3d.yaml.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Predefined macros, as if each document started with
    /// `#!define NAME VALUE` lines.
    #[serde(default)]
    pub defines: BTreeMap<String, String>,

    /// Thread assembly macros into included documents.
    #[serde(default)]
    pub inherit_defines: bool,

    /// Load included chiplet definitions.
    #[serde(default = "default_follow_includes")]
    pub follow_includes: bool,

    /// Default output format for `blox3d parse`.
    #[serde(default)]
    pub format: OutputFormat,
}

fn default_follow_includes() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            defines: BTreeMap::new(),
            inherit_defines: false,
            follow_includes: default_follow_includes(),
            format: OutputFormat::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| BloxError::Io {
            path: path.to_path_buf(),
            message: format!("Failed to read config: {}", e),
        })?;

        Self::parse(&content, path)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| BloxError::Syntax {
            file: path.to_path_buf(),
            location: crate::parser::span::Location::from_yaml_error(&e),
            message: format!("Invalid config: {}", e),
            help: Some(format!("Check {} syntax", CONFIG_FILENAME)),
        })
    }

    /// Load `blox3d.yaml` from `dir` if there is one, defaults otherwise.
    pub fn discover(dir: &Path) -> Result<Self> {
        let path = dir.join(CONFIG_FILENAME);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Path of the config file `discover` would read.
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILENAME)
    }

    /// Add `NAME=VALUE` definitions, overriding the file's.
    pub fn with_defines<I, S>(mut self, defines: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for define in defines {
            let define = define.as_ref();
            let (name, value) = define
                .split_once('=')
                .filter(|(name, _)| !name.trim().is_empty())
                .ok_or_else(|| BloxError::Syntax {
                    file: PathBuf::from("<command line>"),
                    location: None,
                    message: format!("invalid define '{}'", define),
                    help: Some("use -D NAME=VALUE".to_string()),
                })?;
            self.defines
                .insert(name.trim().to_string(), value.trim().to_string());
        }
        Ok(self)
    }

    /// Options for the parser.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            defines: self.defines.clone(),
            inherit_defines: self.inherit_defines,
            follow_includes: self.follow_includes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(yaml: &str) -> Result<Config> {
        Config::parse(yaml, Path::new(CONFIG_FILENAME))
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
defines:
  NG45_PATH: ../Nangate45
  PDK: /opt/pdk
inherit_defines: true
follow_includes: false
format: yaml
"#;
        let config = parse(yaml).unwrap();

        assert_eq!(config.defines.get("NG45_PATH").map(String::as_str), Some("../Nangate45"));
        assert_eq!(config.defines.len(), 2);
        assert!(config.inherit_defines);
        assert!(!config.follow_includes);
        assert_eq!(config.format, OutputFormat::Yaml);
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse("").unwrap();

        assert_eq!(config, Config::default());
        assert!(config.follow_includes);
    }

    #[test]
    fn test_parse_invalid_config() {
        assert!(matches!(parse("format: xml\n"), Err(BloxError::Syntax { .. })));
        assert_eq!(parse("format: pretty\n").unwrap().format, OutputFormat::Pretty);
    }

    #[test]
    fn test_parse_options_default() {
        let options = Config::default().parse_options();

        assert_eq!(options, ParseOptions::default());
    }

    #[test]
    fn test_with_defines() {
        let config = parse("defines:\n  A: '1'\n")
            .unwrap()
            .with_defines(["A=2", "B = x y"])
            .unwrap();

        assert_eq!(config.defines.get("A").map(String::as_str), Some("2"));
        assert_eq!(config.defines.get("B").map(String::as_str), Some("x y"));
    }

    #[test]
    fn test_with_defines_rejects_malformed() {
        assert!(Config::default().with_defines(["NOVALUE"]).is_err());
        assert!(Config::default().with_defines(["=1"]).is_err());
    }

    #[test]
    fn test_discover() {
        let dir = tempdir().unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap(), Config::default());

        std::fs::write(Config::path_in(dir.path()), "follow_includes: false\n").unwrap();
        assert!(!Config::discover(dir.path()).unwrap().follow_includes);
    }
}
