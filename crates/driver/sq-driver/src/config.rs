//! Lowering configuration files

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sq_lower::SessionOptions;
use sq_span::FileId;
use std::path::Path;

/// Settings for one compilation unit, usually read from a TOML file
///
/// ```toml
/// file_id = 2
/// prelude = false
/// flags = ["debug"]
/// pointer_width = 4
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowerConfig {
    /// File id attached to reported positions
    pub file_id: u32,

    /// Install the builtin functions
    pub prelude: bool,

    /// Flags set before lowering starts
    pub flags: Vec<String>,

    /// Bytes per pointer
    pub pointer_width: u32,
}

impl Default for LowerConfig {
    fn default() -> Self {
        let options = SessionOptions::default();
        Self {
            file_id: options.file.0,
            prelude: options.prelude,
            flags: options.flags,
            pointer_width: options.pointer_width,
        }
    }
}

impl LowerConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse lowering configuration")
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid configuration file: {}", path.display()))
    }

    /// Session options equivalent to this configuration
    pub fn options(&self) -> SessionOptions {
        SessionOptions {
            file: FileId::new(self.file_id),
            prelude: self.prelude,
            flags: self.flags.clone(),
            pointer_width: self.pointer_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = LowerConfig::from_toml_str("").unwrap();
        assert_eq!(config, LowerConfig::default());
        assert!(config.prelude);
        assert_eq!(config.pointer_width, 8);
    }

    #[test]
    fn test_partial_config() {
        let config = LowerConfig::from_toml_str("pointer_width = 4\nflags = [\"atomic\"]").unwrap();
        assert_eq!(config.pointer_width, 4);
        assert_eq!(config.flags, ["atomic"]);
        assert!(config.prelude);

        let options = config.options();
        assert_eq!(options.pointer_width, 4);
        assert_eq!(options.file, FileId(0));
    }

    #[test]
    fn test_malformed_config() {
        let error = LowerConfig::from_toml_str("prelude = \"yes\"").unwrap_err();
        assert_eq!(error.to_string(), "Failed to parse lowering configuration");
    }
}
