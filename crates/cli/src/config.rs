//! `loreforge.toml` configuration
//!
//! Every section is optional. A missing file means defaults.

use loreforge_core::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "loreforge.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub validation: ValidationConfig,
    pub logging: LoggingConfig,
    pub library: LibraryConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// Also cross-check computed formulas against the field list
    pub strict: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Filter used when neither `LOREFORGE_LOG` nor `RUST_LOG` is set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibraryConfig {
    /// Type library file or directory of library files
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load from `path`, falling back to defaults when the file is absent
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path).map_err(|e| EngineError::FileRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config = Self::from_toml(&text)
            .map_err(|e| EngineError::InvalidConfig(format!("{}: {}", path.display(), e)))?;

        // relative library paths are relative to the config file
        if let (Some(library), Some(base)) = (&config.library.path, path.parent()) {
            if library.is_relative() && !base.as_os_str().is_empty() {
                config.library.path = Some(base.join(library));
            }
        }

        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
