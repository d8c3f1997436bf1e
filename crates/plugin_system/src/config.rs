//! Plugin list configuration.
//!
//! ```toml
//! plugins_list = ["HPMHooking", "sample"]
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginsConf {
    /// Plugin names in load order, without directory or library suffix.
    #[serde(default)]
    pub plugins_list: Vec<String>,
}

/// Where the plugin list lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginsConfPaths {
    pub file: PathBuf,
    /// Takes precedence over `file` when it exists.
    pub import_file: PathBuf,
}

impl Default for PluginsConfPaths {
    fn default() -> Self {
        Self {
            file: PathBuf::from("conf/plugins.toml"),
            import_file: PathBuf::from("conf/import/plugins.toml"),
        }
    }
}

impl PluginsConfPaths {
    /// The file that will actually be read.
    pub fn effective(&self) -> &Path {
        if self.import_file.is_file() {
            &self.import_file
        } else {
            &self.file
        }
    }
}

impl PluginsConf {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(paths: &PluginsConfPaths) -> Result<Self, ConfigError> {
        Self::load_from_file(paths.effective())
    }
}
