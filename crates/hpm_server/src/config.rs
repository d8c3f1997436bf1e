//! Configuration management for the plugin host.
//!
//! This module handles loading, validation and CLI overrides of the host
//! configuration, read from a TOML file that is created with defaults when
//! missing.

use hpm_abi::ServerType;
use plugin_system::config::PluginsConfPaths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Application configuration loaded from TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server identity and role
    pub server: ServerSettings,
    /// Plugin loading configuration
    pub plugins: PluginSettings,
    /// Logging configuration
    pub logging: LoggingSettings,
    /// Battle settings; keys the host does not know are offered to plugins
    #[serde(default)]
    pub battle: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Name shared with plugins as `server_name`
    pub name: String,
    /// Role this process runs as: "login", "char" or "map"
    #[serde(default = "default_server_type")]
    pub server_type: String,
}

fn default_server_type() -> String {
    "map".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSettings {
    /// Directory native modules are loaded from
    pub directory: String,
    /// Plugin list file
    #[serde(default = "default_list_file")]
    pub list_file: String,
    /// Overlay list file, preferred when present
    #[serde(default = "default_import_file")]
    pub import_file: String,
}

fn default_list_file() -> String {
    PluginsConfPaths::default().file.to_string_lossy().into_owned()
}

fn default_import_file() -> String {
    PluginsConfPaths::default().import_file.to_string_lossy().into_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter
    pub level: String,
    /// Output JSON formatted logs
    #[serde(default)]
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                name: "Hercules".to_string(),
                server_type: default_server_type(),
            },
            plugins: PluginSettings {
                directory: "plugins".to_string(),
                list_file: default_list_file(),
                import_file: default_import_file(),
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
            battle: BTreeMap::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file, writing the defaults if it is missing.
    pub async fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    pub fn server_type(&self) -> ServerType {
        ServerType::from_name(&self.server.server_type).unwrap_or(ServerType::MAP)
    }

    pub fn plugin_dir(&self) -> PathBuf {
        PathBuf::from(&self.plugins.directory)
    }

    pub fn conf_paths(&self) -> PluginsConfPaths {
        PluginsConfPaths {
            file: PathBuf::from(&self.plugins.list_file),
            import_file: PathBuf::from(&self.plugins.import_file),
        }
    }

    /// Battle settings rendered the way plugin listeners receive them.
    pub fn battle_settings(&self) -> Vec<(String, String)> {
        self.battle
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    toml::Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.name.is_empty() {
            return Err("Server name cannot be empty".to_string());
        }

        if ServerType::from_name(&self.server.server_type).is_none() {
            return Err(format!(
                "Invalid server type: {}. Must be one of: login, char, map",
                self.server.server_type
            ));
        }

        if self.plugins.directory.is_empty() {
            return Err("Plugin directory cannot be empty".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
