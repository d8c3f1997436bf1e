//! Error types for the plugin manager.
//!
//! Two tiers exist. [`LoadError`] is the fatal tier: a plugin that fails to
//! load leaves the extension surface partially wired, so whoever owns the
//! startup sequence is expected to hand it to [`fatal`]. Everything else is
//! recoverable: the registry logs, refuses the operation and the host keeps
//! running.

use std::path::PathBuf;
use tracing::error;

/// Fatal errors raised while loading a plugin.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The native module could not be opened
    #[error("failed to load '{path}' (error: {reason})")]
    Open { path: PathBuf, reason: String },
    /// A required export is missing from the module
    #[error("failed to retrieve '{symbol}' for '{path}'")]
    MissingExport { path: PathBuf, symbol: &'static str },
    /// The plugin was built against an incompatible host API
    #[error("'{path}' incompatible version '{required}' -> '{host}'")]
    IncompatibleVersion {
        path: PathBuf,
        required: String,
        host: String,
    },
    /// The plugin exports none of the lifecycle events
    #[error("no events found for '{path}'")]
    NoEvents { path: PathBuf },
    /// The plugin could not import a symbol it depends on
    #[error("failed to import symbol '{symbol}' into '{path}'")]
    SharedSymbol { path: PathBuf, symbol: String },
    /// The plugin's struct layouts are out of sync with the host
    #[error("'{path}' failed DataCheck, out of sync from the core (recompile plugin): {source}")]
    DataCheck {
        path: PathBuf,
        #[source]
        source: DataCheckError,
    },
    /// The host-specific wiring step refused the plugin
    #[error("host wiring failed for '{path}': {reason}")]
    Wiring { path: PathBuf, reason: String },
}

/// Reasons a plugin's DataCheck table is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataCheckError {
    #[error("DataCheck API version mismatch {host} != {plugin}")]
    VersionMismatch { host: i32, plugin: i32 },
    #[error("'{name}' was not found")]
    UnknownStruct { name: String },
    #[error("'{name}' size mismatch {plugin} != {host}")]
    SizeMismatch { name: String, plugin: u32, host: u32 },
}

/// Recoverable registration and lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown hook point '{0}'")]
    UnknownHookPoint(u32),
    #[error("invalid packet length {0}")]
    InvalidPacketLength(i32),
    #[error("packet 0x{cmd:04x} already in use by plugin {owner}")]
    DuplicatePacket { cmd: u16, owner: u32 },
    #[error("unknown config category '{0}'")]
    UnknownCategory(u32),
    #[error("duplicate config key '{key}', already in use by plugin {owner}")]
    DuplicateConf { key: String, owner: u32 },
    #[error("HPData resolution failed for type {0}")]
    HpDataUnresolved(u32),
    #[error("duplicate HPData entry for plugin {pid} and tag {tag}")]
    DuplicateHpData { pid: u32, tag: u32 },
    #[error("hooking is disabled")]
    HookingDisabled,
    #[error("unknown hooking point '{0}'")]
    UnknownHookTarget(String),
    #[error("invalid argument name '{0}': arguments must begin with '--'")]
    InvalidArgName(String),
    #[error("duplicate argument '{0}'")]
    DuplicateArg(String),
    #[error("invalid console command name '{0}'")]
    InvalidCommand(String),
    #[error("duplicate console command '{0}'")]
    DuplicateCommand(String),
}

/// Failures while executing plugin-registered command-line arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CmdlineError {
    #[error("argument '{0}' requires a parameter")]
    MissingParam(String),
    #[error("argument '{0}' was rejected by its handler")]
    Rejected(String),
}

/// Failures while reading the plugin list configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Logs a fatal load error and terminates the process.
pub fn fatal(err: &LoadError) -> ! {
    error!("HPM: plugin_load: {}", err);
    std::process::exit(1)
}
