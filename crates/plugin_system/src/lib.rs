//! Host plugin manager
//!
//! Loads natively built plugins into a running server, checks that they were
//! built against a compatible API and matching struct layouts, and exposes a
//! fixed capability table through which they register packet handlers,
//! function hooks, per-object data, configuration listeners, command-line
//! flags and console commands.
//!
//! # Usage
//!
//! ```rust,ignore
//! use plugin_system::{host, datacheck::CORE_DATACHECK, PluginManager};
//! use hpm_abi::{EventKind, ServerType, DATACHECK_VERSION};
//!
//! let manager = host::install(PluginManager::new(ServerType::MAP));
//! unsafe { manager.datacheck_init(&CORE_DATACHECK, DATACHECK_VERSION) };
//! manager.config_read();
//! manager.event(EventKind::Init);
//! ```
//!
//! The manager is single-threaded: it lives on the thread that drives the
//! server loop, and plugins reach it through [`host::current`].

pub mod cmdline;
pub mod conf;
pub mod config;
pub mod console;
pub mod datacheck;
pub mod error;
pub mod filenames;
pub mod hooks;
pub mod host;
pub mod hpdata;
pub mod manager;
pub mod memory;
pub mod module;
pub mod packets;
pub mod session;
pub mod symbols;

pub use error::{fatal, CmdlineError, ConfigError, DataCheckError, LoadError, RegistryError};
pub use hooks::HookCall;
pub use manager::{HostVersion, LoadSub, PluginManager, PluginSummary, HOOKING_PLUGIN};
pub use module::{DynamicLibraryLoader, ModuleLoader, NativeModule, StaticLoader, StaticModule};
pub use packets::{PacketBuffer, PacketParse};
pub use session::Session;
