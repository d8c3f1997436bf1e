//! # HPM ABI
//!
//! The binary contract between the host plugin manager and the native
//! plugins it loads. Everything in this crate crosses a `dlopen` boundary, so
//! every record is `#[repr(C)]`, every enumeration is a transparent integer
//! newtype (a plugin may hand the host any bit pattern) and every callback is
//! an `extern "C"` function pointer.
//!
//! ## Module contract
//!
//! A loadable plugin exports:
//!
//! - [`symbols::PLUGIN_INFO`] - a [`PluginInfo`] record
//! - [`symbols::IMPORT_SYMBOL`] - a slot the host fills with its [`ImportSymbolFn`]
//! - [`symbols::INTERFACE`] / [`symbols::INTERFACE_STORAGE`] - the capability
//!   table pointer and the storage the host fills with [`HostInterface`] slots
//! - at least one lifecycle entry point (see [`EventKind::export_name`])
//! - [`symbols::SHARED_SYMBOLS`] - the version-negotiation export
//! - the DataCheck triple [`symbols::DATACHECK`], [`symbols::DATACHECK_LEN`]
//!   and [`symbols::DATACHECK_VER`]
//!
//! The [`hpm_plugin!`] macro generates every export except the lifecycle
//! entry points, which plugins write themselves:
//!
//! ```rust,ignore
//! use hpm_abi::{datacheck_entry, hpm_plugin, HostInterface, PluginInfo, ServerType};
//!
//! hpm_plugin! {
//!     name: "sample",
//!     version: "0.1.0",
//!     server_type: ServerType::ALL,
//!     shared_symbols: ["server_name"],
//!     datacheck: [
//!         datacheck_entry!(HostInterface, ServerType::ALL),
//!         datacheck_entry!(PluginInfo, ServerType::ALL),
//!     ],
//! }
//!
//! #[export_name = "plugin_init"]
//! pub extern "C" fn plugin_init() {}
//! ```

pub mod interface;
mod macros;

pub use interface::*;

use std::os::raw::{c_char, c_int, c_uint};

/// Version of the plugin manager API implemented by the host, as "major.minor".
pub const HPM_VERSION: &str = "1.2";

/// [`HPM_VERSION`] with a terminating nul, as stored in [`PluginInfo::req_version`].
pub const HPM_VERSION_NUL: &str = "1.2\0";

/// Version tag of the DataCheck table layout.
pub const DATACHECK_VERSION: c_int = 1;

/// Plugin id reserved for the host itself.
pub const HPM_PID_CORE: c_uint = c_uint::MAX;

/// Packet length sentinel: the real length is the u16 at offset 2.
pub const VARIABLE_LENGTH: c_int = -1;

/// Maximum stored length of a configuration listener key, terminator included.
pub const ADDCONF_LENGTH: usize = 40;

/// Names of the symbols a module exports.
pub mod symbols {
    pub const PLUGIN_INFO: &str = "plugin_info";
    pub const IMPORT_SYMBOL: &str = "import_symbol";
    pub const INTERFACE: &str = "hpm_interface";
    pub const INTERFACE_STORAGE: &str = "hpm_interface_storage";
    pub const SHARED_SYMBOLS: &str = "hpm_shared_symbols";
    pub const DATACHECK: &str = "hpm_datacheck";
    pub const DATACHECK_LEN: &str = "hpm_datacheck_len";
    pub const DATACHECK_VER: &str = "hpm_datacheck_ver";

    /// Discovery pair exported by the hooking module only.
    pub const HOOKED: &str = "hpm_hooked";
    pub const ADD_HOOK: &str = "hpm_add_hook";
}

// ============================================================================
// Integer enumerations
// ============================================================================

/// Bitmask of server roles a plugin (or a DataCheck entry) applies to.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ServerType(pub c_uint);

impl ServerType {
    pub const NONE: Self = Self(0x0);
    pub const LOGIN: Self = Self(0x1);
    pub const CHAR: Self = Self(0x2);
    pub const MAP: Self = Self(0x4);
    pub const ALL: Self = Self(0x1 | 0x2 | 0x4);

    /// Whether any role in `other` is also in `self`.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Suffix appended to per-role module names ("_login", "_char", "_map").
    pub fn suffix(self) -> &'static str {
        match self {
            Self::LOGIN => "_login",
            Self::CHAR => "_char",
            Self::MAP => "_map",
            _ => "",
        }
    }

    /// Parses a single role name as used in configuration files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "login" => Some(Self::LOGIN),
            "char" => Some(Self::CHAR),
            "map" => Some(Self::MAP),
            _ => None,
        }
    }
}

/// Lifecycle events, in the order the host fires them.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Before host subsystems initialize.
    PreInit = 0,
    Init = 1,
    /// Host fully online.
    Ready = 2,
    /// Host tearing down.
    Final = 3,
    /// After teardown, for leak-free diagnostics.
    PostFinal = 4,
}

impl EventKind {
    pub const COUNT: usize = 5;

    pub const ALL: [EventKind; Self::COUNT] = [
        EventKind::PreInit,
        EventKind::Init,
        EventKind::Ready,
        EventKind::Final,
        EventKind::PostFinal,
    ];

    /// Name of the entry point a module exports for this event.
    pub const fn export_name(self) -> &'static str {
        match self {
            EventKind::PreInit => "server_preinit",
            EventKind::Init => "plugin_init",
            EventKind::Ready => "server_online",
            EventKind::Final => "plugin_final",
            EventKind::PostFinal => "server_post_final",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Dispatch locations in the network layer where plugins may claim packets.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketHookPoint(pub c_uint);

impl PacketHookPoint {
    pub const CLIF_PARSE: Self = Self(0);
    pub const CHRIF_PARSE: Self = Self(1);
    pub const PARSE_FROM_MAP: Self = Self(2);
    pub const PARSE_FROM_CHAR: Self = Self(3);
    pub const PARSE_CHAR: Self = Self(4);
    pub const PARSE_FROM_LOGIN: Self = Self(5);
    pub const PARSE_LOGIN: Self = Self(6);

    /// Number of hook points; any value at or above this is unknown.
    pub const COUNT: usize = 7;

    pub fn index(self) -> Option<usize> {
        let idx = self.0 as usize;
        (idx < Self::COUNT).then_some(idx)
    }
}

/// Configuration categories a plugin may intercept keys in.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConfCategory(pub c_uint);

impl ConfCategory {
    pub const BATTLE: Self = Self(0);
    pub const LOGIN: Self = Self(1);
    pub const CHAR: Self = Self(2);
    pub const CHAR_INTER: Self = Self(3);
    pub const MAP_INTER: Self = Self(4);
    pub const LOG: Self = Self(5);
    pub const SCRIPT: Self = Self(6);

    pub const COUNT: usize = 7;

    pub fn index(self) -> Option<usize> {
        let idx = self.0 as usize;
        (idx < Self::COUNT).then_some(idx)
    }
}

/// Host object kinds that can carry plugin data.
///
/// `SESSION` is handled by the core; every other kind is resolved by the
/// host's delegate accessor.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HpDataType(pub c_uint);

impl HpDataType {
    pub const UNKNOWN: Self = Self(0);
    pub const SESSION: Self = Self(1);
    pub const MSD: Self = Self(2);
    pub const NPCD: Self = Self(3);
    pub const MAP: Self = Self(4);
    pub const INSTANCE: Self = Self(5);
    pub const GUILD: Self = Self(6);
    pub const PARTY: Self = Self(7);
}

/// Whether a function hook runs before or after the original function.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookType(pub c_uint);

impl HookType {
    pub const PRE: Self = Self(0);
    pub const POST: Self = Self(1);
}

// ============================================================================
// Exported records
// ============================================================================

/// Metadata record every plugin exports as [`symbols::PLUGIN_INFO`].
#[repr(C)]
#[derive(Debug)]
pub struct PluginInfo {
    /// Plugin name (null-terminated).
    pub name: *const c_char,
    /// Server roles the plugin supports.
    pub server_type: ServerType,
    /// Plugin's own version (null-terminated).
    pub version: *const c_char,
    /// Host API version the plugin was built against, "major.minor".
    pub req_version: *const c_char,
}

// Points only at immutable 'static strings.
unsafe impl Sync for PluginInfo {}

/// One struct layout a binary was compiled against.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DataCheckEntry {
    /// Struct name (null-terminated).
    pub name: *const c_char,
    /// `size_of` the struct.
    pub size: c_uint,
    /// Server roles this entry is relevant to.
    pub server_type: ServerType,
}

unsafe impl Sync for DataCheckEntry {}
