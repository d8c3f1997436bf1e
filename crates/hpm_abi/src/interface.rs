//! The capability table the host writes into every plugin, and the
//! function-pointer types that travel across the boundary.

use crate::{ConfCategory, HookType, HpDataType, PacketHookPoint, ServerType};
use std::os::raw::{c_char, c_int, c_uint, c_void};

/// Host symbol lookup, written into each plugin's [`crate::symbols::IMPORT_SYMBOL`] slot.
///
/// Returns null when no symbol of that name was shared.
pub type ImportSymbolFn = unsafe extern "C" fn(name: *const c_char, pid: c_uint) -> *mut c_void;

/// A lifecycle entry point.
pub type EventFn = unsafe extern "C" fn();

/// Version negotiation export: null on success, otherwise the name of the
/// first symbol the plugin could not import.
pub type SharedSymbolsFn = unsafe extern "C" fn(server_type: ServerType) -> *const c_char;

/// Packet handler; receives the descriptor of the connection whose buffer
/// holds a complete packet.
pub type PacketReceiveFn = unsafe extern "C" fn(fd: c_int);

/// Configuration listener; receives the value of the intercepted key.
pub type ConfListenerFn = unsafe extern "C" fn(value: *const c_char);

/// Command-line argument callback. `params` is null for flags without a value.
pub type CmdlineExecFn = unsafe extern "C" fn(name: *const c_char, params: *const c_char) -> bool;

/// Console command callback; receives the text after the command name.
pub type ConsoleCommandFn = unsafe extern "C" fn(line: *const c_char);

/// Hooking module discovery: receives the address of the host's propagation
/// flag, returns null or the name of a symbol it failed to resolve.
pub type HookedFn = unsafe extern "C" fn(force_return: *mut bool) -> *const c_char;

/// Hooking module resolver for named hook targets.
pub type AddHookFn =
    unsafe extern "C" fn(kind: HookType, target: *const c_char, hook: *mut c_void, pid: c_uint) -> bool;

/// Host operations made available to a plugin.
///
/// Every slot is optional so that a zeroed table is a valid value; the host
/// fills all of them during load.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostInterface {
    /// The plugin's own id, to pass back on every call.
    pub pid: c_uint,
    pub add_console_command: Option<
        unsafe extern "C" fn(name: *const c_char, func: ConsoleCommandFn, pid: c_uint) -> bool,
    >,
    pub add_packet: Option<
        unsafe extern "C" fn(
            cmd: u16,
            length: c_int,
            receive: PacketReceiveFn,
            point: PacketHookPoint,
            pid: c_uint,
        ) -> bool,
    >,
    pub add_to_hpdata: Option<
        unsafe extern "C" fn(
            kind: HpDataType,
            pid: c_uint,
            object: *mut c_void,
            data: *mut c_void,
            tag: c_uint,
            auto_free: bool,
        ) -> bool,
    >,
    pub get_from_hpdata: Option<
        unsafe extern "C" fn(kind: HpDataType, pid: c_uint, object: *mut c_void, tag: c_uint) -> *mut c_void,
    >,
    pub remove_from_hpdata:
        Option<unsafe extern "C" fn(kind: HpDataType, pid: c_uint, object: *mut c_void, tag: c_uint)>,
    pub add_hook: Option<
        unsafe extern "C" fn(kind: HookType, target: *const c_char, hook: *mut c_void, pid: c_uint) -> bool,
    >,
    pub hook_stop: Option<unsafe extern "C" fn(func: *const c_char, pid: c_uint)>,
    pub hook_stopped: Option<unsafe extern "C" fn() -> bool>,
    pub add_arg: Option<
        unsafe extern "C" fn(
            pid: c_uint,
            name: *const c_char,
            has_param: bool,
            func: CmdlineExecFn,
            help: *const c_char,
        ) -> bool,
    >,
    pub add_conf: Option<
        unsafe extern "C" fn(
            pid: c_uint,
            category: ConfCategory,
            key: *const c_char,
            func: ConfListenerFn,
        ) -> bool,
    >,
    pub malloc:
        Option<unsafe extern "C" fn(size: usize, file: *const c_char, line: c_int) -> *mut c_void>,
    /// Zeroed allocation of `count * size` bytes; null on overflow.
    pub calloc: Option<
        unsafe extern "C" fn(count: usize, size: usize, file: *const c_char, line: c_int) -> *mut c_void,
    >,
    /// Resizes a block, retagging it with the new site. A null `ptr` allocates.
    pub realloc: Option<
        unsafe extern "C" fn(
            ptr: *mut c_void,
            size: usize,
            file: *const c_char,
            line: c_int,
        ) -> *mut c_void,
    >,
    /// Tracked copy of a null-terminated string, released with `free`.
    pub astrdup:
        Option<unsafe extern "C" fn(text: *const c_char, file: *const c_char, line: c_int) -> *mut c_char>,
    pub free: Option<unsafe extern "C" fn(ptr: *mut c_void)>,
}

impl HostInterface {
    /// A table with every slot empty.
    pub const EMPTY: Self = Self {
        pid: 0,
        add_console_command: None,
        add_packet: None,
        add_to_hpdata: None,
        get_from_hpdata: None,
        remove_from_hpdata: None,
        add_hook: None,
        hook_stop: None,
        hook_stopped: None,
        add_arg: None,
        add_conf: None,
        malloc: None,
        calloc: None,
        realloc: None,
        astrdup: None,
        free: None,
    };
}

impl Default for HostInterface {
    fn default() -> Self {
        Self::EMPTY
    }
}
