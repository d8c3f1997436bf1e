//! The process-wide manager and the C entry points plugins call.
//!
//! Plugins reach the host only through the function pointers written into
//! their capability table. Those functions carry no context, so they find
//! the manager through a thread-local installed by the thread that drives
//! the main loop. With no manager installed every entry point reports
//! failure (or falls back to the C allocator) instead of panicking.

use crate::manager::{c_string, PluginManager};
use hpm_abi::{
    CmdlineExecFn, ConfCategory, ConfListenerFn, ConsoleCommandFn, HookType, HostInterface,
    HpDataType, PacketHookPoint, PacketReceiveFn,
};
use std::cell::RefCell;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::rc::Rc;

thread_local! {
    static INSTANCE: RefCell<Option<Rc<PluginManager>>> = const { RefCell::new(None) };
}

/// Makes `manager` the instance plugins on this thread talk to.
pub fn install(manager: PluginManager) -> Rc<PluginManager> {
    let manager = Rc::new(manager);
    INSTANCE.with(|instance| *instance.borrow_mut() = Some(manager.clone()));
    manager
}

/// The installed manager, if any.
pub fn current() -> Option<Rc<PluginManager>> {
    INSTANCE
        .try_with(|instance| instance.borrow().clone())
        .ok()
        .flatten()
}

/// Removes the installed manager and hands it back.
pub fn uninstall() -> Option<Rc<PluginManager>> {
    INSTANCE
        .try_with(|instance| instance.borrow_mut().take())
        .ok()
        .flatten()
}

/// Capability table for plugin `pid`.
pub fn capabilities(pid: c_uint) -> HostInterface {
    HostInterface {
        pid,
        add_console_command: Some(add_console_command),
        add_packet: Some(add_packet),
        add_to_hpdata: Some(add_to_hpdata),
        get_from_hpdata: Some(get_from_hpdata),
        remove_from_hpdata: Some(remove_from_hpdata),
        add_hook: Some(add_hook),
        hook_stop: Some(hook_stop),
        hook_stopped: Some(hook_stopped),
        add_arg: Some(add_arg),
        add_conf: Some(add_conf),
        malloc: Some(malloc),
        calloc: Some(calloc),
        realloc: Some(realloc),
        astrdup: Some(astrdup),
        free: Some(free),
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Written into every plugin's import slot.
pub unsafe extern "C" fn import_symbol(name: *const c_char, pid: c_uint) -> *mut c_void {
    let (Some(manager), Some(name)) = (current(), c_string(name)) else {
        return std::ptr::null_mut();
    };
    manager.import_symbol(&name, pid)
}

unsafe extern "C" fn add_console_command(name: *const c_char, func: ConsoleCommandFn, pid: c_uint) -> bool {
    match (current(), c_string(name)) {
        (Some(manager), Some(name)) => manager.add_console_command(&name, func, pid),
        _ => false,
    }
}

unsafe extern "C" fn add_packet(
    cmd: u16,
    length: c_int,
    receive: PacketReceiveFn,
    point: PacketHookPoint,
    pid: c_uint,
) -> bool {
    current().is_some_and(|manager| manager.add_packet(cmd, length, receive, point, pid))
}

unsafe extern "C" fn add_to_hpdata(
    kind: HpDataType,
    pid: c_uint,
    object: *mut c_void,
    data: *mut c_void,
    tag: c_uint,
    auto_free: bool,
) -> bool {
    current().is_some_and(|manager| manager.add_to_hpdata(kind, pid, object, data, tag, auto_free))
}

unsafe extern "C" fn get_from_hpdata(
    kind: HpDataType,
    pid: c_uint,
    object: *mut c_void,
    tag: c_uint,
) -> *mut c_void {
    current().map_or(std::ptr::null_mut(), |manager| {
        manager.get_from_hpdata(kind, pid, object, tag)
    })
}

unsafe extern "C" fn remove_from_hpdata(kind: HpDataType, pid: c_uint, object: *mut c_void, tag: c_uint) {
    if let Some(manager) = current() {
        manager.remove_from_hpdata(kind, pid, object, tag);
    }
}

unsafe extern "C" fn add_hook(kind: HookType, target: *const c_char, hook: *mut c_void, pid: c_uint) -> bool {
    if target.is_null() {
        return false;
    }
    current().is_some_and(|manager| manager.add_hook(kind, CStr::from_ptr(target), hook, pid))
}

unsafe extern "C" fn hook_stop(func: *const c_char, pid: c_uint) {
    if let Some(manager) = current() {
        manager.hook_stop(&c_string(func).unwrap_or_default(), pid);
    }
}

unsafe extern "C" fn hook_stopped() -> bool {
    current().is_some_and(|manager| manager.hook_stopped())
}

unsafe extern "C" fn add_arg(
    pid: c_uint,
    name: *const c_char,
    has_param: bool,
    func: CmdlineExecFn,
    help: *const c_char,
) -> bool {
    match (current(), c_string(name)) {
        (Some(manager), Some(name)) => {
            manager.add_arg(pid, &name, has_param, func, &c_string(help).unwrap_or_default())
        }
        _ => false,
    }
}

unsafe extern "C" fn add_conf(pid: c_uint, category: ConfCategory, key: *const c_char, func: ConfListenerFn) -> bool {
    match (current(), c_string(key)) {
        (Some(manager), Some(key)) => manager.add_conf(pid, category, &key, func),
        _ => false,
    }
}

unsafe extern "C" fn malloc(size: usize, file: *const c_char, line: c_int) -> *mut c_void {
    match current() {
        Some(manager) => manager.memory().malloc(size, file, line),
        None => libc::malloc(size.max(1)),
    }
}

unsafe extern "C" fn calloc(count: usize, size: usize, file: *const c_char, line: c_int) -> *mut c_void {
    match current() {
        Some(manager) => manager.memory().calloc(count, size, file, line),
        None => libc::calloc(count.max(1), size.max(1)),
    }
}

unsafe extern "C" fn realloc(ptr: *mut c_void, size: usize, file: *const c_char, line: c_int) -> *mut c_void {
    match current() {
        Some(manager) => manager.memory().realloc(ptr, size, file, line),
        None => libc::realloc(ptr, size.max(1)),
    }
}

unsafe extern "C" fn astrdup(text: *const c_char, file: *const c_char, line: c_int) -> *mut c_char {
    match current() {
        Some(manager) => manager.memory().strdup(text, file, line),
        None if text.is_null() => std::ptr::null_mut(),
        None => libc::strdup(text),
    }
}

unsafe extern "C" fn free(ptr: *mut c_void) {
    crate::memory::release(ptr);
}
