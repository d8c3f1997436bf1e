//! In-process plugin fixtures.
//!
//! Each fixture is a module of statics laid out exactly like the exports of
//! a plugin built with `hpm_plugin!`, served to the manager through a
//! `StaticModule`. Fixture statics are process-wide, so tests holding them
//! run one at a time (see [`serial`]).

#![allow(dead_code)]

use hpm_abi::{
    datacheck_entry, symbols, DataCheckEntry, EventKind, HookType, HostInterface, ImportSymbolFn,
    PacketHookPoint, PluginInfo, ServerType, DATACHECK_VERSION,
};
use plugin_system::{host, PluginManager, Session, StaticLoader, StaticModule};
use std::cell::{Cell, RefCell};
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::rc::Rc;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Mutex, MutexGuard};

static SERIAL: Mutex<()> = Mutex::new(());

pub fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

thread_local! {
    static EVENTS: RefCell<Vec<(&'static str, EventKind)>> = const { RefCell::new(Vec::new()) };
    static SEEN_PLUGINS: Cell<usize> = const { Cell::new(0) };
    static PACKETS: Cell<u32> = const { Cell::new(0) };
}

pub fn record(name: &'static str, kind: EventKind) {
    EVENTS.with(|events| events.borrow_mut().push((name, kind)));
}

/// Drains the events fired on this thread.
pub fn take_events() -> Vec<(&'static str, EventKind)> {
    EVENTS.with(|events| std::mem::take(&mut *events.borrow_mut()))
}

/// Plugins the reentrant fixture saw from inside its init event.
pub fn seen_plugins() -> usize {
    SEEN_PLUGINS.with(Cell::get)
}

pub fn packets_handled() -> u32 {
    PACKETS.with(Cell::get)
}

/// Installs a fresh map-server manager serving `loader`.
pub fn install(loader: StaticLoader) -> Rc<PluginManager> {
    host::uninstall();
    host::install(PluginManager::new(ServerType::MAP).with_loader(loader))
}

fn nothing() {}

macro_rules! fixture {
    (
        $module:ident,
        name: $name:literal,
        server_type: $server:expr,
        req_version: $req:literal,
        shared: [$($sym:literal),*],
        datacheck: [$($entry:expr),*],
        init: $init:path,
        extra: [$(($ename:expr, $eaddr:expr)),*]
    ) => {
        pub mod $module {
            use super::*;

            pub const NAME: &str = $name;

            static INFO: PluginInfo = PluginInfo {
                name: concat!($name, "\0").as_ptr() as *const c_char,
                server_type: $server,
                version: "1.0.0\0".as_ptr() as *const c_char,
                req_version: concat!($req, "\0").as_ptr() as *const c_char,
            };

            static mut IMPORT: Option<ImportSymbolFn> = None;
            static mut STORAGE: HostInterface = HostInterface::EMPTY;
            static mut INTERFACE: *mut HostInterface = std::ptr::null_mut();

            const DATACHECK: &[DataCheckEntry] = &[$($entry),*];
            static DATACHECK_LEN: c_uint = DATACHECK.len() as c_uint;
            static DATACHECK_VER: c_int = DATACHECK_VERSION;

            unsafe extern "C" fn preinit() {
                record(NAME, EventKind::PreInit);
            }
            unsafe extern "C" fn init() {
                record(NAME, EventKind::Init);
                $init();
            }
            unsafe extern "C" fn ready() {
                record(NAME, EventKind::Ready);
            }
            unsafe extern "C" fn final_() {
                record(NAME, EventKind::Final);
            }
            unsafe extern "C" fn post_final() {
                record(NAME, EventKind::PostFinal);
            }

            unsafe extern "C" fn shared_symbols(_server_type: ServerType) -> *const c_char {
                $(
                    let symbol = concat!($sym, "\0").as_ptr() as *const c_char;
                    let found = match *std::ptr::addr_of!(IMPORT) {
                        Some(import) => import(symbol, (*std::ptr::addr_of!(STORAGE)).pid),
                        None => std::ptr::null_mut(),
                    };
                    if found.is_null() {
                        return symbol;
                    }
                )*
                std::ptr::null()
            }

            /// The capability table as the host wired it.
            pub fn hpm() -> HostInterface {
                unsafe { *std::ptr::addr_of!(STORAGE) }
            }

            /// Where the plugin's interface pointer points.
            pub fn interface_ptr() -> *mut HostInterface {
                unsafe { *std::ptr::addr_of!(INTERFACE) }
            }

            pub fn storage_ptr() -> *mut HostInterface {
                unsafe { std::ptr::addr_of_mut!(STORAGE) }
            }

            pub fn import_slot() -> Option<ImportSymbolFn> {
                unsafe { *std::ptr::addr_of!(IMPORT) }
            }

            /// Export table with the given lifecycle events.
            pub fn module(events: &[EventKind]) -> StaticModule {
                let mut module = unsafe {
                    StaticModule::new()
                        .export(symbols::PLUGIN_INFO, &INFO as *const PluginInfo as *const c_void)
                        .export(symbols::IMPORT_SYMBOL, std::ptr::addr_of!(IMPORT) as *const c_void)
                        .export(symbols::INTERFACE, std::ptr::addr_of!(INTERFACE) as *const c_void)
                        .export(symbols::INTERFACE_STORAGE, std::ptr::addr_of!(STORAGE) as *const c_void)
                        .export(symbols::SHARED_SYMBOLS, shared_symbols as *const c_void)
                        .export(symbols::DATACHECK, DATACHECK.as_ptr() as *const c_void)
                        .export(symbols::DATACHECK_LEN, &DATACHECK_LEN as *const c_uint as *const c_void)
                        .export(symbols::DATACHECK_VER, &DATACHECK_VER as *const c_int as *const c_void)
                };
                for kind in events {
                    let address = match kind {
                        EventKind::PreInit => preinit as *const c_void,
                        EventKind::Init => init as *const c_void,
                        EventKind::Ready => ready as *const c_void,
                        EventKind::Final => final_ as *const c_void,
                        EventKind::PostFinal => post_final as *const c_void,
                    };
                    module = module.export(kind.export_name(), address);
                }
                $(module = module.export($ename, $eaddr);)*
                module
            }

            /// Export table with every lifecycle event.
            pub fn full() -> StaticModule {
                module(&EventKind::ALL)
            }
        }
    };
}

fixture!(
    sample,
    name: "sample",
    server_type: ServerType::ALL,
    req_version: "1.2",
    shared: ["server_name"],
    datacheck: [datacheck_entry!(Session, ServerType::ALL)],
    init: nothing,
    extra: []
);

fixture!(
    extra,
    name: "extra",
    server_type: ServerType::MAP,
    req_version: "1.0",
    shared: [],
    datacheck: [],
    init: nothing,
    extra: []
);

fixture!(
    stale,
    name: "stale",
    server_type: ServerType::ALL,
    req_version: "1.2",
    shared: [],
    datacheck: [DataCheckEntry {
        name: "Session\0".as_ptr() as *const c_char,
        size: 1,
        server_type: ServerType::ALL,
    }],
    init: nothing,
    extra: []
);

fixture!(
    future,
    name: "future",
    server_type: ServerType::ALL,
    req_version: "2.0",
    shared: [],
    datacheck: [],
    init: nothing,
    extra: []
);

fixture!(
    login_only,
    name: "login_only",
    server_type: ServerType::LOGIN,
    req_version: "1.2",
    shared: [],
    datacheck: [],
    init: nothing,
    extra: []
);

fixture!(
    needy,
    name: "needy",
    server_type: ServerType::ALL,
    req_version: "1.2",
    shared: ["missing_symbol"],
    datacheck: [],
    init: nothing,
    extra: []
);

fixture!(
    reentrant,
    name: "reentrant",
    server_type: ServerType::MAP,
    req_version: "1.2",
    shared: [],
    datacheck: [],
    init: reentrant_init,
    extra: []
);

fixture!(
    hooking,
    name: "HPMHooking",
    server_type: ServerType::ALL,
    req_version: "1.2",
    shared: [],
    datacheck: [],
    init: nothing,
    extra: [
        (symbols::HOOKED, hooked as *const c_void),
        (symbols::ADD_HOOK, add_hook_sub as *const c_void)
    ]
);

unsafe extern "C" fn on_packet(_fd: c_int) {
    PACKETS.with(|count| count.set(count.get() + 1));
}

/// Calls back into the manager while the init event is being dispatched.
fn reentrant_init() {
    if let Some(manager) = host::current() {
        SEEN_PLUGINS.with(|seen| seen.set(manager.list_plugins().len()));
    }
    let table = reentrant::hpm();
    if let Some(add_packet) = table.add_packet {
        unsafe { add_packet(0x0abc, 2, on_packet, PacketHookPoint::CLIF_PARSE, table.pid) };
    }
}

// ============================================================================
// Hooking module exports
// ============================================================================

static FORCE_RETURN: AtomicPtr<bool> = AtomicPtr::new(std::ptr::null_mut());

/// Propagation flag address the host handed to the hooking fixture.
pub fn force_return() -> *mut bool {
    FORCE_RETURN.load(Ordering::SeqCst)
}

pub const HOOKABLE: &str = "clif->pLoadEndAck";

unsafe extern "C" fn hooked(force_return: *mut bool) -> *const c_char {
    FORCE_RETURN.store(force_return, Ordering::SeqCst);
    std::ptr::null()
}

unsafe extern "C" fn add_hook_sub(
    _kind: HookType,
    target: *const c_char,
    _hook: *mut c_void,
    _pid: c_uint,
) -> bool {
    CStr::from_ptr(target).to_bytes() == HOOKABLE.as_bytes()
}
