//! Plugin lifecycle manager.
//!
//! Owns every registry and the loaded plugins. Loading a module walks the
//! module contract in a fixed order: metadata, role filter, version check,
//! import slot and capability table, lifecycle entry points, symbol
//! negotiation, DataCheck, capability wiring and finally the host-specific
//! wiring step. A failure at any step after the role filter is fatal for the
//! process; it is reported as a [`LoadError`] so the caller can apply that
//! policy (see [`crate::fatal`]).
//!
//! All state sits behind `RefCell`/`Cell` and no borrow is held while plugin
//! code runs, so plugins may call back into the manager from any callback.

use crate::cmdline::CmdlineArgs;
use crate::conf::ConfListeners;
use crate::config::{PluginsConf, PluginsConfPaths};
use crate::console::{split_command, ConsoleCommands, PLUGINS_COMMAND};
use crate::datacheck::DataCheckRegistry;
use crate::error::{fatal, LoadError};
use crate::hooks::FunctionHooks;
use crate::host;
use crate::hpdata::{HpDataAccessor, HpDataSlots};
use crate::memory::AllocationTracker;
use crate::module::{import_data, import_fn, DynamicLibraryLoader, ModuleLoader, NativeModule};
use crate::packets::{PacketBuffer, PacketHooks, PacketParse};
use crate::symbols::SymbolRegistry;
use hpm_abi::{
    symbols, AddHookFn, CmdlineExecFn, ConfCategory, ConfListenerFn, ConsoleCommandFn,
    DataCheckEntry, EventFn, EventKind, HookType, HookedFn, HostInterface, HpDataType,
    ImportSymbolFn, PacketHookPoint, PacketReceiveFn, PluginInfo, ServerType, SharedSymbolsFn,
    HPM_PID_CORE, HPM_VERSION,
};
use std::cell::{Cell, RefCell};
use std::ffi::CStr;
use std::fmt;
use std::os::raw::{c_int, c_uint, c_void};
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

/// Name of the hooking module, loaded before every other plugin.
pub const HOOKING_PLUGIN: &str = "HPMHooking";

/// Host-specific wiring step, run last while loading each plugin.
pub type LoadSub = dyn Fn(c_uint, &dyn NativeModule) -> Result<(), String>;

// ============================================================================
// Version negotiation
// ============================================================================

/// A "major.minor" API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostVersion {
    pub major: u32,
    pub minor: u32,
}

fn leading_number(text: &str) -> (Option<u32>, &str) {
    let text = text.trim_start();
    let end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    if end == 0 {
        return (None, text);
    }
    (text[..end].parse().ok(), &text[end..])
}

impl HostVersion {
    /// Parses leniently: missing or non-numeric parts read as 0.
    pub fn parse(version: &str) -> Self {
        let (major, rest) = leading_number(version);
        let Some(major) = major else {
            return Self::default();
        };
        let minor = rest
            .strip_prefix('.')
            .and_then(|rest| leading_number(rest).0)
            .unwrap_or(0);
        Self { major, minor }
    }

    /// The API version this host implements.
    pub fn current() -> Self {
        Self::parse(HPM_VERSION)
    }

    /// Whether a plugin requiring `required` can run on this version: same
    /// major, required minor not newer.
    pub fn accepts(&self, required: &str) -> bool {
        let required = Self::parse(required);
        required.major == self.major && required.minor <= self.minor
    }
}

impl fmt::Display for HostVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// ============================================================================
// Plugin records
// ============================================================================

struct PluginRecord {
    idx: c_uint,
    filename: PathBuf,
    name: String,
    version: String,
    server_type: ServerType,
    events: [Option<EventFn>; EventKind::COUNT],
    /// The module's own capability table storage.
    interface: Option<NonNull<HostInterface>>,
    /// Dropped last; closing it invalidates everything above.
    module: Option<Box<dyn NativeModule>>,
}

impl PluginRecord {
    fn new(idx: c_uint) -> Self {
        Self {
            idx,
            filename: PathBuf::new(),
            name: String::new(),
            version: String::new(),
            server_type: ServerType::NONE,
            events: [None; EventKind::COUNT],
            interface: None,
            module: None,
        }
    }
}

/// A loaded plugin as reported by [`PluginManager::list_plugins`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSummary {
    pub idx: c_uint,
    pub name: String,
    pub version: String,
    pub filename: PathBuf,
    pub server_type: ServerType,
}

/// Reads a C string a module handed over. Null yields `None`.
///
/// # Safety
/// `ptr` must be null or point to a null-terminated string.
pub(crate) unsafe fn c_string(ptr: *const std::os::raw::c_char) -> Option<String> {
    (!ptr.is_null()).then(|| CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

// ============================================================================
// Plugin Manager
// ============================================================================

/// Loads native plugins and brokers every extension mechanism between them
/// and the host.
pub struct PluginManager {
    server_type: ServerType,
    version: HostVersion,
    plugin_dir: PathBuf,
    conf_paths: PluginsConfPaths,
    loader: Box<dyn ModuleLoader>,
    plugins: RefCell<Vec<PluginRecord>>,
    next_idx: Cell<c_uint>,
    load_sub: RefCell<Option<Rc<LoadSub>>>,
    datacheck: RefCell<Option<DataCheckRegistry>>,
    symbols: SymbolRegistry,
    packets: PacketHooks,
    hooks: FunctionHooks,
    hpdata: HpDataSlots,
    conf: ConfListeners,
    cmdline: CmdlineArgs,
    console: ConsoleCommands,
    memory: AllocationTracker,
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("server_type", &self.server_type)
            .field("version", &self.version)
            .field("plugin_dir", &self.plugin_dir)
            .field("plugins", &self.len())
            .finish_non_exhaustive()
    }
}

impl PluginManager {
    /// Creates a manager for a host running as `server_type`.
    ///
    /// Modules are opened from `plugins/` with the platform loader until
    /// configured otherwise.
    pub fn new(server_type: ServerType) -> Self {
        Self {
            server_type,
            version: HostVersion::current(),
            plugin_dir: PathBuf::from("plugins"),
            conf_paths: PluginsConfPaths::default(),
            loader: Box::new(DynamicLibraryLoader),
            plugins: RefCell::new(Vec::new()),
            next_idx: Cell::new(0),
            load_sub: RefCell::new(None),
            datacheck: RefCell::new(None),
            symbols: SymbolRegistry::new(),
            packets: PacketHooks::new(),
            hooks: FunctionHooks::new(),
            hpdata: HpDataSlots::new(),
            conf: ConfListeners::new(),
            cmdline: CmdlineArgs::new(),
            console: ConsoleCommands::new(),
            memory: AllocationTracker::new(),
        }
    }

    pub fn with_loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn with_plugin_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plugin_dir = dir.into();
        self
    }

    pub fn with_conf_paths(mut self, paths: PluginsConfPaths) -> Self {
        self.conf_paths = paths;
        self
    }

    pub fn with_version(mut self, version: HostVersion) -> Self {
        self.version = version;
        self
    }

    pub fn server_type(&self) -> ServerType {
        self.server_type
    }

    pub fn version(&self) -> HostVersion {
        self.version
    }

    pub fn symbols(&self) -> &SymbolRegistry {
        &self.symbols
    }

    pub fn packets(&self) -> &PacketHooks {
        &self.packets
    }

    pub fn hooks(&self) -> &FunctionHooks {
        &self.hooks
    }

    pub fn hpdata(&self) -> &HpDataSlots {
        &self.hpdata
    }

    pub fn conf(&self) -> &ConfListeners {
        &self.conf
    }

    pub fn cmdline(&self) -> &CmdlineArgs {
        &self.cmdline
    }

    pub fn console(&self) -> &ConsoleCommands {
        &self.console
    }

    pub fn memory(&self) -> &AllocationTracker {
        &self.memory
    }

    /// Installs the host-specific wiring step.
    pub fn set_load_sub(&self, load_sub: Rc<LoadSub>) {
        *self.load_sub.borrow_mut() = Some(load_sub);
    }

    /// Installs the accessor for HPData kinds other than sessions.
    pub fn set_hpdata_accessor(&self, accessor: Rc<HpDataAccessor>) {
        self.hpdata.set_accessor(accessor);
    }

    // ------------------------------------------------------------------------
    // Plugin records
    // ------------------------------------------------------------------------

    /// Registers an empty plugin record and returns its id.
    pub fn create(&self) -> c_uint {
        let idx = self.next_idx.get();
        self.next_idx.set(idx + 1);
        self.plugins.borrow_mut().push(PluginRecord::new(idx));
        idx
    }

    fn update(&self, idx: c_uint, f: impl FnOnce(&mut PluginRecord)) {
        if let Some(record) = self
            .plugins
            .borrow_mut()
            .iter_mut()
            .find(|record| record.idx == idx)
        {
            f(record);
        }
    }

    /// Number of plugin records.
    pub fn len(&self) -> usize {
        self.plugins.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.borrow().is_empty()
    }

    /// Whether a plugin was loaded from `filename` (compared case-insensitively).
    pub fn exists(&self, filename: impl AsRef<Path>) -> bool {
        let filename = filename.as_ref().to_string_lossy();
        self.plugins
            .borrow()
            .iter()
            .any(|record| record.filename.to_string_lossy().eq_ignore_ascii_case(&filename))
    }

    /// Display name for a plugin id.
    pub fn pid2name(&self, pid: c_uint) -> String {
        if pid == HPM_PID_CORE {
            return "core".to_string();
        }
        self.plugins
            .borrow()
            .iter()
            .find(|record| record.idx == pid)
            .map(|record| record.name.clone())
            .unwrap_or_else(|| "UnknownPlugin".to_string())
    }

    /// Whether a plugin requiring API `version` can be loaded.
    pub fn is_compatible(&self, version: &str) -> bool {
        self.version.accepts(version)
    }

    pub fn list_plugins(&self) -> Vec<PluginSummary> {
        self.plugins
            .borrow()
            .iter()
            .filter(|record| record.module.is_some())
            .map(|record| PluginSummary {
                idx: record.idx,
                name: record.name.clone(),
                version: record.version.clone(),
                filename: record.filename.clone(),
                server_type: record.server_type,
            })
            .collect()
    }

    /// Capability table the plugin was wired with.
    pub fn interface(&self, idx: c_uint) -> Option<HostInterface> {
        self.plugins
            .borrow()
            .iter()
            .find(|record| record.idx == idx)
            .and_then(|record| record.interface)
            .map(|interface| unsafe { *interface.as_ptr() })
    }

    // ------------------------------------------------------------------------
    // Load / unload
    // ------------------------------------------------------------------------

    /// Loads the module at `path`.
    ///
    /// Returns `Ok(None)` when the module is already loaded or does not
    /// apply to the running server role.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Option<c_uint>, LoadError> {
        let path = path.as_ref();
        if self.exists(path) {
            warn!(
                "HPM:plugin_load: attempting to load duplicate '{}', skipping...",
                path.display()
            );
            return Ok(None);
        }

        let idx = self.create();
        match self.load_into(idx, path) {
            Ok(true) => Ok(Some(idx)),
            Ok(false) => {
                self.unload(idx);
                Ok(None)
            }
            Err(err) => {
                self.unload(idx);
                Err(err)
            }
        }
    }

    fn load_into(&self, idx: c_uint, path: &Path) -> Result<bool, LoadError> {
        let missing = |symbol: &'static str| LoadError::MissingExport {
            path: path.to_path_buf(),
            symbol,
        };

        let module = self.loader.open(path).map_err(|reason| LoadError::Open {
            path: path.to_path_buf(),
            reason,
        })?;

        let info = import_data::<PluginInfo>(module.as_ref(), symbols::PLUGIN_INFO)
            .ok_or_else(|| missing(symbols::PLUGIN_INFO))?;
        let info = unsafe { info.as_ref() };

        if !info.server_type.intersects(self.server_type) {
            debug!(
                "HPM:plugin_load: '{}' does not apply to this server, skipping",
                path.display()
            );
            return Ok(false);
        }

        let required = unsafe { c_string(info.req_version) };
        if !required.as_deref().is_some_and(|required| self.is_compatible(required)) {
            return Err(LoadError::IncompatibleVersion {
                path: path.to_path_buf(),
                required: required.unwrap_or_default(),
                host: self.version.to_string(),
            });
        }

        let name = unsafe { c_string(info.name) }.unwrap_or_default();
        let version = unsafe { c_string(info.version) }.unwrap_or_default();
        let server_type = info.server_type;
        self.update(idx, |record| {
            record.filename = path.to_path_buf();
            record.name = name.clone();
            record.version = version.clone();
            record.server_type = server_type;
        });

        let import_slot = import_data::<Option<ImportSymbolFn>>(module.as_ref(), symbols::IMPORT_SYMBOL)
            .ok_or_else(|| missing(symbols::IMPORT_SYMBOL))?;
        unsafe { import_slot.as_ptr().write(Some(host::import_symbol)) };

        let interface = import_data::<*mut HostInterface>(module.as_ref(), symbols::INTERFACE)
            .ok_or_else(|| missing(symbols::INTERFACE))?;
        let storage = import_data::<HostInterface>(module.as_ref(), symbols::INTERFACE_STORAGE)
            .ok_or_else(|| missing(symbols::INTERFACE_STORAGE))?;
        unsafe {
            interface.as_ptr().write(storage.as_ptr());
            // Symbol negotiation below already identifies itself by id.
            (*storage.as_ptr()).pid = idx;
        }

        let mut events = [None; EventKind::COUNT];
        for kind in EventKind::ALL {
            events[kind.index()] = unsafe { import_fn::<EventFn>(module.as_ref(), kind.export_name()) };
        }
        if events.iter().all(Option::is_none) {
            return Err(LoadError::NoEvents {
                path: path.to_path_buf(),
            });
        }

        let shared_symbols = unsafe { import_fn::<SharedSymbolsFn>(module.as_ref(), symbols::SHARED_SYMBOLS) }
            .ok_or_else(|| missing(symbols::SHARED_SYMBOLS))?;
        let failure = unsafe { shared_symbols(self.server_type) };
        if let Some(symbol) = unsafe { c_string(failure) } {
            return Err(LoadError::SharedSymbol {
                path: path.to_path_buf(),
                symbol,
            });
        }

        let datacheck_len = import_data::<c_uint>(module.as_ref(), symbols::DATACHECK_LEN)
            .ok_or_else(|| missing(symbols::DATACHECK_LEN))?;
        let datacheck_ver = import_data::<c_int>(module.as_ref(), symbols::DATACHECK_VER)
            .ok_or_else(|| missing(symbols::DATACHECK_VER))?;
        let datacheck = import_data::<DataCheckEntry>(module.as_ref(), symbols::DATACHECK)
            .ok_or_else(|| missing(symbols::DATACHECK))?;

        if let Some(registry) = self.datacheck.borrow().as_ref() {
            let result = unsafe {
                let entries = std::slice::from_raw_parts(datacheck.as_ptr(), *datacheck_len.as_ptr() as usize);
                registry.validate(entries, *datacheck_ver.as_ptr(), &name)
            };
            result.map_err(|source| LoadError::DataCheck {
                path: path.to_path_buf(),
                source,
            })?;
        }

        unsafe { storage.as_ptr().write(host::capabilities(idx)) };

        let load_sub = self.load_sub.borrow().clone();
        if let Some(load_sub) = load_sub {
            load_sub(idx, module.as_ref()).map_err(|reason| LoadError::Wiring {
                path: path.to_path_buf(),
                reason,
            })?;
        }

        self.update(idx, move |record| {
            record.events = events;
            record.interface = Some(storage);
            record.module = Some(module);
        });

        info!("HPM: Loaded plugin '{}' ({}).", name, version);
        Ok(true)
    }

    /// Unloads plugin `idx`, closing its module. Unknown ids yield `false`.
    pub fn unload(&self, idx: c_uint) -> bool {
        let record = {
            let mut plugins = self.plugins.borrow_mut();
            let Some(pos) = plugins.iter().position(|record| record.idx == idx) else {
                return false;
            };
            plugins.remove(pos)
        };
        debug!("HPM: unloading plugin {} '{}'", idx, record.name);
        drop(record);
        true
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    /// Fires `kind` on every plugin that exported it, in load order.
    pub fn event(&self, kind: EventKind) {
        let handlers = self.event_handlers(kind);
        for handler in handlers {
            unsafe { handler() };
        }
    }

    /// Handlers `event(kind)` would run, in order.
    pub fn event_handlers(&self, kind: EventKind) -> Vec<EventFn> {
        self.plugins
            .borrow()
            .iter()
            .filter_map(|record| record.events[kind.index()])
            .collect()
    }

    // ------------------------------------------------------------------------
    // Bulk load
    // ------------------------------------------------------------------------

    fn module_path(&self, name: &str) -> PathBuf {
        self.plugin_dir
            .join(format!("{}{}", name, std::env::consts::DLL_SUFFIX))
    }

    /// Reads the plugin list and loads every plugin, exiting the process on
    /// a fatal load error.
    pub fn config_read(&self) -> usize {
        self.try_config_read().unwrap_or_else(|err| fatal(&err))
    }

    /// Reads the plugin list and loads every plugin, hooking module first.
    ///
    /// An unreadable list is logged and loads nothing. Returns the number
    /// of loaded plugins.
    pub fn try_config_read(&self) -> Result<usize, LoadError> {
        let mut list = match PluginsConf::load(&self.conf_paths) {
            Ok(conf) => conf.plugins_list,
            Err(err) => {
                error!("HPM: {}", err);
                return Ok(self.len());
            }
        };
        list.extend(self.cmdline.plugins());

        let hooking_name = format!("{}{}", HOOKING_PLUGIN, self.server_type.suffix());
        if list.iter().any(|name| {
            name.eq_ignore_ascii_case(HOOKING_PLUGIN) || name.eq_ignore_ascii_case(&hooking_name)
        }) {
            if let Some(idx) = self.load(self.module_path(&hooking_name))? {
                self.install_hooking(idx, &hooking_name);
            }
        }

        for name in &list {
            let is_hooking = name
                .get(..HOOKING_PLUGIN.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(HOOKING_PLUGIN));
            if is_hooking {
                continue;
            }
            self.load(self.module_path(name))?;
        }

        let loaded = self.list_plugins().len();
        if loaded > 0 {
            info!(
                "HPM: There are '{}' plugins loaded, type '{}' to list them",
                loaded, PLUGINS_COMMAND
            );
        }
        Ok(loaded)
    }

    /// Hands the propagation flag to the hooking module and enables hooking
    /// if it resolves everything it needs.
    fn install_hooking(&self, idx: c_uint, name: &str) {
        let exports = {
            let plugins = self.plugins.borrow();
            plugins
                .iter()
                .find(|record| record.idx == idx)
                .and_then(|record| record.module.as_deref())
                .and_then(|module| unsafe {
                    let hooked = import_fn::<HookedFn>(module, symbols::HOOKED)?;
                    let add_hook = import_fn::<AddHookFn>(module, symbols::ADD_HOOK)?;
                    Some((hooked, add_hook))
                })
        };
        let Some((hooked, add_hook)) = exports else {
            warn!("HPM: '{}' does not export the hooking interface", name);
            return;
        };

        let failed = unsafe { hooked(self.hooks.flag_ptr()) };
        match unsafe { c_string(failed) } {
            Some(symbol) => error!("HPM: failed to retrieve '{}' for '{}'!", symbol, name),
            None => {
                self.hooks.install(add_hook);
                info!("HPM: function hooking enabled by '{}'", name);
            }
        }
    }

    // ------------------------------------------------------------------------
    // DataCheck
    // ------------------------------------------------------------------------

    /// Installs the host's struct layout table.
    ///
    /// # Safety
    /// Every entry's `name` must be null or point to a null-terminated string.
    pub unsafe fn datacheck_init(&self, table: &[DataCheckEntry], version: c_int) {
        let registry = DataCheckRegistry::new(table, version, self.server_type);
        debug!("HPM: DataCheck registry holds {} structs", registry.len());
        *self.datacheck.borrow_mut() = Some(registry);
    }

    pub fn datacheck_final(&self) {
        self.datacheck.borrow_mut().take();
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Unloads every plugin (last loaded first) and empties the registries.
    pub fn shutdown(&self) {
        loop {
            let last = self.plugins.borrow().last().map(|record| record.idx);
            match last {
                Some(idx) => {
                    self.unload(idx);
                }
                None => break,
            }
        }

        self.symbols.clear();
        self.packets.clear();
        self.conf.clear();
        self.cmdline.clear();
        self.console.clear();
        self.hooks.disable();
    }

    /// Releases the retained file tags. Runs after leak reporting.
    pub fn memdown(&self) {
        self.memory.memdown();
    }

    // ------------------------------------------------------------------------
    // Symbols
    // ------------------------------------------------------------------------

    pub fn share(&self, value: *mut c_void, name: &str) {
        self.symbols.share(value, name);
    }

    /// Looks up a shared symbol on behalf of `pid`. Null when absent.
    pub fn import_symbol(&self, name: &str, pid: c_uint) -> *mut c_void {
        let requester = self.pid2name(pid);
        self.symbols
            .import(name, &requester)
            .map_or(std::ptr::null_mut(), NonNull::as_ptr)
    }

    // ------------------------------------------------------------------------
    // Packets
    // ------------------------------------------------------------------------

    pub fn add_packet(
        &self,
        cmd: u16,
        length: c_int,
        receive: PacketReceiveFn,
        point: PacketHookPoint,
        pid: c_uint,
    ) -> bool {
        match self.packets.add_packet(cmd, length, receive, point, pid) {
            Ok(()) => true,
            Err(crate::RegistryError::DuplicatePacket { cmd, owner }) => {
                error!(
                    "HPM->addPacket:{}: can't take packet 0x{:04x}, already in use by '{}'!",
                    self.pid2name(pid),
                    cmd,
                    self.pid2name(owner)
                );
                false
            }
            Err(err) => {
                error!("HPM->addPacket:{}: {} (packet 0x{:04x})", self.pid2name(pid), err, cmd);
                false
            }
        }
    }

    /// Offers the next packet in `buffer` to the plugins.
    pub fn parse_packets<B: PacketBuffer + ?Sized>(&self, buffer: &mut B, point: PacketHookPoint) -> PacketParse {
        self.packets.parse(buffer, point)
    }

    // ------------------------------------------------------------------------
    // HPData
    // ------------------------------------------------------------------------

    /// # Safety
    /// `object` must be a live object of kind `kind` (see [`HpDataSlots::grab`]).
    pub unsafe fn add_to_hpdata(
        &self,
        kind: HpDataType,
        pid: c_uint,
        object: *mut c_void,
        data: *mut c_void,
        tag: c_uint,
        auto_free: bool,
    ) -> bool {
        match self.hpdata.attach(kind, pid, object, data, tag, auto_free) {
            Ok(()) => true,
            Err(err) => {
                error!("HPM:addToHPData:{}: {} ({}|{})", self.pid2name(pid), err, pid, tag);
                false
            }
        }
    }

    /// # Safety
    /// See [`PluginManager::add_to_hpdata`].
    pub unsafe fn get_from_hpdata(
        &self,
        kind: HpDataType,
        pid: c_uint,
        object: *mut c_void,
        tag: c_uint,
    ) -> *mut c_void {
        match self.hpdata.get(kind, pid, object, tag) {
            Ok(data) => data.map_or(std::ptr::null_mut(), NonNull::as_ptr),
            Err(err) => {
                error!("HPM:getFromHPData:{}: {} ({}|{})", self.pid2name(pid), err, pid, tag);
                std::ptr::null_mut()
            }
        }
    }

    /// # Safety
    /// See [`PluginManager::add_to_hpdata`].
    pub unsafe fn remove_from_hpdata(&self, kind: HpDataType, pid: c_uint, object: *mut c_void, tag: c_uint) {
        if let Err(err) = self.hpdata.remove(kind, pid, object, tag) {
            error!("HPM:removeFromHPData:{}: {} ({}|{})", self.pid2name(pid), err, pid, tag);
        }
    }

    // ------------------------------------------------------------------------
    // Function hooks
    // ------------------------------------------------------------------------

    /// # Safety
    /// See [`FunctionHooks::add_hook`].
    pub unsafe fn add_hook(&self, kind: HookType, target: &CStr, hook: *mut c_void, pid: c_uint) -> bool {
        match self.hooks.add_hook(kind, target, hook, pid) {
            Ok(()) => true,
            Err(crate::RegistryError::HookingDisabled) => {
                error!(
                    "HPM:AddHook Fail! '{}' tried to hook to '{}' but {} is disabled!",
                    self.pid2name(pid),
                    target.to_string_lossy(),
                    HOOKING_PLUGIN
                );
                false
            }
            Err(err) => {
                error!("HPM:AddHook:{}: {}", self.pid2name(pid), err);
                false
            }
        }
    }

    /// A pre-hook of `func` asks to skip the original function.
    pub fn hook_stop(&self, func: &str, pid: c_uint) {
        debug!("HPM: '{}' stopped propagation of '{}'", self.pid2name(pid), func);
        self.hooks.stop_propagation();
    }

    pub fn hook_stopped(&self) -> bool {
        self.hooks.is_propagation_stopped()
    }

    // ------------------------------------------------------------------------
    // Configuration listeners
    // ------------------------------------------------------------------------

    pub fn add_conf(&self, pid: c_uint, category: ConfCategory, key: &str, func: ConfListenerFn) -> bool {
        match self.conf.add_listener(category, key, func, pid) {
            Ok(()) => true,
            Err(crate::RegistryError::DuplicateConf { key, owner }) => {
                error!(
                    "HPM->addConf:{}: duplicate '{}', already in use by '{}'!",
                    self.pid2name(pid),
                    key,
                    self.pid2name(owner)
                );
                false
            }
            Err(err) => {
                error!("HPM->addConf:{}: {} for config '{}'", self.pid2name(pid), err, key);
                false
            }
        }
    }

    /// Offers a configuration key to the plugins. `false` means unclaimed.
    pub fn parse_conf(&self, key: &str, value: &CStr, category: ConfCategory) -> bool {
        self.conf.dispatch(key, value, category)
    }

    // ------------------------------------------------------------------------
    // Command line and console
    // ------------------------------------------------------------------------

    pub fn add_arg(&self, pid: c_uint, name: &str, has_param: bool, func: CmdlineExecFn, help: &str) -> bool {
        match self.cmdline.add_arg(pid, name, has_param, func, help) {
            Ok(()) => true,
            Err(err) => {
                error!("HPM:add_arg:{}: {} (from {})", name, err, self.pid2name(pid));
                false
            }
        }
    }

    pub fn add_console_command(&self, name: &str, func: ConsoleCommandFn, pid: c_uint) -> bool {
        match self.console.add_command(name, func, pid) {
            Ok(()) => true,
            Err(err) => {
                error!("HPM:addCPCommand:{}: {}", self.pid2name(pid), err);
                false
            }
        }
    }

    /// Runs a console line. `false` when no command matched.
    pub fn run_command(&self, line: &str) -> bool {
        let (name, _) = split_command(line);
        if name.eq_ignore_ascii_case(PLUGINS_COMMAND) {
            self.print_plugins();
            return true;
        }
        self.console.run(line)
    }

    fn print_plugins(&self) {
        let plugins = self.list_plugins();
        if plugins.is_empty() {
            info!("HPC: there are no plugins loaded");
            return;
        }
        info!("HPC: There are '{}' plugins loaded", plugins.len());
        for plugin in plugins {
            info!("HPC: - '{}' ({})", plugin.name, plugin.filename.display());
        }
    }
}
