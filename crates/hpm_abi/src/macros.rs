//! Export macros for plugin crates and host DataCheck tables.

/// Builds a [`DataCheckEntry`](crate::DataCheckEntry) describing the layout
/// of `$ty` as seen by the binary expanding the macro.
///
/// Host and plugin must name the type the same way (use the bare type name),
/// since the name is the lookup key.
#[macro_export]
macro_rules! datacheck_entry {
    ($ty:ty, $server:expr) => {
        $crate::DataCheckEntry {
            name: concat!(stringify!($ty), "\0").as_ptr() as *const ::std::os::raw::c_char,
            size: ::std::mem::size_of::<$ty>() as ::std::os::raw::c_uint,
            server_type: $server,
        }
    };
}

/// Generates the module contract exports for a plugin crate.
///
/// Produces the metadata record, the import slot, the capability table
/// pointer and its storage, the version-negotiation export and the DataCheck
/// triple, plus two helpers for plugin code:
///
/// - `hpm()` - the capability table, once the host has loaded the plugin
/// - `hpm_import::<T>(name)` - looks up a symbol the host shared
///
/// Lifecycle entry points are written by the plugin with `#[export_name]`
/// (see [`EventKind::export_name`](crate::EventKind::export_name)).
#[macro_export]
macro_rules! hpm_plugin {
    (
        name: $name:literal,
        version: $version:literal,
        server_type: $server:expr,
        shared_symbols: [$($symbol:literal),* $(,)?],
        datacheck: [$($entry:expr),* $(,)?] $(,)?
    ) => {
        #[export_name = "plugin_info"]
        pub static PLUGIN_INFO: $crate::PluginInfo = $crate::PluginInfo {
            name: concat!($name, "\0").as_ptr() as *const ::std::os::raw::c_char,
            server_type: $server,
            version: concat!($version, "\0").as_ptr() as *const ::std::os::raw::c_char,
            req_version: $crate::HPM_VERSION_NUL.as_ptr() as *const ::std::os::raw::c_char,
        };

        #[export_name = "import_symbol"]
        pub static mut IMPORT_SYMBOL: ::std::option::Option<$crate::ImportSymbolFn> = None;

        #[export_name = "hpm_interface_storage"]
        pub static mut HPM_INTERFACE_STORAGE: $crate::HostInterface = $crate::HostInterface::EMPTY;

        #[export_name = "hpm_interface"]
        pub static mut HPM_INTERFACE: *mut $crate::HostInterface = ::std::ptr::null_mut();

        const HPM_DATACHECK_COUNT: usize = {
            let names: &[&str] = &[$(stringify!($entry)),*];
            names.len()
        };

        #[export_name = "hpm_datacheck"]
        pub static HPM_DATACHECK: [$crate::DataCheckEntry; HPM_DATACHECK_COUNT] = [$($entry),*];

        #[export_name = "hpm_datacheck_len"]
        pub static HPM_DATACHECK_LEN: ::std::os::raw::c_uint =
            HPM_DATACHECK_COUNT as ::std::os::raw::c_uint;

        #[export_name = "hpm_datacheck_ver"]
        pub static HPM_DATACHECK_VER: ::std::os::raw::c_int = $crate::DATACHECK_VERSION;

        /// The capability table the host wired in, once the plugin is loaded.
        pub fn hpm() -> ::std::option::Option<&'static $crate::HostInterface> {
            unsafe { (*::std::ptr::addr_of!(HPM_INTERFACE)).as_ref() }
        }

        /// Looks up a symbol shared by the host. Null when absent.
        ///
        /// # Safety
        /// `name` must point to a null-terminated string.
        pub unsafe fn hpm_import<T>(name: *const ::std::os::raw::c_char) -> *mut T {
            match *::std::ptr::addr_of!(IMPORT_SYMBOL) {
                Some(import) => {
                    let pid = (*::std::ptr::addr_of!(HPM_INTERFACE_STORAGE)).pid;
                    import(name, pid).cast()
                }
                None => ::std::ptr::null_mut(),
            }
        }

        #[export_name = "hpm_shared_symbols"]
        pub unsafe extern "C" fn hpm_shared_symbols(
            _server_type: $crate::ServerType,
        ) -> *const ::std::os::raw::c_char {
            $(
                let symbol = concat!($symbol, "\0").as_ptr() as *const ::std::os::raw::c_char;
                if hpm_import::<::std::os::raw::c_void>(symbol).is_null() {
                    return symbol;
                }
            )*
            ::std::ptr::null()
        }
    };
}
