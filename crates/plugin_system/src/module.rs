//! Native module layer.
//!
//! The manager only ever asks a module for the address of an export. Shared
//! libraries are opened with `libloading`; modules linked into the host (and
//! test fixtures) are described by a [`StaticModule`] export table.

use libloading::Library;
use std::collections::HashMap;
use std::os::raw::c_void;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;

/// An opened module. Dropping it closes the module.
pub trait NativeModule {
    /// Address of the export `name`, if present.
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>>;
}

/// Opens modules by path.
pub trait ModuleLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn NativeModule>, String>;
}

// ============================================================================
// Shared libraries
// ============================================================================

/// A shared library opened through the platform loader.
#[derive(Debug)]
pub struct DynamicLibrary {
    library: Library,
}

impl NativeModule for DynamicLibrary {
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        // `Symbol<*mut c_void>` dereferences to the export's address.
        let symbol = unsafe { self.library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        NonNull::new(*symbol)
    }
}

/// Default loader: `dlopen`/`LoadLibrary` through `libloading`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicLibraryLoader;

impl ModuleLoader for DynamicLibraryLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn NativeModule>, String> {
        // Running a module's initializers is the point of loading it.
        let library = unsafe { Library::new(path) }.map_err(|e| e.to_string())?;
        Ok(Box::new(DynamicLibrary { library }))
    }
}

// ============================================================================
// In-process modules
// ============================================================================

/// Export table of a module linked into the host.
#[derive(Debug, Clone, Default)]
pub struct StaticModule {
    exports: HashMap<String, usize>,
}

impl StaticModule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an export. Null addresses are treated as absent.
    pub fn export(mut self, name: &str, address: *const c_void) -> Self {
        self.exports.insert(name.to_string(), address as usize);
        self
    }
}

impl NativeModule for StaticModule {
    fn symbol(&self, name: &str) -> Option<NonNull<c_void>> {
        self.exports
            .get(name)
            .and_then(|&address| NonNull::new(address as *mut c_void))
    }
}

/// Serves [`StaticModule`]s registered under a path.
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    modules: HashMap<PathBuf, StaticModule>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<PathBuf>, module: StaticModule) -> Self {
        self.modules.insert(path.into(), module);
        self
    }
}

impl ModuleLoader for StaticLoader {
    fn open(&self, path: &Path) -> Result<Box<dyn NativeModule>, String> {
        self.modules
            .get(path)
            .cloned()
            .map(|module| Box::new(module) as Box<dyn NativeModule>)
            .ok_or_else(|| format!("{}: cannot open module", path.display()))
    }
}

// ============================================================================
// Typed imports
// ============================================================================

/// Reads export `name` as a function pointer of type `F`.
///
/// # Safety
/// `F` must be a function pointer type matching the export's real signature.
pub unsafe fn import_fn<F: Copy>(module: &dyn NativeModule, name: &str) -> Option<F> {
    debug_assert_eq!(std::mem::size_of::<F>(), std::mem::size_of::<*mut c_void>());
    let address = module.symbol(name)?.as_ptr();
    Some(std::mem::transmute_copy::<*mut c_void, F>(&address))
}

/// Address of data export `name`, typed as `T`.
pub fn import_data<T>(module: &dyn NativeModule, name: &str) -> Option<NonNull<T>> {
    module.symbol(name).map(NonNull::cast)
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn forty_two() -> u32 {
        42
    }

    static VALUE: u32 = 7;

    #[test]
    fn test_static_module_exports() {
        let module = StaticModule::new()
            .export("forty_two", forty_two as *const c_void)
            .export("value", &VALUE as *const u32 as *const c_void)
            .export("null", std::ptr::null());

        let func: extern "C" fn() -> u32 = unsafe { import_fn(&module, "forty_two") }.unwrap();
        assert_eq!(func(), 42);

        let value = import_data::<u32>(&module, "value").unwrap();
        assert_eq!(unsafe { *value.as_ptr() }, 7);

        assert!(module.symbol("null").is_none());
        assert!(module.symbol("missing").is_none());
    }

    #[test]
    fn test_static_loader_resolves_by_path() {
        let loader = StaticLoader::new().with("plugins/a.so", StaticModule::new());
        assert!(loader.open(Path::new("plugins/a.so")).is_ok());
        let err = loader.open(Path::new("plugins/b.so")).err().unwrap();
        assert!(err.contains("plugins/b.so"));
    }

    #[test]
    fn test_dynamic_loader_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.so");
        assert!(DynamicLibraryLoader.open(&path).is_err());
    }
}
