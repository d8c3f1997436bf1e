//! ABI DataCheck registry.
//!
//! The host records the size of every struct it shares with plugins. A
//! plugin exports the sizes it was compiled against; any disagreement means
//! the plugin was built against a different definition and would read or
//! write the host's memory at the wrong offsets.

use crate::error::DataCheckError;
use crate::session::Session;
use hpm_abi::{datacheck_entry, DataCheckEntry, HostInterface, PluginInfo, ServerType};
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::c_int;
use tracing::{error, warn};

/// Layouts of the structs the core itself shares with plugins.
pub static CORE_DATACHECK: [DataCheckEntry; 4] = [
    datacheck_entry!(HostInterface, ServerType::ALL),
    datacheck_entry!(PluginInfo, ServerType::ALL),
    datacheck_entry!(DataCheckEntry, ServerType::ALL),
    datacheck_entry!(Session, ServerType::ALL),
];

/// Versioned struct name -> size table, read-only once built.
#[derive(Debug, Clone)]
pub struct DataCheckRegistry {
    version: c_int,
    server_type: ServerType,
    sizes: HashMap<String, u32>,
}

impl DataCheckRegistry {
    /// Builds the registry from the host's table.
    ///
    /// # Safety
    /// Every entry's `name` must be null or point to a null-terminated
    /// string. Entries with a null name are ignored.
    pub unsafe fn new(table: &[DataCheckEntry], version: c_int, server_type: ServerType) -> Self {
        let sizes = table
            .iter()
            .filter(|entry| !entry.name.is_null())
            .map(|entry| {
                let name = CStr::from_ptr(entry.name).to_string_lossy().into_owned();
                (name, entry.size)
            })
            .collect();

        Self {
            version,
            server_type,
            sizes,
        }
    }

    pub fn version(&self) -> c_int {
        self.version
    }

    /// Host size recorded for `name`.
    pub fn size_of(&self, name: &str) -> Option<u32> {
        self.sizes.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Checks a plugin's compiled-in layouts against the host's.
    ///
    /// Entries for roles other than the running one are skipped.
    ///
    /// # Safety
    /// Every entry's `name` must be null or point to a null-terminated string.
    pub unsafe fn validate(
        &self,
        entries: &[DataCheckEntry],
        version: c_int,
        plugin_name: &str,
    ) -> Result<(), DataCheckError> {
        if version != self.version {
            let err = DataCheckError::VersionMismatch {
                host: self.version,
                plugin: version,
            };
            error!("HPMDataCheck:{}: {}", plugin_name, err);
            return Err(err);
        }

        for entry in entries {
            if !entry.server_type.intersects(self.server_type) {
                continue;
            }

            let name = if entry.name.is_null() {
                String::new()
            } else {
                CStr::from_ptr(entry.name).to_string_lossy().into_owned()
            };

            match self.sizes.get(&name) {
                None => {
                    let err = DataCheckError::UnknownStruct { name };
                    error!("HPMDataCheck:{}: {}", plugin_name, err);
                    return Err(err);
                }
                Some(&host) if host != entry.size => {
                    let err = DataCheckError::SizeMismatch {
                        name,
                        plugin: entry.size,
                        host,
                    };
                    warn!("HPMDataCheck:{}: {}", plugin_name, err);
                    return Err(err);
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpm_abi::DATACHECK_VERSION;
    use std::os::raw::c_char;

    fn entry(name: &'static str, size: u32, server_type: ServerType) -> DataCheckEntry {
        DataCheckEntry {
            name: name.as_ptr() as *const c_char,
            size,
            server_type,
        }
    }

    fn host_registry() -> DataCheckRegistry {
        let table = [
            entry("Session\0", 64, ServerType::ALL),
            entry("MapSessionData\0", 512, ServerType::MAP),
        ];
        unsafe { DataCheckRegistry::new(&table, 3, ServerType::MAP) }
    }

    #[test]
    fn test_matching_layouts_pass() {
        let registry = host_registry();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.size_of("MapSessionData"), Some(512));

        let plugin = [
            entry("Session\0", 64, ServerType::ALL),
            entry("MapSessionData\0", 512, ServerType::MAP),
        ];
        assert!(unsafe { registry.validate(&plugin, 3, "sample") }.is_ok());
    }

    #[test]
    fn test_version_mismatch_fails() {
        let registry = host_registry();
        let result = unsafe { registry.validate(&[], 2, "sample") };
        assert_eq!(
            result,
            Err(DataCheckError::VersionMismatch { host: 3, plugin: 2 })
        );
    }

    #[test]
    fn test_size_mismatch_fails() {
        let registry = host_registry();
        let plugin = [entry("MapSessionData\0", 480, ServerType::MAP)];
        let result = unsafe { registry.validate(&plugin, 3, "stale") };
        assert_eq!(
            result,
            Err(DataCheckError::SizeMismatch {
                name: "MapSessionData".to_string(),
                plugin: 480,
                host: 512,
            })
        );
    }

    #[test]
    fn test_unknown_struct_fails() {
        let registry = host_registry();
        let plugin = [entry("GuildData\0", 10, ServerType::MAP)];
        assert!(matches!(
            unsafe { registry.validate(&plugin, 3, "sample") },
            Err(DataCheckError::UnknownStruct { .. })
        ));
    }

    #[test]
    fn test_entries_for_other_roles_are_skipped() {
        let registry = host_registry();
        let plugin = [
            entry("LoginOnly\0", 1, ServerType::LOGIN),
            entry("Session\0", 1, ServerType::CHAR),
        ];
        assert!(unsafe { registry.validate(&plugin, 3, "sample") }.is_ok());
    }

    #[test]
    fn test_core_table_describes_this_build() {
        let registry =
            unsafe { DataCheckRegistry::new(&CORE_DATACHECK, DATACHECK_VERSION, ServerType::MAP) };
        assert_eq!(
            registry.size_of("HostInterface"),
            Some(std::mem::size_of::<HostInterface>() as u32)
        );
        assert_eq!(
            registry.size_of("Session"),
            Some(std::mem::size_of::<Session>() as u32)
        );
        assert!(unsafe { registry.validate(&CORE_DATACHECK, DATACHECK_VERSION, "core") }.is_ok());
    }
}
