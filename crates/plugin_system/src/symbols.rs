//! Shared symbol table.
//!
//! The host publishes pointers to its own interfaces under well-known names;
//! plugins look them up by name while negotiating their load. The table is
//! append-only and lookups return the first match, so a name shared twice
//! keeps resolving to its first value.

use std::cell::RefCell;
use std::os::raw::c_void;
use std::ptr::NonNull;
use tracing::error;

#[derive(Debug)]
struct Symbol {
    name: String,
    value: *mut c_void,
}

/// Append-only name -> pointer table.
#[derive(Debug, Default)]
pub struct SymbolRegistry {
    symbols: RefCell<Vec<Symbol>>,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a symbol. Existing entries with the same name are kept.
    pub fn share(&self, value: *mut c_void, name: &str) {
        self.symbols.borrow_mut().push(Symbol {
            name: name.to_string(),
            value,
        });
    }

    /// Looks up `name`, first match wins.
    ///
    /// A miss is logged against `requester` (a display name) and yields
    /// `None`; callers must cope with missing symbols.
    pub fn import(&self, name: &str, requester: &str) -> Option<NonNull<c_void>> {
        let found = self
            .symbols
            .borrow()
            .iter()
            .find(|symbol| symbol.name == name)
            .map(|symbol| symbol.value);

        match found.and_then(NonNull::new) {
            Some(value) => Some(value),
            None => {
                error!("HPM:get_symbol:{}: '{}' not found!", requester, name);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.symbols.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr<T>(value: &mut T) -> *mut c_void {
        (value as *mut T).cast()
    }

    #[test]
    fn test_share_then_import() {
        let registry = SymbolRegistry::new();
        let mut server_name = 7u32;
        registry.share(addr(&mut server_name), "server_name");

        let found = registry.import("server_name", "core").unwrap();
        assert_eq!(found.as_ptr(), addr(&mut server_name));
    }

    #[test]
    fn test_first_match_wins() {
        let registry = SymbolRegistry::new();
        let mut first = 1u8;
        let mut second = 2u8;
        registry.share(addr(&mut first), "clif");
        registry.share(addr(&mut second), "clif");

        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.import("clif", "core").unwrap().as_ptr(),
            addr(&mut first)
        );
    }

    #[test]
    fn test_missing_symbol_is_absent() {
        let registry = SymbolRegistry::new();
        assert!(registry.import("nothing", "sample").is_none());

        registry.share(std::ptr::null_mut(), "null");
        assert!(registry.import("null", "sample").is_none());

        registry.clear();
        assert!(registry.is_empty());
    }
}
