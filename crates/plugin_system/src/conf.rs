//! Configuration listeners.
//!
//! While the host reads a configuration category it offers every key to
//! [`ConfListeners::dispatch`] first; a key claimed by a plugin is handed to
//! that plugin instead of the built-in reader.

use crate::error::RegistryError;
use hpm_abi::{ConfCategory, ConfListenerFn, ADDCONF_LENGTH};
use std::cell::RefCell;
use std::ffi::CStr;
use std::os::raw::c_uint;

#[derive(Debug, Clone)]
struct ConfListener {
    pid: c_uint,
    key: String,
    func: ConfListenerFn,
}

/// Stored form of a key: at most `ADDCONF_LENGTH - 1` bytes, cut on a char boundary.
fn stored_key(key: &str) -> &str {
    let max = ADDCONF_LENGTH - 1;
    if key.len() <= max {
        return key;
    }
    let mut end = max;
    while !key.is_char_boundary(end) {
        end -= 1;
    }
    &key[..end]
}

#[derive(Debug)]
pub struct ConfListeners {
    categories: RefCell<Vec<Vec<ConfListener>>>,
}

impl Default for ConfListeners {
    fn default() -> Self {
        Self {
            categories: RefCell::new(vec![Vec::new(); ConfCategory::COUNT]),
        }
    }
}

impl ConfListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key` in `category` for plugin `pid`. Keys are case-insensitive.
    pub fn add_listener(
        &self,
        category: ConfCategory,
        key: &str,
        func: ConfListenerFn,
        pid: c_uint,
    ) -> Result<(), RegistryError> {
        let idx = category
            .index()
            .ok_or(RegistryError::UnknownCategory(category.0))?;
        let key = stored_key(key);

        let mut categories = self.categories.borrow_mut();
        if let Some(existing) = categories[idx]
            .iter()
            .find(|listener| listener.key.eq_ignore_ascii_case(key))
        {
            return Err(RegistryError::DuplicateConf {
                key: key.to_string(),
                owner: existing.pid,
            });
        }

        categories[idx].push(ConfListener {
            pid,
            key: key.to_string(),
            func,
        });
        Ok(())
    }

    /// Hands `value` to the listener claiming `key`, if any.
    ///
    /// Returns `false` when no plugin claims the key, in which case the
    /// caller processes it itself.
    pub fn dispatch(&self, key: &str, value: &CStr, category: ConfCategory) -> bool {
        let Some(idx) = category.index() else {
            return false;
        };
        let key = stored_key(key);

        let func = self.categories.borrow()[idx]
            .iter()
            .find(|listener| listener.key.eq_ignore_ascii_case(key))
            .map(|listener| listener.func);

        match func {
            Some(func) => {
                unsafe { func(value.as_ptr()) };
                true
            }
            None => false,
        }
    }

    /// Owner of `key` in `category`, if claimed.
    pub fn owner(&self, key: &str, category: ConfCategory) -> Option<c_uint> {
        let idx = category.index()?;
        let key = stored_key(key);
        self.categories.borrow()[idx]
            .iter()
            .find(|listener| listener.key.eq_ignore_ascii_case(key))
            .map(|listener| listener.pid)
    }

    pub fn clear(&self) {
        for category in self.categories.borrow_mut().iter_mut() {
            category.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::os::raw::c_char;

    thread_local! {
        static SEEN: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    }

    unsafe extern "C" fn remember(value: *const c_char) {
        let value = CStr::from_ptr(value).to_string_lossy().into_owned();
        SEEN.with(|seen| seen.borrow_mut().push(value));
    }

    fn seen() -> Vec<String> {
        SEEN.with(|seen| seen.borrow().clone())
    }

    fn cstr(bytes: &[u8]) -> &CStr {
        CStr::from_bytes_with_nul(bytes).unwrap()
    }

    #[test]
    fn test_keys_collide_case_insensitively() {
        let listeners = ConfListeners::new();
        listeners
            .add_listener(ConfCategory::BATTLE, "my_rate", remember, 1)
            .unwrap();

        let err = listeners
            .add_listener(ConfCategory::BATTLE, "MY_RATE", remember, 2)
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateConf {
                key: "MY_RATE".to_string(),
                owner: 1
            }
        );

        // Categories are independent.
        listeners
            .add_listener(ConfCategory::SCRIPT, "my_rate", remember, 2)
            .unwrap();
        assert_eq!(listeners.owner("My_Rate", ConfCategory::SCRIPT), Some(2));
    }

    #[test]
    fn test_dispatch_hit_and_miss() {
        let listeners = ConfListeners::new();
        listeners
            .add_listener(ConfCategory::LOG, "log_extra", remember, 1)
            .unwrap();

        assert!(listeners.dispatch("LOG_EXTRA", cstr(b"yes\0"), ConfCategory::LOG));
        assert_eq!(seen(), vec!["yes".to_string()]);

        assert!(!listeners.dispatch("log_other", cstr(b"no\0"), ConfCategory::LOG));
        assert!(!listeners.dispatch("log_extra", cstr(b"no\0"), ConfCategory::MAP_INTER));
        assert_eq!(seen().len(), 1);
    }

    #[test]
    fn test_long_keys_are_truncated() {
        let listeners = ConfListeners::new();
        let long = "k".repeat(60);
        listeners
            .add_listener(ConfCategory::CHAR, &long, remember, 1)
            .unwrap();
        assert_eq!(stored_key(&long).len(), ADDCONF_LENGTH - 1);
        assert_eq!(listeners.owner(&"K".repeat(39), ConfCategory::CHAR), Some(1));
    }

    #[test]
    fn test_unknown_category() {
        let listeners = ConfListeners::new();
        assert_eq!(
            listeners.add_listener(ConfCategory(12), "x", remember, 1),
            Err(RegistryError::UnknownCategory(12))
        );
    }
}
