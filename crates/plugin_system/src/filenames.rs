//! Retained copies of source-file tags used by allocation diagnostics.
//!
//! Plugins tag their allocations with `file!()`-style literals that live in
//! the plugin image. Once the plugin is unloaded those addresses dangle, yet
//! the leak report printed after shutdown still needs them, so every tag is
//! copied here and kept until [`FilenameCache::memdown`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::c_char;

/// Source address -> retained copy.
///
/// Keyed by pointer identity rather than string contents: callers always
/// pass compile-time literals, so the address is a stable key and lookups
/// never need to read the (possibly unloaded) source string.
#[derive(Debug, Default)]
pub struct FilenameCache {
    entries: RefCell<HashMap<usize, Box<CStr>>>,
}

impl FilenameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a retained copy of `file`, creating it on first sight.
    ///
    /// Null input yields null.
    ///
    /// # Safety
    /// `file` must be null or point to a null-terminated string that is
    /// readable for the duration of the call.
    pub unsafe fn intern(&self, file: *const c_char) -> *const c_char {
        if file.is_null() {
            return std::ptr::null();
        }

        let mut entries = self.entries.borrow_mut();
        let retained = entries
            .entry(file as usize)
            .or_insert_with(|| Box::from(CStr::from_ptr(file)));
        retained.as_ptr()
    }

    /// Number of retained tags.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Releases every retained tag. Pointers handed out earlier dangle afterwards.
    pub fn memdown(&self) {
        self.entries.borrow_mut().clear();
    }
}
