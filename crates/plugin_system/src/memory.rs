//! Allocation tracker exposed to plugins through the capability table.
//!
//! Plugin allocations go through the C allocator so a payload can be freed
//! by whichever side ends up owning it. Each live block is recorded with the
//! file/line tag of its allocation site; whatever is still live after
//! shutdown is reported as a leak.

use crate::filenames::FilenameCache;
use crate::host;
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::CStr;
use std::os::raw::{c_char, c_int, c_void};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
struct Allocation {
    size: usize,
    file: *const c_char,
    line: c_int,
}

/// A block still live when leaks are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leak {
    pub address: usize,
    pub size: usize,
    pub file: String,
    pub line: i32,
}

#[derive(Debug, Default)]
pub struct AllocationTracker {
    filenames: FilenameCache,
    live: RefCell<HashMap<usize, Allocation>>,
}

impl AllocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates `size` bytes tagged with `file:line`. Null on exhaustion.
    ///
    /// # Safety
    /// `file` must be null or point to a null-terminated string.
    pub unsafe fn malloc(&self, size: usize, file: *const c_char, line: c_int) -> *mut c_void {
        let ptr = libc::malloc(size.max(1));
        if ptr.is_null() {
            warn!("Memory manager: out of memory allocating {} bytes", size);
            return ptr;
        }

        self.track(ptr, size, file, line);
        ptr
    }

    /// Zeroed `count * size` bytes tagged with `file:line`. Null when the
    /// product overflows or on exhaustion.
    ///
    /// # Safety
    /// `file` must be null or point to a null-terminated string.
    pub unsafe fn calloc(&self, count: usize, size: usize, file: *const c_char, line: c_int) -> *mut c_void {
        let Some(total) = count.checked_mul(size) else {
            warn!("Memory manager: {} x {} bytes overflows", count, size);
            return std::ptr::null_mut();
        };
        let ptr = libc::calloc(count.max(1), size.max(1));
        if ptr.is_null() {
            warn!("Memory manager: out of memory allocating {} bytes", total);
            return ptr;
        }

        self.track(ptr, total, file, line);
        ptr
    }

    /// Resizes a block and retags it with the new site. A null `ptr`
    /// allocates; on failure the old block stays live under its old tag.
    ///
    /// # Safety
    /// `ptr` must be null or a block from the C allocator not yet freed.
    /// `file` must be null or point to a null-terminated string.
    pub unsafe fn realloc(&self, ptr: *mut c_void, size: usize, file: *const c_char, line: c_int) -> *mut c_void {
        if ptr.is_null() {
            return self.malloc(size, file, line);
        }

        let previous = self.live.borrow_mut().remove(&(ptr as usize));
        if previous.is_none() {
            debug!("Memory manager: resizing untracked block {:p}", ptr);
        }
        let moved = libc::realloc(ptr, size.max(1));
        if moved.is_null() {
            warn!("Memory manager: out of memory resizing {:p} to {} bytes", ptr, size);
            if let Some(previous) = previous {
                self.live.borrow_mut().insert(ptr as usize, previous);
            }
            return moved;
        }

        self.track(moved, size, file, line);
        moved
    }

    /// Tracked copy of `text`. Null when `text` is null or on exhaustion.
    ///
    /// # Safety
    /// `text` and `file` must each be null or point to a null-terminated string.
    pub unsafe fn strdup(&self, text: *const c_char, file: *const c_char, line: c_int) -> *mut c_char {
        if text.is_null() {
            return std::ptr::null_mut();
        }
        let bytes = CStr::from_ptr(text).to_bytes_with_nul();
        let copy = self.malloc(bytes.len(), file, line).cast::<c_char>();
        if !copy.is_null() {
            std::ptr::copy_nonoverlapping(bytes.as_ptr().cast::<c_char>(), copy, bytes.len());
        }
        copy
    }

    unsafe fn track(&self, ptr: *mut c_void, size: usize, file: *const c_char, line: c_int) {
        let file = self.filenames.intern(file);
        self.live
            .borrow_mut()
            .insert(ptr as usize, Allocation { size, file, line });
    }

    /// Frees a block. Untracked blocks are still handed to the C allocator.
    ///
    /// # Safety
    /// `ptr` must be null or a block from the C allocator not yet freed.
    pub unsafe fn free(&self, ptr: *mut c_void) {
        if ptr.is_null() {
            return;
        }
        if self.live.borrow_mut().remove(&(ptr as usize)).is_none() {
            debug!("Memory manager: freeing untracked block {:p}", ptr);
        }
        libc::free(ptr);
    }

    /// Number of live tracked blocks.
    pub fn live(&self) -> usize {
        self.live.borrow().len()
    }

    /// Live blocks ordered by address.
    pub fn leaks(&self) -> Vec<Leak> {
        let mut leaks: Vec<Leak> = self
            .live
            .borrow()
            .iter()
            .map(|(&address, alloc)| Leak {
                address,
                size: alloc.size,
                file: if alloc.file.is_null() {
                    "unknown".to_string()
                } else {
                    // Retained by the filename cache until memdown.
                    unsafe { CStr::from_ptr(alloc.file) }.to_string_lossy().into_owned()
                },
                line: alloc.line,
            })
            .collect();
        leaks.sort_by_key(|leak| leak.address);
        leaks
    }

    /// Logs every live block and returns how many there were.
    pub fn report_leaks(&self) -> usize {
        let leaks = self.leaks();
        for leak in &leaks {
            warn!(
                "Memory manager: memory leak found at {}:{} ({} bytes at 0x{:x})",
                leak.file, leak.line, leak.size, leak.address
            );
        }
        if !leaks.is_empty() {
            warn!("Memory manager: {} leaked block(s)", leaks.len());
        }
        leaks.len()
    }

    /// Number of retained file tags.
    pub fn filenames(&self) -> usize {
        self.filenames.len()
    }

    /// Releases retained file tags. Call after [`AllocationTracker::report_leaks`].
    pub fn memdown(&self) {
        self.filenames.memdown();
    }
}

/// Frees a plugin-owned payload through the installed manager's tracker, or
/// straight through the C allocator when no manager is installed.
///
/// # Safety
/// `ptr` must be null or a block from the C allocator not yet freed.
pub unsafe fn release(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    match host::current() {
        Some(manager) => manager.memory().free(ptr),
        None => libc::free(ptr),
    }
}
