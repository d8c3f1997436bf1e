//! Extension data slots (HPData).
//!
//! Host objects of extension-enabled kinds own an [`HpDataList`]. The
//! manager never knows the concrete object types: it asks an accessor to
//! resolve `(kind, object)` to the object's list. Sessions are resolved here,
//! every other kind through the accessor the host installs with
//! [`HpDataSlots::set_accessor`].

use crate::error::RegistryError;
use crate::memory;
use crate::session::Session;
use hpm_abi::HpDataType;
use std::cell::RefCell;
use std::os::raw::{c_uint, c_void};
use std::ptr::NonNull;
use std::rc::Rc;

/// One plugin's payload attached to a host object.
#[derive(Debug)]
pub struct HpDataItem {
    pub pid: c_uint,
    pub tag: c_uint,
    pub data: *mut c_void,
    /// Free the payload when the owning object goes away.
    pub auto_free: bool,
}

/// Items attached to one host object.
///
/// Items are boxed individually, so growing the list never moves an item.
#[derive(Debug, Default)]
pub struct HpDataList {
    items: Vec<Box<HpDataItem>>,
}

impl HpDataList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HpDataItem> {
        self.items.iter().map(|item| &**item)
    }

    pub fn find(&self, pid: c_uint, tag: c_uint) -> Option<&HpDataItem> {
        self.iter().find(|item| item.pid == pid && item.tag == tag)
    }

    fn position(&self, pid: c_uint, tag: c_uint) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.pid == pid && item.tag == tag)
    }
}

impl Drop for HpDataList {
    fn drop(&mut self) {
        for item in self.items.drain(..) {
            if item.auto_free {
                unsafe { memory::release(item.data) };
            }
        }
    }
}

/// Resolves a non-session object to its data list.
pub type HpDataAccessor = dyn Fn(HpDataType, *mut c_void) -> Option<NonNull<HpDataList>>;

/// Attach/lookup/remove over every extension-enabled object kind.
#[derive(Default)]
pub struct HpDataSlots {
    accessor: RefCell<Option<Rc<HpDataAccessor>>>,
}

impl std::fmt::Debug for HpDataSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HpDataSlots")
            .field("accessor", &self.accessor.borrow().is_some())
            .finish()
    }
}

impl HpDataSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the accessor for kinds other than `SESSION`.
    pub fn set_accessor(&self, accessor: Rc<HpDataAccessor>) {
        *self.accessor.borrow_mut() = Some(accessor);
    }

    pub fn clear_accessor(&self) {
        self.accessor.borrow_mut().take();
    }

    /// Resolves an object to its data list.
    ///
    /// # Safety
    /// For `SESSION`, `object` must be null or point to a live [`Session`].
    /// Other kinds are subject to the installed accessor's contract.
    pub unsafe fn grab(&self, kind: HpDataType, object: *mut c_void) -> Option<NonNull<HpDataList>> {
        if object.is_null() {
            return None;
        }
        if kind == HpDataType::SESSION {
            let session = object.cast::<Session>();
            return Some(NonNull::from(&mut (*session).hdata));
        }

        // Cloned out so the accessor may itself touch the registry.
        let accessor = self.accessor.borrow().clone()?;
        accessor(kind, object)
    }

    /// Attaches `data` under `(pid, tag)`.
    ///
    /// # Safety
    /// See [`HpDataSlots::grab`].
    pub unsafe fn attach(
        &self,
        kind: HpDataType,
        pid: c_uint,
        object: *mut c_void,
        data: *mut c_void,
        tag: c_uint,
        auto_free: bool,
    ) -> Result<(), RegistryError> {
        let mut list = self
            .grab(kind, object)
            .ok_or(RegistryError::HpDataUnresolved(kind.0))?;
        let list = list.as_mut();

        if list.position(pid, tag).is_some() {
            return Err(RegistryError::DuplicateHpData { pid, tag });
        }

        list.items.push(Box::new(HpDataItem {
            pid,
            tag,
            data,
            auto_free,
        }));
        Ok(())
    }

    /// Payload stored under `(pid, tag)`, if any.
    ///
    /// # Safety
    /// See [`HpDataSlots::grab`].
    pub unsafe fn get(
        &self,
        kind: HpDataType,
        pid: c_uint,
        object: *mut c_void,
        tag: c_uint,
    ) -> Result<Option<NonNull<c_void>>, RegistryError> {
        let list = self
            .grab(kind, object)
            .ok_or(RegistryError::HpDataUnresolved(kind.0))?;
        Ok(list.as_ref().find(pid, tag).and_then(|item| NonNull::new(item.data)))
    }

    /// Detaches `(pid, tag)` and frees its payload regardless of the
    /// auto-free flag. Returns whether an item was removed.
    ///
    /// # Safety
    /// See [`HpDataSlots::grab`]. The payload must come from the C allocator.
    pub unsafe fn remove(
        &self,
        kind: HpDataType,
        pid: c_uint,
        object: *mut c_void,
        tag: c_uint,
    ) -> Result<bool, RegistryError> {
        let mut list = self
            .grab(kind, object)
            .ok_or(RegistryError::HpDataUnresolved(kind.0))?;
        let list = list.as_mut();

        let Some(idx) = list.position(pid, tag) else {
            return Ok(false);
        };
        let item = list.items.remove(idx);
        memory::release(item.data);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(value: u32) -> *mut c_void {
        unsafe {
            let ptr = libc::malloc(std::mem::size_of::<u32>()).cast::<u32>();
            ptr.write(value);
            ptr.cast()
        }
    }

    fn session_ptr(session: &mut Session) -> *mut c_void {
        (session as *mut Session).cast()
    }

    #[test]
    fn test_attach_get_remove_on_session() {
        let slots = HpDataSlots::new();
        let mut session = Session::new(3);
        let obj = session_ptr(&mut session);
        let data = payload(7);

        unsafe {
            slots.attach(HpDataType::SESSION, 1, obj, data, 0, false).unwrap();
            let found = slots.get(HpDataType::SESSION, 1, obj, 0).unwrap().unwrap();
            assert_eq!(found.as_ptr(), data);
            assert_eq!(*found.as_ptr().cast::<u32>(), 7);

            assert_eq!(slots.get(HpDataType::SESSION, 1, obj, 1), Ok(None));
            assert_eq!(slots.get(HpDataType::SESSION, 2, obj, 0), Ok(None));

            assert_eq!(slots.remove(HpDataType::SESSION, 1, obj, 0), Ok(true));
            assert_eq!(slots.get(HpDataType::SESSION, 1, obj, 0), Ok(None));
            assert_eq!(slots.remove(HpDataType::SESSION, 1, obj, 0), Ok(false));
        }
        assert!(session.hdata.is_empty());
    }

    #[test]
    fn test_duplicate_attach_is_rejected() {
        let slots = HpDataSlots::new();
        let mut session = Session::new(3);
        let obj = session_ptr(&mut session);

        unsafe {
            slots.attach(HpDataType::SESSION, 1, obj, payload(1), 5, true).unwrap();
            let second = payload(2);
            assert_eq!(
                slots.attach(HpDataType::SESSION, 1, obj, second, 5, true),
                Err(RegistryError::DuplicateHpData { pid: 1, tag: 5 })
            );
            libc::free(second);
        }
        assert_eq!(session.hdata.len(), 1);
    }

    #[test]
    fn test_items_keep_identity_and_order() {
        let slots = HpDataSlots::new();
        let mut session = Session::new(3);
        let obj = session_ptr(&mut session);

        unsafe {
            slots.attach(HpDataType::SESSION, 1, obj, payload(1), 0, true).unwrap();
        }
        let first: *const HpDataItem = session.hdata.find(1, 0).unwrap();

        unsafe {
            for tag in 1..32 {
                slots.attach(HpDataType::SESSION, 1, obj, payload(tag), tag, true).unwrap();
            }
            slots.remove(HpDataType::SESSION, 1, obj, 10).unwrap();
        }

        assert_eq!(session.hdata.find(1, 0).unwrap() as *const HpDataItem, first);
        let tags: Vec<c_uint> = session.hdata.iter().map(|item| item.tag).take(12).collect();
        assert_eq!(tags, vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 11, 12]);
    }

    #[test]
    fn test_unresolved_kinds() {
        let slots = HpDataSlots::new();
        let mut other = HpDataList::new();
        let obj = (&mut other as *mut HpDataList).cast::<c_void>();

        unsafe {
            assert_eq!(
                slots.attach(HpDataType::GUILD, 1, obj, std::ptr::null_mut(), 0, false),
                Err(RegistryError::HpDataUnresolved(HpDataType::GUILD.0))
            );
            assert!(slots.grab(HpDataType::SESSION, std::ptr::null_mut()).is_none());
        }
    }

    #[test]
    fn test_delegate_accessor_resolves_other_kinds() {
        let slots = HpDataSlots::new();
        slots.set_accessor(Rc::new(
            |kind: HpDataType, object: *mut c_void| -> Option<NonNull<HpDataList>> {
                if kind != HpDataType::GUILD {
                    return None;
                }
                NonNull::new(object.cast::<HpDataList>())
            },
        ));

        let mut guild = HpDataList::new();
        let obj = (&mut guild as *mut HpDataList).cast::<c_void>();
        unsafe {
            slots.attach(HpDataType::GUILD, 4, obj, payload(9), 1, true).unwrap();
            assert!(slots.get(HpDataType::GUILD, 4, obj, 1).unwrap().is_some());
            assert!(slots.get(HpDataType::PARTY, 4, obj, 1).is_err());
        }
        assert_eq!(guild.len(), 1);

        slots.clear_accessor();
        assert!(unsafe { slots.grab(HpDataType::GUILD, obj) }.is_none());
    }
}
