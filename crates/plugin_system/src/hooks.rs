//! Function hook registry.
//!
//! The host does not patch functions itself. A dedicated hooking module,
//! loaded before every other plugin, resolves hook targets by name; this
//! registry only forwards registrations to it and owns the propagation flag
//! that pre-hooks set to skip the original function.

use crate::error::RegistryError;
use hpm_abi::{AddHookFn, HookType};
use std::cell::Cell;
use std::ffi::CStr;
use std::os::raw::{c_uint, c_void};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct FunctionHooks {
    add_hook_sub: Cell<Option<AddHookFn>>,
    /// Boxed so its address stays valid for the hooking module.
    force_return: Box<AtomicBool>,
}

impl Default for FunctionHooks {
    fn default() -> Self {
        Self {
            add_hook_sub: Cell::new(None),
            force_return: Box::new(AtomicBool::new(false)),
        }
    }
}

impl FunctionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(&self) -> bool {
        self.add_hook_sub.get().is_some()
    }

    /// Enables hooking with the hooking module's resolver.
    pub fn install(&self, add_hook: AddHookFn) {
        self.add_hook_sub.set(Some(add_hook));
    }

    pub fn disable(&self) {
        self.add_hook_sub.set(None);
    }

    /// Address of the propagation flag, handed to the hooking module.
    ///
    /// `AtomicBool` has the same layout as `bool`.
    pub fn flag_ptr(&self) -> *mut bool {
        self.force_return.as_ptr()
    }

    /// Forwards a hook registration to the hooking module.
    ///
    /// # Safety
    /// `hook` must be a function pointer with the signature the hooking
    /// module expects for `target`.
    pub unsafe fn add_hook(
        &self,
        kind: HookType,
        target: &CStr,
        hook: *mut c_void,
        pid: c_uint,
    ) -> Result<(), RegistryError> {
        let add_hook = self.add_hook_sub.get().ok_or(RegistryError::HookingDisabled)?;
        if add_hook(kind, target.as_ptr(), hook, pid) {
            Ok(())
        } else {
            Err(RegistryError::UnknownHookTarget(
                target.to_string_lossy().into_owned(),
            ))
        }
    }

    /// Makes the running pre-hook skip the original function.
    pub fn stop_propagation(&self) {
        self.force_return.store(true, Ordering::Relaxed);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.force_return.load(Ordering::Relaxed)
    }

    /// Starts dispatch of one hooked call, clearing any stale stop request.
    pub fn begin_call(&self) -> HookCall<'_> {
        self.force_return.store(false, Ordering::Relaxed);
        HookCall {
            flag: &self.force_return,
        }
    }
}

/// Propagation state for a single hooked call.
#[derive(Debug)]
pub struct HookCall<'a> {
    flag: &'a AtomicBool,
}

impl HookCall<'_> {
    /// Whether a pre-hook asked to skip the original function during this call.
    pub fn stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::raw::c_char;

    fn cstr(bytes: &[u8]) -> &CStr {
        CStr::from_bytes_with_nul(bytes).unwrap()
    }

    unsafe extern "C" fn accept_known(
        _kind: HookType,
        target: *const c_char,
        _hook: *mut c_void,
        _pid: c_uint,
    ) -> bool {
        CStr::from_ptr(target).to_bytes() == b"clif->pLoadEndAck"
    }

    #[test]
    fn test_disabled_hooking_rejects() {
        let hooks = FunctionHooks::new();
        assert!(!hooks.enabled());
        let target = cstr(b"clif->pLoadEndAck\0");
        let err = unsafe { hooks.add_hook(HookType::PRE, target, std::ptr::null_mut(), 1) };
        assert_eq!(err, Err(RegistryError::HookingDisabled));
    }

    #[test]
    fn test_forwarding_to_hooking_module() {
        let hooks = FunctionHooks::new();
        hooks.install(accept_known);

        unsafe {
            assert!(hooks
                .add_hook(HookType::POST, cstr(b"clif->pLoadEndAck\0"), std::ptr::null_mut(), 1)
                .is_ok());
            assert_eq!(
                hooks.add_hook(HookType::PRE, cstr(b"nothing\0"), std::ptr::null_mut(), 1),
                Err(RegistryError::UnknownHookTarget("nothing".to_string()))
            );
        }

        hooks.disable();
        assert!(!hooks.enabled());
    }

    #[test]
    fn test_begin_call_resets_stale_flag() {
        let hooks = FunctionHooks::new();
        hooks.stop_propagation();
        assert!(hooks.is_propagation_stopped());

        let call = hooks.begin_call();
        assert!(!call.stopped());

        // The hooking module writes the flag through its raw address.
        unsafe { *hooks.flag_ptr() = true };
        assert!(call.stopped());
    }
}
