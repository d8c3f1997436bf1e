//! Plugin-registered command-line arguments.
//!
//! The host's own flags are registered here as reserved names so plugins
//! cannot shadow them. `--load-plugin NAME` is handled in this registry: it
//! queues NAME for the bulk load. Hosts run [`CmdlineArgs::exec_preinit`]
//! before loading plugins and [`CmdlineArgs::exec`] once plugins had the
//! chance to register their own flags.

use crate::error::{CmdlineError, RegistryError};
use hpm_abi::{CmdlineExecFn, HPM_PID_CORE};
use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_uint;

/// The flag that queues an extra plugin for loading.
pub const LOAD_PLUGIN_ARG: &str = "--load-plugin";

#[derive(Debug, Clone, Copy)]
enum ArgHandler {
    /// Parsed by the host binary; skipped here.
    Core,
    LoadPlugin,
    Plugin(CmdlineExecFn),
}

#[derive(Debug, Clone)]
struct CmdlineArg {
    pid: c_uint,
    name: String,
    has_param: bool,
    handler: ArgHandler,
    help: String,
}

/// Registered argument as shown in help output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgInfo {
    pub pid: c_uint,
    pub name: String,
    pub has_param: bool,
    pub help: String,
}

#[derive(Debug)]
pub struct CmdlineArgs {
    args: RefCell<Vec<CmdlineArg>>,
    plugins: RefCell<Vec<String>>,
}

impl Default for CmdlineArgs {
    fn default() -> Self {
        let registry = Self {
            args: RefCell::new(Vec::new()),
            plugins: RefCell::new(Vec::new()),
        };
        registry.push(CmdlineArg {
            pid: HPM_PID_CORE,
            name: LOAD_PLUGIN_ARG.to_string(),
            has_param: true,
            handler: ArgHandler::LoadPlugin,
            help: "Loads an additional plugin (can be repeated).".to_string(),
        });
        registry
    }
}

impl CmdlineArgs {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, arg: CmdlineArg) {
        self.args.borrow_mut().push(arg);
    }

    fn validate_name(&self, name: &str) -> Result<(), RegistryError> {
        if name.len() < 3 || !name.starts_with("--") {
            return Err(RegistryError::InvalidArgName(name.to_string()));
        }
        if self.args.borrow().iter().any(|arg| arg.name == name) {
            return Err(RegistryError::DuplicateArg(name.to_string()));
        }
        Ok(())
    }

    /// Reserves one of the host binary's own flags.
    pub fn reserve(&self, name: &str, has_param: bool, help: &str) -> Result<(), RegistryError> {
        self.validate_name(name)?;
        self.push(CmdlineArg {
            pid: HPM_PID_CORE,
            name: name.to_string(),
            has_param,
            handler: ArgHandler::Core,
            help: help.to_string(),
        });
        Ok(())
    }

    /// Registers a plugin flag. Names must begin with `--`.
    pub fn add_arg(
        &self,
        pid: c_uint,
        name: &str,
        has_param: bool,
        func: CmdlineExecFn,
        help: &str,
    ) -> Result<(), RegistryError> {
        self.validate_name(name)?;
        self.push(CmdlineArg {
            pid,
            name: name.to_string(),
            has_param,
            handler: ArgHandler::Plugin(func),
            help: help.to_string(),
        });
        Ok(())
    }

    /// Queues the `--load-plugin` values in `argv` and nothing else.
    ///
    /// Runs before plugins are loaded, so their own flags are not known yet.
    pub fn exec_preinit<S: AsRef<str>>(&self, argv: &[S]) -> Result<(), CmdlineError> {
        let mut args = argv.iter().map(|arg| arg.as_ref());
        while let Some(name) = args.next() {
            if name == LOAD_PLUGIN_ARG {
                let plugin = args
                    .next()
                    .ok_or_else(|| CmdlineError::MissingParam(LOAD_PLUGIN_ARG.to_string()))?;
                self.load_plugin(plugin);
            }
        }
        Ok(())
    }

    /// Runs the handlers of every registered argument present in `argv`.
    ///
    /// `argv` excludes the program name. Unregistered entries are ignored.
    pub fn exec<S: AsRef<str>>(&self, argv: &[S]) -> Result<(), CmdlineError> {
        let mut i = 0;
        while i < argv.len() {
            let name = argv[i].as_ref();
            i += 1;

            let arg = self
                .args
                .borrow()
                .iter()
                .find(|arg| arg.name == name)
                .cloned();
            let Some(arg) = arg else {
                continue;
            };

            let param = if arg.has_param {
                let value = argv
                    .get(i)
                    .map(|value| value.as_ref().to_string())
                    .ok_or_else(|| CmdlineError::MissingParam(arg.name.clone()))?;
                i += 1;
                Some(value)
            } else {
                None
            };

            match arg.handler {
                ArgHandler::Core => {}
                ArgHandler::LoadPlugin => {
                    if let Some(name) = param {
                        self.load_plugin(&name);
                    }
                }
                ArgHandler::Plugin(func) => {
                    let c_name = CString::new(arg.name.clone())
                        .map_err(|_| CmdlineError::Rejected(arg.name.clone()))?;
                    let c_param = param
                        .map(CString::new)
                        .transpose()
                        .map_err(|_| CmdlineError::Rejected(arg.name.clone()))?;
                    let params_ptr = c_param
                        .as_ref()
                        .map_or(std::ptr::null(), |param| param.as_ptr());

                    if !unsafe { func(c_name.as_ptr(), params_ptr) } {
                        return Err(CmdlineError::Rejected(arg.name));
                    }
                }
            }
        }
        Ok(())
    }

    /// Queues a plugin for the bulk load. Already queued names are ignored.
    pub fn load_plugin(&self, name: &str) {
        let mut plugins = self.plugins.borrow_mut();
        if !plugins.iter().any(|queued| queued.eq_ignore_ascii_case(name)) {
            plugins.push(name.to_string());
        }
    }

    /// Plugins queued from the command line, in order.
    pub fn plugins(&self) -> Vec<String> {
        self.plugins.borrow().clone()
    }

    pub fn args(&self) -> Vec<ArgInfo> {
        self.args
            .borrow()
            .iter()
            .map(|arg| ArgInfo {
                pid: arg.pid,
                name: arg.name.clone(),
                has_param: arg.has_param,
                help: arg.help.clone(),
            })
            .collect()
    }

    /// Drops plugin arguments and the queued plugin list; reserved names stay.
    pub fn clear(&self) {
        self.args.borrow_mut().retain(|arg| arg.pid == HPM_PID_CORE);
        self.plugins.borrow_mut().clear();
    }
}
