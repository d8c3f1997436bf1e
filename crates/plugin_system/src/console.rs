//! Plugin-registered console commands.

use crate::error::RegistryError;
use hpm_abi::ConsoleCommandFn;
use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_uint;

/// Command name reserved for the loaded-plugins listing.
pub const PLUGINS_COMMAND: &str = "plugins";

#[derive(Debug, Clone)]
struct ConsoleCommand {
    pid: c_uint,
    name: String,
    func: ConsoleCommandFn,
}

#[derive(Debug, Default)]
pub struct ConsoleCommands {
    commands: RefCell<Vec<ConsoleCommand>>,
}

/// Splits a console line into its command word and the remaining text.
pub fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim_start()),
        None => (line, ""),
    }
}

impl ConsoleCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`. Names are single words, unique regardless of case.
    pub fn add_command(&self, name: &str, func: ConsoleCommandFn, pid: c_uint) -> Result<(), RegistryError> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(RegistryError::InvalidCommand(name.to_string()));
        }
        let mut commands = self.commands.borrow_mut();
        if name.eq_ignore_ascii_case(PLUGINS_COMMAND)
            || commands.iter().any(|cmd| cmd.name.eq_ignore_ascii_case(name))
        {
            return Err(RegistryError::DuplicateCommand(name.to_string()));
        }

        commands.push(ConsoleCommand {
            pid,
            name: name.to_string(),
            func,
        });
        Ok(())
    }

    /// Runs the plugin command named by the first word of `line`.
    ///
    /// Returns `false` when no plugin registered that command.
    pub fn run(&self, line: &str) -> bool {
        let (name, rest) = split_command(line);
        let func = self
            .commands
            .borrow()
            .iter()
            .find(|cmd| cmd.name.eq_ignore_ascii_case(name))
            .map(|cmd| cmd.func);

        let Some(func) = func else {
            return false;
        };
        // Interior nul bytes cannot come from a console line; drop them if they do.
        let rest = CString::new(rest.replace('\0', "")).unwrap_or_default();
        unsafe { func(rest.as_ptr()) };
        true
    }

    /// Registered command names and their owners.
    pub fn commands(&self) -> Vec<(String, c_uint)> {
        self.commands
            .borrow()
            .iter()
            .map(|cmd| (cmd.name.clone(), cmd.pid))
            .collect()
    }

    pub fn clear(&self) {
        self.commands.borrow_mut().clear();
    }
}
