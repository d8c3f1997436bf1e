//! Command-line interface handling for the plugin host.
//!
//! Only the host's own options are parsed here. Plugins register further
//! `--flags` at load time; those are tolerated by clap and later executed by
//! the manager's argument registry against the raw argument list.

use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

/// Options the host itself understands, with help text for the argument
/// registry's reservation table.
pub const HOST_ARGS: [(&str, bool, &str); 4] = [
    ("--config", true, "Configuration file path"),
    ("--server-type", true, "Server role (login, char, map)"),
    ("--log-level", true, "Log level (trace, debug, info, warn, error)"),
    ("--json-logs", false, "Output logs in JSON format"),
];

/// Command line arguments parsed from user input.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the server role
    pub server_type: Option<String>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Everything after the program name, for the argument registry
    pub raw: Vec<String>,
}

fn command() -> Command {
    Command::new("hpm-server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Server host with native plugin support")
        .ignore_errors(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("hpm.toml"),
        )
        .arg(
            Arg::new("server-type")
                .short('t')
                .long("server-type")
                .value_name("ROLE")
                .help("Server role (login, char, map)"),
        )
        .arg(
            // Queued by the argument registry, declared here for --help.
            Arg::new("load-plugin")
                .long("load-plugin")
                .value_name("NAME")
                .help("Load an additional plugin by name")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level (trace, debug, info, warn, error)"),
        )
        .arg(
            Arg::new("json-logs")
                .long("json-logs")
                .help("Output logs in JSON format")
                .action(ArgAction::SetTrue),
        )
}

impl CliArgs {
    /// Parses the process arguments.
    pub fn parse() -> Self {
        Self::parse_from(std::env::args())
    }

    /// Parses `argv`, program name first.
    pub fn parse_from<I, T>(argv: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let argv: Vec<String> = argv.into_iter().map(Into::into).collect();
        let matches = command().get_matches_from(&argv);

        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("hpm.toml")),
            server_type: matches.get_one::<String>("server-type").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            raw: argv.into_iter().skip(1).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["hpm-server"]);
        assert_eq!(args.config_path, PathBuf::from("hpm.toml"));
        assert_eq!(args.server_type, None);
        assert_eq!(args.log_level, None);
        assert!(!args.json_logs);
        assert!(args.raw.is_empty());
    }

    #[test]
    fn test_host_options() {
        let args = CliArgs::parse_from([
            "hpm-server",
            "--config",
            "conf/map.toml",
            "-t",
            "login",
            "--log-level",
            "debug",
            "--json-logs",
            "--load-plugin",
            "sample",
        ]);
        assert_eq!(args.config_path, PathBuf::from("conf/map.toml"));
        assert_eq!(args.server_type.as_deref(), Some("login"));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.raw.len(), 9);
        assert_eq!(args.raw[0], "--config");
    }

    #[test]
    fn test_host_args_match_command() {
        let command = command();
        for (name, _, _) in HOST_ARGS {
            let long = name.trim_start_matches("--");
            assert!(command.get_arguments().any(|arg| arg.get_long() == Some(long)));
        }
    }
}
