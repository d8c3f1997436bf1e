//! Main application entry point for the plugin host
//!
//! Loads the configuration, installs the plugin manager, loads the configured
//! plugins and drives their lifecycle events around a console loop until a
//! shutdown signal arrives.

mod cli;
mod config;
mod signals;

use anyhow::Context;
use hpm_abi::{ConfCategory, EventKind, DATACHECK_VERSION, HPM_VERSION_NUL};
use plugin_system::datacheck::CORE_DATACHECK;
use plugin_system::{host, PluginManager};
use std::ffi::CString;
use std::os::raw::c_void;
use std::rc::Rc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{CliArgs, HOST_ARGS};
use config::{AppConfig, LoggingSettings};

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(config: &LoggingSettings) -> anyhow::Result<()> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_format {
        registry
            .with(fmt::layer().json().with_file(false).with_line_number(false))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_ansi(true).with_file(false).with_line_number(false))
            .try_init()?;
    }

    debug!("Logging initialized with level: {}", log_level);
    Ok(())
}

// ============================================================================
// Application
// ============================================================================

pub struct Application {
    config: AppConfig,
    args: CliArgs,
    manager: Rc<PluginManager>,
    /// Shared with plugins as `server_name`; lives as long as the manager.
    server_name: CString,
}

impl Application {
    pub async fn new(args: CliArgs) -> anyhow::Result<Self> {
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        if let Some(server_type) = &args.server_type {
            config.server.server_type = server_type.clone();
        }
        if let Some(log_level) = &args.log_level {
            config.logging.level = log_level.clone();
        }
        if args.json_logs {
            config.logging.json_format = true;
        }

        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Configuration validation failed: {}", e))?;

        setup_logging(&config.logging)?;

        let server_name = CString::new(config.server.name.clone())
            .context("server name contains a NUL byte")?;

        let manager = host::install(
            PluginManager::new(config.server_type())
                .with_plugin_dir(config.plugin_dir())
                .with_conf_paths(config.conf_paths()),
        );
        unsafe { manager.datacheck_init(&CORE_DATACHECK, DATACHECK_VERSION) };

        info!(
            "Config: {} | Role: {} | Plugins: {}",
            args.config_path.display(),
            config.server.server_type,
            config.plugins.directory
        );

        Ok(Self {
            config,
            args,
            manager,
            server_name,
        })
    }

    fn share_symbols(&self) {
        self.manager
            .share(self.server_name.as_ptr() as *mut c_void, "server_name");
        self.manager
            .share(HPM_VERSION_NUL.as_ptr() as *mut c_void, "hpm_version");
    }

    /// Reserves the host's own flags and queues `--load-plugin` names.
    fn preinit_cmdline(&self) -> anyhow::Result<()> {
        for (name, has_param, help) in HOST_ARGS {
            self.manager.cmdline().reserve(name, has_param, help)?;
        }
        self.manager.cmdline().exec_preinit(&self.args.raw)?;
        Ok(())
    }

    /// Offers battle settings to plugin listeners.
    fn offer_settings(&self) {
        for (key, value) in self.config.battle_settings() {
            let Ok(value) = CString::new(value) else {
                warn!("Setting '{}' contains a NUL byte, ignoring", key);
                continue;
            };
            if !self.manager.parse_conf(&key, &value, ConfCategory::BATTLE) {
                warn!("Unknown setting '{}' in [battle]", key);
            }
        }
    }

    fn console_line(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if !self.manager.run_command(line) {
            warn!("Unknown console command '{}'", line);
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        self.share_symbols();
        self.preinit_cmdline()?;

        let loaded = self.manager.config_read();
        debug!("{} plugins loaded", loaded);

        self.manager.event(EventKind::PreInit);
        // Plugin flags are registered by now.
        if let Err(e) = self.manager.cmdline().exec(&self.args.raw) {
            self.shutdown();
            return Err(e).context("command line rejected");
        }
        self.manager.event(EventKind::Init);
        self.offer_settings();
        self.manager.event(EventKind::Ready);

        info!("Server '{}' is now running", self.config.server.name);
        info!("Type 'plugins' to list loaded plugins, Ctrl+C to shut down");

        let result = self.console_loop().await;
        self.shutdown();
        result
    }

    async fn console_loop(&self) -> anyhow::Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let shutdown = signals::wait_for_shutdown();
        tokio::pin!(shutdown);
        let mut stdin_open = true;

        loop {
            tokio::select! {
                result = &mut shutdown => return result,
                line = lines.next_line(), if stdin_open => match line? {
                    Some(line) => self.console_line(&line),
                    None => stdin_open = false,
                },
            }
        }
    }

    fn shutdown(&self) {
        info!("Shutting down...");
        self.manager.event(EventKind::Final);
        self.manager.event(EventKind::PostFinal);

        self.manager.shutdown();
        self.manager.datacheck_final();

        let leaks = self.manager.memory().report_leaks();
        if leaks > 0 {
            warn!("{} plugin allocations were never freed", leaks);
        }
        self.manager.memdown();
        host::uninstall();
        info!("Shutdown complete");
    }
}

// ============================================================================
// Entry Point
// ============================================================================

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // The manager is bound to this thread, so everything runs on it.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(async {
        let app = Application::new(args).await?;
        app.run().await
    });

    // A pending stdin read would otherwise keep the runtime alive.
    runtime.shutdown_background();
    result
}
