//! Runtime orchestration.
//!
//! [`MadcowRuntime`] ties configuration, logging, module loading and the
//! dispatcher together.
//!
//! ```rust,ignore
//! use madcow_runtime::MadcowRuntime;
//!
//! let runtime = MadcowRuntime::builder()
//!     .config_file("madcow.toml")
//!     .profile("production")
//!     .build()
//!     .await?;
//! runtime.run_shell().await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tracing::{error, info};

use madcow_core::{BoxedSink, Dispatcher, OutputHandle};
use madcow_modules::BUILTIN_MODULES;

use crate::config::{ConfigLoader, LogLevel, MadcowConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;
use crate::modules::load_modules;
use crate::public_log::PublicLog;
use crate::shell::{self, WriterSink};

/// A configured bot: loaded modules behind a dispatcher.
pub struct MadcowRuntime {
    config: MadcowConfig,
    dispatcher: Arc<Dispatcher>,
}

impl MadcowRuntime {
    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Builds a runtime from an already loaded configuration.
    ///
    /// Validates the configuration and loads the built-in modules, but does
    /// not touch the global logging subscriber.
    pub async fn from_config(config: MadcowConfig, sink: BoxedSink) -> RuntimeResult<Self> {
        validate_config(&config)?;

        let registry = load_modules(BUILTIN_MODULES, &config.bot.name, &config.modules).await?;

        let mut builder = Dispatcher::builder(Arc::new(registry), OutputHandle::new(sink))
            .identity(config.bot.identity())
            .allow_threading(config.bot.allow_threading)
            .module_timeout(config.bot.module_timeout())
            .ignore(config.bot.ignore_list()?)
            .private_help(config.bot.private_help);
        if config.bot.log_public {
            info!(dir = %config.bot.public_log_dir.display(), "Logging public chatter");
            builder = builder.chatter_log(Arc::new(PublicLog::new(&config.bot.public_log_dir)));
        }
        let dispatcher = builder.build();
        dispatcher.resolver().validate()?;

        info!(
            bot = %config.bot.name,
            modules = dispatcher.registry().len(),
            threading = config.bot.allow_threading,
            "Runtime initialized"
        );

        Ok(Self {
            config,
            dispatcher: Arc::new(dispatcher),
        })
    }

    /// The effective configuration.
    pub fn config(&self) -> &MadcowConfig {
        &self.config
    }

    /// The dispatcher, for protocol adapters.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Runs the shell protocol on stdin until EOF, `quit`, Ctrl+C or SIGTERM.
    pub async fn run_shell(&self) -> RuntimeResult<()> {
        let nick = shell::default_nick();
        info!(nick = %nick, "Starting shell session, type 'quit' to exit");

        tokio::select! {
            result = shell::run_session(&self.dispatcher, tokio::io::stdin(), &nick) => {
                let handled = result?;
                info!(requests = handled, "Shell session closed");
            }
            _ = wait_for_shutdown() => {}
        }

        self.shutdown().await;
        Ok(())
    }

    /// Waits for in-flight worker tasks.
    pub async fn shutdown(&self) {
        let pending = self.dispatcher.active_workers();
        if pending > 0 {
            info!(pending, "Waiting for running modules to finish");
        }
        self.dispatcher.wait_idle().await;
        info!("Runtime stopped");
    }
}

/// Waits for Ctrl+C or, on Unix, SIGTERM.
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => error!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`MadcowRuntime`].
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    level_override: Option<LogLevel>,
    nick_override: Option<String>,
    sink: Option<BoxedSink>,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            level_override: None,
            nick_override: None,
            sink: None,
            init_logging: true,
        }
    }

    /// Loads this file instead of searching for one.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables `MADCOW_*` environment overrides.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration programmatically (highest precedence).
    pub fn merge(mut self, config: MadcowConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Replaces the configured log level.
    pub fn level_override(mut self, level: Option<LogLevel>) -> Self {
        self.level_override = level;
        self
    }

    /// Replaces the configured bot name.
    pub fn nick(mut self, nick: Option<String>) -> Self {
        self.nick_override = nick;
        self
    }

    /// Sends output somewhere other than stdout.
    pub fn sink(mut self, sink: BoxedSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Leaves the global logging subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Loads configuration, initializes logging and builds the runtime.
    pub async fn build(self) -> RuntimeResult<MadcowRuntime> {
        let mut config = self.config_loader.load()?;
        if let Some(level) = self.level_override {
            config.logging.level = level;
        }
        if let Some(nick) = self.nick_override {
            config.bot.name = nick;
        }

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(WriterSink::new(tokio::io::stdout())) as BoxedSink);
        MadcowRuntime::from_config(config, sink).await
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
