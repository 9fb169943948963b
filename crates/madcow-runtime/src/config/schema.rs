//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use madcow_core::{BotIdentity, IgnoreList, ModuleOptions};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MadcowConfig {
    /// Identity and dispatch settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Which modules to load and how.
    #[serde(default)]
    pub modules: ModulesConfig,
}

// =============================================================================
// Bot
// =============================================================================

/// The `[bot]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Display name the bot answers to.
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Extra names the bot answers to.
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Global switch for running modules on worker tasks.
    #[serde(default = "default_true")]
    pub allow_threading: bool,

    /// Nicks whose lines are dropped (case-insensitive).
    #[serde(default)]
    pub ignore_nicks: Vec<String>,

    /// Regular expressions; matching lines are dropped.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,

    /// Deadline for a single module invocation in milliseconds; `0` disables it.
    #[serde(default)]
    pub module_timeout_ms: u64,

    /// Answer `help` in a private message to the asker.
    #[serde(default = "default_true")]
    pub private_help: bool,

    /// Keep per-channel daily transcripts of public chatter.
    #[serde(default)]
    pub log_public: bool,

    /// Where public transcripts are written.
    #[serde(default = "default_public_log_dir")]
    pub public_log_dir: PathBuf,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            aliases: Vec::new(),
            allow_threading: true,
            ignore_nicks: Vec::new(),
            ignore_patterns: Vec::new(),
            module_timeout_ms: 0,
            private_help: true,
            log_public: false,
            public_log_dir: default_public_log_dir(),
        }
    }
}

impl BotConfig {
    /// The addressing identity.
    pub fn identity(&self) -> BotIdentity {
        BotIdentity::new(self.name.clone()).with_aliases(self.aliases.iter().cloned())
    }

    /// The module deadline, if any.
    pub fn module_timeout(&self) -> Option<Duration> {
        (self.module_timeout_ms > 0).then(|| Duration::from_millis(self.module_timeout_ms))
    }

    /// Compiles the ignore nicks and patterns.
    pub fn ignore_list(&self) -> ConfigResult<IgnoreList> {
        let patterns = self
            .ignore_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|source| ConfigError::InvalidPattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<ConfigResult<Vec<_>>>()?;
        Ok(IgnoreList::new(&self.ignore_nicks, patterns))
    }
}

fn default_bot_name() -> String {
    "madcow".to_string()
}

fn default_public_log_dir() -> PathBuf {
    PathBuf::from("logs/public")
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Structured JSON (requires the `json-log` feature, otherwise `full`).
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// The `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Per-target levels, e.g. `madcow_core = "trace"`.
    pub filters: HashMap<String, LogLevel>,
    pub span_events: SpanEventConfig,
    pub thread_ids: bool,
    /// Include file and line of the call site.
    pub file_location: bool,
    /// Log file, required when `output = "file"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            filters: HashMap::new(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::Never,
        }
    }
}

// =============================================================================
// Modules
// =============================================================================

/// The `[modules]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// Modules to load, by descriptor name.
    pub enabled: Vec<String>,

    /// Modules that only answer private messages.
    pub private: Vec<String>,

    /// Per-module option overrides (`[modules.options.<name>]`).
    pub options: HashMap<String, ModuleOverrides>,

    /// Per-module configuration sections (`[modules.config.<name>]`).
    pub config: HashMap<String, serde_json::Value>,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            enabled: vec!["jinx".to_string(), "learn".to_string()],
            private: Vec::new(),
            options: HashMap::new(),
            config: HashMap::new(),
        }
    }
}

impl ModulesConfig {
    /// Applies overrides and the private list to a module's declared options.
    pub fn effective_options(&self, name: &str, declared: ModuleOptions) -> ModuleOptions {
        let mut options = match self.options.get(name) {
            Some(overrides) => overrides.apply(declared),
            None => declared,
        };
        if self.private.iter().any(|p| p == name) {
            options.private_only = true;
        }
        options
    }

    /// The raw configuration section for `name`, or `Null`.
    pub fn section(&self, name: &str) -> serde_json::Value {
        self.config
            .get(name)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}

/// Option overrides for one module. Unset fields keep the module's value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_addressing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminate: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_threading: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_only: Option<bool>,
}

impl ModuleOverrides {
    pub fn apply(&self, mut options: ModuleOptions) -> ModuleOptions {
        if let Some(v) = self.enabled {
            options.enabled = v;
        }
        if let Some(v) = self.require_addressing {
            options.require_addressing = v;
        }
        if let Some(v) = self.priority {
            options.priority = v;
        }
        if let Some(v) = self.terminate {
            options.terminate = v;
        }
        if let Some(v) = self.allow_threading {
            options.allow_threading = v;
        }
        if let Some(v) = self.private_only {
            options.private_only = v;
        }
        options
    }
}
