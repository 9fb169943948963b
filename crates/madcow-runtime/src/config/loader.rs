//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`madcow.{profile}.toml`)
//! 3. Main config file (`madcow.toml`, or `config.toml`)
//! 4. Environment variables (`MADCOW_*`)
//! 5. Programmatic overrides
//!
//! Files are searched in the current directory and then in the user config
//! directory (`~/.config/madcow` on Linux). An explicit [`ConfigLoader::file`]
//! replaces the search and must exist.
//!
//! # Environment Variable Mapping
//!
//! Environment variables use the `MADCOW_` prefix with `__` as separator:
//!
//! - `MADCOW_BOT__NAME=cow` -> `bot.name = "cow"`
//! - `MADCOW_LOGGING__LEVEL=debug` -> `logging.level = "debug"`
//! - `MADCOW_MODULES__CONFIG__LEARN__DATA_FILE=/tmp/l.json` -> `modules.config.learn.data_file`
//!
//! # Example
//!
//! ```rust,ignore
//! use madcow_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./madcow.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::MadcowConfig;

/// Names searched for in every search path, in order.
const CONFIG_FILE_NAMES: &[&str] = &["madcow.toml", "config.toml"];

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    /// Development profile (default).
    #[default]
    Development,
    /// Production profile.
    Production,
    /// Custom profile name.
    Custom(String),
}

impl Profile {
    /// Returns the profile name as a string.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `prod`/`dev` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `MADCOW_PROFILE`, defaulting to Development.
    pub fn from_env() -> Self {
        std::env::var("MADCOW_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration loader with figment-based multi-source support.
pub struct ConfigLoader {
    figment: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a new configuration loader with defaults.
    pub fn new() -> Self {
        Self {
            figment: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Sets a specific configuration file to load.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: MadcowConfig) -> Self {
        self.figment = self.figment.merge(Serialized::defaults(config));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<MadcowConfig> {
        let profile = self.profile.clone();
        let figment = self.build_figment()?;

        let config: MadcowConfig = figment
            .extract()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!(
            profile = %profile,
            bot = %config.bot.name,
            modules = config.modules.enabled.len(),
            "Configuration loaded"
        );

        Ok(config)
    }

    fn build_figment(mut self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(MadcowConfig::default()));

        if let Some(path) = self.config_file.take() {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path));
            }
            figment = self.merge_profile_sibling(figment, &path);
            info!(path = %path.display(), "Loading configuration file");
            figment = figment.merge(Toml::file(&path));
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!("Loading environment variables with MADCOW_ prefix");
            figment = figment.merge(Env::prefixed("MADCOW_").split("__"));
        }

        let overrides = std::mem::take(&mut self.figment);
        Ok(figment.merge(overrides))
    }

    /// For `dir/madcow.toml`, merges `dir/madcow.<profile>.toml` if present.
    fn merge_profile_sibling(&self, figment: Figment, path: &Path) -> Figment {
        let (Some(stem), Some(ext)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.extension().and_then(|e| e.to_str()),
        ) else {
            return figment;
        };

        let profile_path = path.with_file_name(format!("{stem}.{}.{ext}", self.profile));
        if profile_path.exists() {
            debug!(path = %profile_path.display(), "Loading profile-specific config");
            figment.merge(Toml::file(profile_path))
        } else {
            figment
        }
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }

        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("madcow"));
        }
        paths
    }

    /// Loads the first config file found, preceded by its profile sibling.
    fn load_config_files(&self, figment: Figment) -> Figment {
        for search_path in self.resolve_search_paths() {
            for name in CONFIG_FILE_NAMES {
                let path = search_path.join(name);
                if path.exists() {
                    let figment = self.merge_profile_sibling(figment, &path);
                    info!(path = %path.display(), "Loading configuration file");
                    return figment.merge(Toml::file(path));
                }
            }
        }

        warn!("No configuration file found, using defaults");
        figment
    }
}
