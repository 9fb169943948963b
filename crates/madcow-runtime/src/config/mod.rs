//! Configuration module for the madcow runtime.
//!
//! This module provides TOML-based configuration loading and validation for
//! the bot identity, logging and module selection.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    BotConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, MadcowConfig,
    ModuleOverrides, ModulesConfig, SpanEventConfig,
};
pub use validation::validate_config;
