//! Configuration validation utilities.

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, LogOutput, LoggingConfig, MadcowConfig, ModulesConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &MadcowConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_logging_config(&config.logging)?;
    validate_modules_config(&config.modules)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.name.trim().is_empty() {
        return Err(ConfigError::missing_field("bot.name"));
    }

    if bot.name.chars().any(char::is_whitespace) {
        return Err(ConfigError::validation("Bot name cannot contain whitespace"));
    }

    if bot.aliases.iter().any(|a| a.trim().is_empty()) {
        return Err(ConfigError::validation("Bot aliases cannot be empty"));
    }

    // Compiling is the only way to know the patterns are valid.
    bot.ignore_list()?;

    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.filters.keys().any(|target| target.trim().is_empty()) {
        return Err(ConfigError::validation("Log filter targets cannot be empty"));
    }

    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }

    Ok(())
}

fn validate_modules_config(modules: &ModulesConfig) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for name in &modules.enabled {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateModule(name.clone()));
        }
    }
    Ok(())
}
