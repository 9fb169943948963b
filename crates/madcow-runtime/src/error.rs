//! Runtime error types.

use madcow_core::{AddressingError, DispatchError, RegistryError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while building or running the bot.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The module registry could not be built.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The bot identity cannot be used for addressing.
    #[error("Addressing error: {0}")]
    Addressing(#[from] AddressingError),

    /// A request could not be dispatched.
    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Reading input failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
