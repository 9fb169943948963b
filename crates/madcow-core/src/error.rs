//! Error types for the madcow core.
//!
//! Module-level failures ([`ModuleError`]) never leave the dispatcher; they
//! are logged and treated as "no response". Only addressing configuration
//! errors and sink failures cross the dispatcher boundary as
//! [`DispatchError`].

use std::time::Duration;

use thiserror::Error;

// =============================================================================
// Addressing Errors
// =============================================================================

/// Errors raised while compiling the addressing rules for the bot identity.
#[derive(Debug, Clone, Error)]
pub enum AddressingError {
    /// The bot has no display name to be addressed by.
    #[error("bot name is empty")]
    EmptyName,

    /// The bot name (or one of its aliases) could not be compiled into a rule.
    #[error("cannot build addressing rules for '{name}': {source}")]
    InvalidName {
        /// The offending name set.
        name: String,
        /// Underlying regex compilation error.
        #[source]
        source: regex::Error,
    },
}

/// Result type for addressing operations.
pub type AddressingResult<T> = Result<T, AddressingError>;

// =============================================================================
// Sink Errors
// =============================================================================

/// Errors produced by an [`OutputSink`](crate::output::OutputSink).
#[derive(Debug, Error)]
pub enum SinkError {
    /// Underlying transport write failed.
    #[error("output I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport is gone.
    #[error("output sink closed")]
    Closed,

    /// Any other sink-specific failure.
    #[error("{0}")]
    Other(String),
}

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

// =============================================================================
// Module Errors
// =============================================================================

/// Errors a module may return from `response()` or from its factory.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Free-form failure description.
    #[error("{0}")]
    Message(String),

    /// I/O failure (files, sockets).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The invocation exceeded the configured deadline.
    #[error("module did not answer within {0:?}")]
    Timeout(Duration),
}

impl ModuleError {
    /// Creates a free-form module error.
    pub fn msg(msg: impl Into<String>) -> Self {
        Self::Message(msg.into())
    }
}

/// Result type for module operations.
pub type ModuleResult<T> = Result<T, ModuleError>;

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors raised while building a [`ModuleRegistry`](crate::registry::ModuleRegistry).
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// Two modules were registered under the same name.
    #[error("module '{0}' is already registered")]
    DuplicateModule(String),

    /// A module name has no descriptor.
    #[error("unknown module '{0}'")]
    UnknownModule(String),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

// =============================================================================
// Dispatch Errors
// =============================================================================

/// Errors that abort a dispatch pass and are returned to the protocol adapter.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The addressing rules could not be built for the current bot name.
    #[error("addressing failed: {0}")]
    Addressing(#[from] AddressingError),

    /// The output sink failed while delivering an inline response.
    #[error("output failed: {0}")]
    Sink(#[from] SinkError),
}

/// Result type for dispatch operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
