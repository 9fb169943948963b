//! The module contract.
//!
//! A [`Module`] is one capability of the bot: a trigger [`Pattern`], a set of
//! [`ModuleOptions`] controlling how the dispatcher treats it, optional help
//! text, and an async `response` operation.
//!
//! # Example
//!
//! ```rust,ignore
//! use madcow_core::{MatchArgs, Module, ModuleResult, Pattern, Request};
//!
//! struct Ping {
//!     pattern: Pattern,
//! }
//!
//! #[async_trait::async_trait]
//! impl Module for Ping {
//!     fn pattern(&self) -> &Pattern {
//!         &self.pattern
//!     }
//!
//!     fn help(&self) -> Option<&str> {
//!         Some("ping - pong")
//!     }
//!
//!     async fn response(&self, _args: &MatchArgs, _req: &Request) -> ModuleResult<Option<String>> {
//!         Ok(Some("pong".into()))
//!     }
//! }
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModuleResult;
use crate::pattern::{MatchArgs, Pattern};
use crate::request::Request;

/// Priority most modules run at.
pub const DEFAULT_PRIORITY: i32 = 50;

/// How the dispatcher treats a module.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `enabled` | `true` |
/// | `require_addressing` | `true` |
/// | `priority` | `50` |
/// | `terminate` | `true` |
/// | `allow_threading` | `true` |
/// | `private_only` | `false` |
///
/// A module that matches everything ([`Pattern::Any`]) should not terminate,
/// or should run late enough that other modules get a chance first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleOptions {
    /// Disabled modules are dropped at load time.
    pub enabled: bool,
    /// Only a candidate when the request is addressed to the bot.
    pub require_addressing: bool,
    /// Sort key; lower runs first.
    pub priority: i32,
    /// Stop scanning after this module matches.
    pub terminate: bool,
    /// Run `response` on a worker task when threading is globally allowed.
    pub allow_threading: bool,
    /// Only a candidate for private requests.
    pub private_only: bool,
}

impl Default for ModuleOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            require_addressing: true,
            priority: DEFAULT_PRIORITY,
            terminate: true,
            allow_threading: true,
            private_only: false,
        }
    }
}

impl ModuleOptions {
    /// Sets `require_addressing`.
    pub fn require_addressing(mut self, value: bool) -> Self {
        self.require_addressing = value;
        self
    }

    /// Sets `priority`.
    pub fn priority(mut self, value: i32) -> Self {
        self.priority = value;
        self
    }

    /// Sets `terminate`.
    pub fn terminate(mut self, value: bool) -> Self {
        self.terminate = value;
        self
    }

    /// Sets `allow_threading`.
    pub fn allow_threading(mut self, value: bool) -> Self {
        self.allow_threading = value;
        self
    }

    /// Sets `private_only`.
    pub fn private_only(mut self, value: bool) -> Self {
        self.private_only = value;
        self
    }

    /// Sets `enabled`.
    pub fn enabled(mut self, value: bool) -> Self {
        self.enabled = value;
        self
    }
}

/// A unit of bot capability.
///
/// Modules are created once at startup and live for the process lifetime.
/// The dispatcher may call `response` concurrently on the same instance for
/// overlapping requests, so any mutable state must sit behind a lock.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// The trigger rule tested against the request message.
    fn pattern(&self) -> &Pattern;

    /// Dispatch options. Configuration may override these at load time.
    fn options(&self) -> ModuleOptions {
        ModuleOptions::default()
    }

    /// Multi-line help text contributed to the `help` built-in.
    fn help(&self) -> Option<&str> {
        None
    }

    /// Produces the reply for a matched request.
    ///
    /// `Ok(None)` and `Ok(Some(""))` both mean "nothing to say". Errors are
    /// logged by the dispatcher and never reach the user.
    async fn response(&self, args: &MatchArgs, req: &Request) -> ModuleResult<Option<String>>;
}

/// A shared, type-erased module.
pub type BoxedModule = Arc<dyn Module>;
