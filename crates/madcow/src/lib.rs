//! # Madcow
//!
//! A personal chat bot built around one idea: every line of chat is offered
//! to a list of modules, each with a regular expression. Modules whose
//! expression matches get to answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  Request  ┌────────────┐  priority order  ┌────────────────────┐
//! │ Protocol │──────────▶│ Dispatcher │─────────────────▶│ jinx  (inline)     │
//! │ (shell)  │           │            │─────────────────▶│ learn (inline)     │
//! └──────────┘           └────────────┘─────────────────▶│ ...   (worker task)│
//!       ▲                                                └─────────┬──────────┘
//!       └──────────────── OutputHandle (one message at a time) ◀───┘
//! ```
//!
//! - **Addressing**: `madcow: hi` is addressed, `madcow?` is a ping, and
//!   `no, madcow, ...` is a correction
//! - **Modules**: implement [`prelude::Module`]; built-ins live in `madcow_modules`
//! - **Runtime**: configuration, logging and the shell protocol
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use madcow::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = MadcowRuntime::builder().build().await?;
//!     runtime.run_shell().await?;
//!     Ok(())
//! }
//! ```

pub use madcow_core as core;
pub use madcow_modules as modules;
pub use madcow_runtime as runtime;

/// Commonly used types.
pub mod prelude {
    pub use madcow_core::{
        BotIdentity, BoxedModule, DispatchOutcome, Dispatcher, MatchArgs, Module, ModuleDescriptor,
        ModuleError, ModuleLoadContext, ModuleOptions, ModuleResult, OutputHandle, OutputSink,
        Pattern, Request,
    };
    pub use madcow_modules::BUILTIN_MODULES;
    pub use madcow_runtime::{LogLevel, MadcowConfig, MadcowRuntime, RuntimeError};
}
