//! Madcow Runtime - orchestration layer for the madcow chat bot.
//!
//! This crate provides:
//! - Layered TOML/env configuration (`ConfigLoader`, `MadcowConfig`)
//! - Logging setup (`LoggingBuilder`)
//! - Module loading from descriptor tables (`load_modules`)
//! - Per-channel transcripts of public chatter (`PublicLog`)
//! - The interactive shell protocol (`shell`)
//! - `MadcowRuntime`, which wires all of the above to a `Dispatcher`
//!
//! ```rust,ignore
//! use madcow_runtime::MadcowRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = MadcowRuntime::builder().build().await?;
//!     runtime.run_shell().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod modules;
pub mod public_log;
pub mod runtime;
pub mod shell;

pub use config::{ConfigError, ConfigLoader, ConfigResult, LogLevel, MadcowConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use modules::load_modules;
pub use public_log::PublicLog;
pub use runtime::{MadcowRuntime, RuntimeBuilder, wait_for_shutdown};
pub use shell::{WriterSink, run_session};
