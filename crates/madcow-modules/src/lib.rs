//! Built-in modules shipped with madcow.
//!
//! | Module | Trigger | Description |
//! |--------|---------|-------------|
//! | [`JINX_MODULE`] | any line | Calls jinx when two people say the same thing |
//! | [`LEARN_MODULE`] | `set <db> <nick> <val>` | Stores per-nick facts |
//!
//! # Loading
//!
//! The runtime loads every entry of [`BUILTIN_MODULES`] that is listed in
//! `modules.enabled`:
//!
//! ```toml
//! [modules]
//! enabled = ["jinx", "learn"]
//! ```

pub mod jinx;
pub mod learn;

use madcow_core::ModuleDescriptor;

pub use jinx::{JINX_MODULE, Jinx, JinxConfig};
pub use learn::{LEARN_MODULE, Learn, LearnConfig};

/// Every built-in module, in no particular order (the registry sorts them).
pub static BUILTIN_MODULES: &[ModuleDescriptor] = &[JINX_MODULE, LEARN_MODULE];
