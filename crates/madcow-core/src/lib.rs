//! # Madcow Core
//!
//! Protocol-independent heart of the madcow chat bot.
//!
//! This crate provides:
//! - The [`Request`] model handed to every module
//! - The [`Module`] contract and [`ModuleDescriptor`] factories
//! - Addressing resolution (`madcow: ...`, `madcow?`, `no, madcow, ...`)
//! - The priority-ordered [`ModuleRegistry`]
//! - The [`Dispatcher`] with its serialised [`OutputHandle`]
//!
//! Protocol adapters build a `Request` per incoming line, hand it to
//! [`Dispatcher::process`] and implement [`OutputSink`] to deliver replies.

pub mod addressing;
pub mod chatter;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod module;
pub mod output;
pub mod pattern;
pub mod registry;
pub mod request;

pub use addressing::{Addressing, AddressingResolver, BotIdentity};
pub use chatter::{BoxedChatterLog, ChatterLog};
pub use descriptor::{CreateFn, ModuleDescriptor, ModuleLoadContext, find_descriptor};
pub use dispatcher::{DispatchOutcome, Dispatcher, DispatcherBuilder, FEEDBACK_REPLY, IgnoreList};
pub use error::{
    AddressingError, AddressingResult, DispatchError, DispatchResult, ModuleError, ModuleResult,
    RegistryError, RegistryResult, SinkError, SinkResult,
};
pub use module::{BoxedModule, DEFAULT_PRIORITY, Module, ModuleOptions};
pub use output::{BoxedSink, OutputHandle, OutputSink};
pub use pattern::{MatchArgs, Pattern};
pub use registry::{LoadedModule, ModuleRegistry, RegistryBuilder};
pub use request::Request;
