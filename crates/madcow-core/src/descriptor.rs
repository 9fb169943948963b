//! Module descriptors: the static, `Copy` handle used to instantiate modules.

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ModuleResult;
use crate::module::BoxedModule;

/// Async factory stored in a [`ModuleDescriptor`].
pub type CreateFn = fn(ModuleLoadContext) -> BoxFuture<'static, ModuleResult<BoxedModule>>;

/// Context passed to a module factory.
///
/// Carries the bot's display name and the module's raw configuration section
/// (`[modules.config.<name>]`), or `Value::Null` when the section is absent.
#[derive(Debug, Clone)]
pub struct ModuleLoadContext {
    bot_name: String,
    config: Value,
}

impl ModuleLoadContext {
    /// Creates a load context.
    pub fn new(bot_name: impl Into<String>, config: Value) -> Self {
        Self {
            bot_name: bot_name.into(),
            config,
        }
    }

    /// The bot's display name at load time.
    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// The raw configuration section.
    pub fn raw_config(&self) -> &Value {
        &self.config
    }

    /// Deserialises the configuration section, falling back to `T::default()`
    /// when the section is absent.
    pub fn get_config<T>(&self) -> serde_json::Result<T>
    where
        T: DeserializeOwned + Default,
    {
        if self.config.is_null() {
            return Ok(T::default());
        }
        T::deserialize(&self.config)
    }
}

/// Static descriptor that names a module and knows how to build it.
///
/// ```rust,ignore
/// pub static PING: ModuleDescriptor = ModuleDescriptor {
///     name: "ping",
///     desc: "answers ping with pong",
///     create: |_ctx| Box::pin(async { Ok(Arc::new(Ping::new()) as BoxedModule) }),
/// };
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ModuleDescriptor {
    /// Stable name used in configuration and logs.
    pub name: &'static str,
    /// One-line description.
    pub desc: &'static str,
    /// Factory creating the live module.
    pub create: CreateFn,
}

impl ModuleDescriptor {
    /// Builds the live module.
    pub async fn instantiate(&self, ctx: ModuleLoadContext) -> ModuleResult<BoxedModule> {
        (self.create)(ctx).await
    }
}

/// Finds a descriptor by name in a static table.
pub fn find_descriptor<'a>(
    table: &'a [ModuleDescriptor],
    name: &str,
) -> Option<&'a ModuleDescriptor> {
    table.iter().find(|d| d.name == name)
}
