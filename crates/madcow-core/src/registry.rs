//! The loaded-module registry.
//!
//! [`ModuleRegistry`] is built once at startup through [`RegistryBuilder`]
//! and never mutated afterwards. It keeps modules sorted by ascending
//! priority; modules with equal priority keep their registration order.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{RegistryError, RegistryResult};
use crate::module::{BoxedModule, ModuleOptions};

/// A module together with its name and effective options.
pub struct LoadedModule {
    name: String,
    module: BoxedModule,
    options: ModuleOptions,
}

impl LoadedModule {
    /// The module's registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The live module.
    pub fn module(&self) -> &BoxedModule {
        &self.module
    }

    /// The effective options (module defaults plus configuration overrides).
    pub fn options(&self) -> &ModuleOptions {
        &self.options
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Builder collecting modules before the registry is frozen.
#[derive(Default)]
pub struct RegistryBuilder {
    modules: Vec<LoadedModule>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module with the options it declares.
    pub fn register(self, name: impl Into<String>, module: BoxedModule) -> RegistryResult<Self> {
        let options = module.options();
        self.register_with_options(name, module, options)
    }

    /// Registers a module with explicit options.
    ///
    /// Disabled modules are dropped here, never at dispatch time.
    pub fn register_with_options(
        mut self,
        name: impl Into<String>,
        module: BoxedModule,
        options: ModuleOptions,
    ) -> RegistryResult<Self> {
        let name = name.into();
        if self.modules.iter().any(|m| m.name == name) {
            return Err(RegistryError::DuplicateModule(name));
        }
        if !options.enabled {
            info!(module = %name, "Module is disabled, not loading");
            return Ok(self);
        }

        debug!(module = %name, priority = options.priority, "Registered module");
        self.modules.push(LoadedModule {
            name,
            module,
            options,
        });
        Ok(self)
    }

    /// Freezes the registry, sorting by priority (stable).
    pub fn build(mut self) -> ModuleRegistry {
        self.modules.sort_by_key(|m| m.options.priority);
        let by_name = self
            .modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.name.clone(), i))
            .collect();

        ModuleRegistry {
            modules: self.modules.into_iter().map(Arc::new).collect(),
            by_name,
        }
    }
}

/// Read-only set of loaded modules in dispatch order.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: Vec<Arc<LoadedModule>>,
    by_name: HashMap<String, usize>,
}

impl ModuleRegistry {
    /// Starts building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Iterates modules in ascending priority order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<LoadedModule>> {
        self.modules.iter()
    }

    /// Looks up a module by name.
    pub fn get(&self, name: &str) -> Option<&Arc<LoadedModule>> {
        self.by_name.get(name).map(|&i| &self.modules[i])
    }

    /// Names in dispatch order.
    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Number of loaded modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if no modules are loaded.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Help text of every module in dispatch order, one line per entry.
    pub fn help_text(&self) -> String {
        self.modules
            .iter()
            .filter_map(|m| m.module().help())
            .flat_map(str::lines)
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.names())
            .finish()
    }
}
