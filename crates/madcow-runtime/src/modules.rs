//! Builds the module registry from descriptors and configuration.

use tracing::{info, warn};

use madcow_core::{ModuleDescriptor, ModuleLoadContext, ModuleRegistry, find_descriptor};

use crate::config::ModulesConfig;
use crate::error::RuntimeResult;

/// Instantiates every module named in `config.enabled`.
///
/// Unknown names and modules whose factory fails are logged and skipped; the
/// bot still starts with whatever loaded. Effective options are the module's
/// declared options with `[modules.options.<name>]` and `modules.private`
/// applied.
pub async fn load_modules(
    table: &[ModuleDescriptor],
    bot_name: &str,
    config: &ModulesConfig,
) -> RuntimeResult<ModuleRegistry> {
    let mut builder = ModuleRegistry::builder();

    for name in &config.enabled {
        let Some(descriptor) = find_descriptor(table, name) else {
            warn!(module = %name, "Unknown module, skipping");
            continue;
        };

        let ctx = ModuleLoadContext::new(bot_name, config.section(name));
        let module = match descriptor.instantiate(ctx).await {
            Ok(module) => module,
            Err(e) => {
                warn!(module = %name, error = %e, "Failed to load module, skipping");
                continue;
            }
        };

        let options = config.effective_options(name, module.options());
        builder = builder.register_with_options(name.as_str(), module, options)?;
    }

    let registry = builder.build();
    info!(modules = ?registry.names(), "Loaded modules");
    Ok(registry)
}
