//! Advisory platform filtering of discovered plugins
use crate::plugins::declaration::PluginType;
use crate::plugins::panic_message;
use crate::plugins::plugin_trait::{PluginMetadata, TargetOs};
use crate::services::Services;
use log::warn;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Read a type's metadata through a throwaway instance that is never
/// initialized or registered.
pub fn probe_metadata(
    plugin_type: &PluginType,
    services: &Arc<Services>,
) -> Result<PluginMetadata, String> {
    panic::catch_unwind(AssertUnwindSafe(|| {
        let probe = plugin_type.instantiate(Arc::clone(services));
        probe.metadata()
    }))
    .map_err(|payload| panic_message(&*payload))
}

/// Whether a list of target tags admits `target`.
pub fn targets_platform(target_os: &[TargetOs], target: TargetOs) -> bool {
    if target_os.contains(&TargetOs::Any) {
        return true;
    }
    if target == TargetOs::Unknown {
        return false;
    }
    target_os.contains(&target)
}

/// Whether `plugin_type` applies to extractions from `target`.
///
/// Plugins whose metadata cannot be read are reported compatible: this
/// filter only narrows what is shown to the examiner.
pub fn is_compatible(plugin_type: &PluginType, target: TargetOs, services: &Arc<Services>) -> bool {
    match probe_metadata(plugin_type, services) {
        Ok(metadata) => targets_platform(&metadata.target_os, target),
        Err(e) => {
            warn!(
                "Could not read metadata of {} ({}), treating as compatible",
                plugin_type.name(),
                e
            );
            true
        }
    }
}

/// The subset of `types` compatible with `target`. `TargetOs::Any` returns
/// every type without probing any of them.
pub fn get_compatible<'a>(
    types: &'a BTreeMap<String, PluginType>,
    target: TargetOs,
    services: &Arc<Services>,
) -> BTreeMap<&'a str, &'a PluginType> {
    types
        .iter()
        .filter(|(_, plugin_type)| {
            target == TargetOs::Any || is_compatible(plugin_type, target, services)
        })
        .map(|(name, plugin_type)| (name.as_str(), plugin_type))
        .collect()
}
