//! Plugin host: contract, discovery, compatibility filtering and lifecycle
use std::any::Any;

pub mod compat;
pub mod declaration;
pub mod discovery;
pub mod manager;
pub mod plugin_trait;

pub use declaration::{PluginDeclaration, PluginRegistrar, PluginType};
pub use discovery::{Discovery, DiscoveryEngine, DiscoveryFailure, DynamicLibraryLoader, ModuleLoader};
pub use manager::{LoadOutcome, LoadReport, LoadedPlugin, PluginCounts, PluginListing, PluginManager, UnloadOutcome};
pub use plugin_trait::{ForensicPlugin, PluginArgs, PluginMetadata, PluginStatus, TargetOs};

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
