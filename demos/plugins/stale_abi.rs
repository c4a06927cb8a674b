//! Plugin library built against a different plugin ABI
use extractparser::plugins::declaration::ABI_VERSION;
use extractparser::plugins::{PluginDeclaration, PluginRegistrar};

fn register(_registrar: &mut dyn PluginRegistrar) {}

#[allow(non_upper_case_globals)]
#[no_mangle]
pub static plugin_declaration: PluginDeclaration = PluginDeclaration {
    abi_version: ABI_VERSION + 1,
    core_version: env!("CARGO_PKG_VERSION"),
    register,
};
