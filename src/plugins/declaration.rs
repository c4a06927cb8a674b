//! Plugin types and the declaration a plugin library exports to the host
use crate::plugins::plugin_trait::ForensicPlugin;
use crate::services::Services;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Bumped whenever `PluginDeclaration` or `ForensicPlugin` change shape.
pub const ABI_VERSION: u32 = 1;

pub type PluginConstructor = fn(Arc<Services>) -> Box<dyn ForensicPlugin>;

fn construct<T: ForensicPlugin + 'static>(services: Arc<Services>) -> Box<dyn ForensicPlugin> {
    Box::new(T::new(services))
}

/// Last path segment of a type name, without generic parameters.
fn short_type_name(full: &str) -> &str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A discovered plugin type: what the host needs to build instances of it.
#[derive(Clone)]
pub struct PluginType {
    name: String,
    constructor: PluginConstructor,
    module_id: String,
    origin: Option<PathBuf>,
    // Keeps the shared library mapped while this type or any instance built
    // from it is alive.
    library: Option<Arc<libloading::Library>>,
}

impl PluginType {
    /// Plugin type for `T`, named after the struct itself.
    pub fn of<T: ForensicPlugin + 'static>() -> Self {
        Self::with_name(short_type_name(std::any::type_name::<T>()), construct::<T>)
    }

    pub fn with_name(name: &str, constructor: PluginConstructor) -> Self {
        Self {
            name: name.to_string(),
            constructor,
            module_id: String::new(),
            origin: None,
            library: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of the module this type was discovered in.
    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// File this type was discovered in.
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn instantiate(&self, services: Arc<Services>) -> Box<dyn ForensicPlugin> {
        (self.constructor)(services)
    }

    pub(crate) fn located(mut self, module_id: &str, origin: &Path) -> Self {
        self.module_id = module_id.to_string();
        self.origin = Some(origin.to_path_buf());
        self
    }

    pub(crate) fn backed_by(mut self, library: Arc<libloading::Library>) -> Self {
        self.library = Some(library);
        self
    }

    /// Whether two records describe the same underlying type.
    pub fn same_type(&self, other: &PluginType) -> bool {
        self.name == other.name && self.constructor as usize == other.constructor as usize
    }
}

impl std::fmt::Debug for PluginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginType")
            .field("name", &self.name)
            .field("module_id", &self.module_id)
            .field("origin", &self.origin)
            .field("dynamic", &self.library.is_some())
            .finish()
    }
}

/// Collects the plugin types a module declares.
pub trait PluginRegistrar {
    fn register(&mut self, plugin_type: PluginType);
}

impl PluginRegistrar for Vec<PluginType> {
    fn register(&mut self, plugin_type: PluginType) {
        self.push(plugin_type);
    }
}

/// Static record exported by plugin libraries under `plugin_declaration`.
pub struct PluginDeclaration {
    pub abi_version: u32,
    pub core_version: &'static str,
    pub register: fn(&mut dyn PluginRegistrar),
}

/// Export plugin types from a `cdylib` so the host can discover them.
///
/// ```rust,ignore
/// extractparser::export_plugin!(DeviceInfo);
/// ```
///
/// When several types are listed the host uses the first one.
#[macro_export]
macro_rules! export_plugin {
    ($($plugin:ty),+ $(,)?) => {
        #[doc(hidden)]
        #[allow(non_upper_case_globals)]
        #[no_mangle]
        pub static plugin_declaration: $crate::plugins::declaration::PluginDeclaration =
            $crate::plugins::declaration::PluginDeclaration {
                abi_version: $crate::plugins::declaration::ABI_VERSION,
                core_version: env!("CARGO_PKG_VERSION"),
                register: {
                    fn register(registrar: &mut dyn $crate::plugins::declaration::PluginRegistrar) {
                        $(
                            registrar.register(
                                $crate::plugins::declaration::PluginType::of::<$plugin>(),
                            );
                        )+
                    }
                    register
                },
            };
    };
}
