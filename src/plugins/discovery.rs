//! Discovery of plugin modules in the configured plugin directories
use crate::plugins::declaration::{PluginDeclaration, PluginType, ABI_VERSION};
use crate::plugins::panic_message;
use anyhow::{anyhow, bail, Context};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Prefix marking helper modules that are never plugins.
const PRIVATE_PREFIX: char = '_';

/// Namespace used to build module identifiers.
const MODULE_NAMESPACE: &str = "extractparser.plugins";

/// Loads one candidate file and returns the plugin types it declares, in
/// declaration order.
pub trait ModuleLoader {
    /// File extension (without the dot) of loadable modules.
    fn extension(&self) -> &str;

    fn load_module(&mut self, path: &Path, module_id: &str) -> anyhow::Result<Vec<PluginType>>;
}

/// Loads plugins from shared libraries built with `export_plugin!`.
#[derive(Debug, Default)]
pub struct DynamicLibraryLoader;

impl DynamicLibraryLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ModuleLoader for DynamicLibraryLoader {
    fn extension(&self) -> &str {
        std::env::consts::DLL_EXTENSION
    }

    fn load_module(&mut self, path: &Path, module_id: &str) -> anyhow::Result<Vec<PluginType>> {
        // Loading runs the library's initialisers; plugin directories are
        // trusted to contain only plugin libraries.
        let library = unsafe { libloading::Library::new(path) }
            .with_context(|| format!("failed to load library {}", path.display()))?;
        let library = Arc::new(library);

        let (abi_version, core_version, register) = unsafe {
            let symbol: libloading::Symbol<*const PluginDeclaration> = library
                .get(b"plugin_declaration\0")
                .with_context(|| format!("{} has no plugin_declaration", path.display()))?;
            let declaration: &PluginDeclaration = &**symbol;
            (
                declaration.abi_version,
                declaration.core_version.to_string(),
                declaration.register,
            )
        };

        if abi_version != ABI_VERSION {
            bail!(
                "plugin ABI version {} does not match host ABI version {}",
                abi_version,
                ABI_VERSION
            );
        }
        debug!("{} was built against core {}", module_id, core_version);

        let mut types: Vec<PluginType> = Vec::new();
        register(&mut types);

        Ok(types
            .into_iter()
            .map(|t| t.backed_by(Arc::clone(&library)))
            .collect())
    }
}

/// A candidate file that could not be loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Result of one discovery pass.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Type name to plugin type.
    pub types: BTreeMap<String, PluginType>,
    pub failures: Vec<DiscoveryFailure>,
}

/// Scans plugin directories and loads every candidate module.
pub struct DiscoveryEngine {
    plugin_dirs: Vec<PathBuf>,
    loader: Box<dyn ModuleLoader>,
}

impl DiscoveryEngine {
    pub fn new(plugin_dirs: Vec<PathBuf>, loader: Box<dyn ModuleLoader>) -> Self {
        Self {
            plugin_dirs,
            loader,
        }
    }

    pub fn with_dynamic_loader(plugin_dirs: Vec<PathBuf>) -> Self {
        Self::new(plugin_dirs, Box::new(DynamicLibraryLoader::new()))
    }

    pub fn plugin_dirs(&self) -> &[PathBuf] {
        &self.plugin_dirs
    }

    /// Identifier a module is loaded under, derived from its file stem.
    pub fn module_id(path: &Path) -> String {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}.{}", MODULE_NAMESPACE, stem)
    }

    /// Run a full discovery pass.
    ///
    /// Directories are scanned in configured order and files within a
    /// directory in name order. A type name found again in a later directory
    /// replaces the earlier entry. Failures are collected, never fatal.
    pub fn discover(&mut self) -> Discovery {
        let mut discovery = Discovery::default();

        for dir in self.plugin_dirs.clone() {
            if !dir.exists() {
                if let Err(e) = std::fs::create_dir_all(&dir) {
                    warn!("Could not create plugin directory {}: {}", dir.display(), e);
                }
            }

            let candidates = match self.candidates(&dir) {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!("Could not read plugin directory {}: {}", dir.display(), e);
                    discovery.failures.push(DiscoveryFailure {
                        path: dir.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            for path in candidates {
                match self.load_candidate(&path) {
                    Ok(Some(plugin_type)) => {
                        let name = plugin_type.name().to_string();
                        if let Some(previous) = discovery.types.get(&name) {
                            debug!(
                                "Plugin {} from {} overrides the one from {}",
                                name,
                                path.display(),
                                previous
                                    .origin()
                                    .map(|p| p.display().to_string())
                                    .unwrap_or_default()
                            );
                        }
                        debug!("Discovered plugin {} in {}", name, path.display());
                        discovery.types.insert(name, plugin_type);
                    }
                    Ok(None) => {
                        debug!("{} declares no plugin, skipping", path.display());
                    }
                    Err(e) => {
                        warn!("Failed to load plugin module {}: {:#}", path.display(), e);
                        discovery.failures.push(DiscoveryFailure {
                            path,
                            error: format!("{:#}", e),
                        });
                    }
                }
            }
        }

        info!(
            "Discovered {} plugins ({} failed modules)",
            discovery.types.len(),
            discovery.failures.len()
        );
        discovery
    }

    /// Loadable, non-private files directly inside `dir`, sorted by name.
    fn candidates(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let extension = self.loader.extension();
        let mut files = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            let matches_extension = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| ext.eq_ignore_ascii_case(extension))
                .unwrap_or(false);
            let is_private = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(PRIVATE_PREFIX))
                .unwrap_or(true);

            if matches_extension && !is_private {
                files.push(path);
            }
        }

        files.sort();
        Ok(files)
    }

    /// Load one module and pick its plugin type, if any.
    fn load_candidate(&mut self, path: &Path) -> anyhow::Result<Option<PluginType>> {
        let module_id = Self::module_id(path);
        let loader = &mut self.loader;

        let types = panic::catch_unwind(AssertUnwindSafe(|| loader.load_module(path, &module_id)))
            .map_err(|payload| anyhow!("module panicked while loading: {}", panic_message(&*payload)))??;

        Ok(types
            .into_iter()
            .next()
            .map(|t| t.located(&module_id, path)))
    }
}
