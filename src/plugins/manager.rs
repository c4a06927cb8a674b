//! Plugin lifecycle manager: owns the type and instance registries
use crate::core::config::HostConfig;
use crate::core::version;
use crate::error::{HostError, HostResult};
use crate::plugins::compat;
use crate::plugins::declaration::PluginType;
use crate::plugins::discovery::{DiscoveryEngine, DiscoveryFailure};
use crate::plugins::panic_message;
use crate::plugins::plugin_trait::{
    ForensicPlugin, PluginArgs, PluginMetadata, PluginStatus, TargetOs,
};
use crate::services::Services;
use anyhow::anyhow;
use log::{debug, error, info, warn};
use semver::Version;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// A live, initialized plugin instance.
pub struct LoadedPlugin {
    plugin: Box<dyn ForensicPlugin>,
    metadata: PluginMetadata,
    status: PluginStatus,
    // Declared after `plugin` so the instance is dropped before the library
    // that holds its code.
    plugin_type: PluginType,
}

impl LoadedPlugin {
    pub fn name(&self) -> &str {
        self.plugin_type.name()
    }

    pub fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    pub fn status(&self) -> PluginStatus {
        self.status
    }

    pub fn plugin_type(&self) -> &PluginType {
        &self.plugin_type
    }

    pub fn plugin(&self) -> &dyn ForensicPlugin {
        self.plugin.as_ref()
    }
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("name", &self.name())
            .field("version", &self.metadata.version)
            .field("status", &self.status)
            .finish()
    }
}

/// What happened on a load attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Loaded,
    AlreadyLoaded,
    NotFound,
    /// The plugin reports itself disabled; nothing was registered.
    Disabled,
    /// Construction, requirement checks or `initialize` failed.
    Failed(String),
}

/// Per-name results of `load_all`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub disabled: Vec<String>,
    pub failed: Vec<(String, String)>,
}

/// What happened on an unload attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum UnloadOutcome {
    Unloaded,
    NotLoaded,
    /// `cleanup` panicked. The instance was removed regardless.
    CleanupFailed(String),
}

impl UnloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UnloadOutcome::Unloaded)
    }
}

impl std::fmt::Display for UnloadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnloadOutcome::Unloaded => f.write_str("unloaded"),
            UnloadOutcome::NotLoaded => f.write_str("not loaded"),
            UnloadOutcome::CleanupFailed(reason) => write!(f, "cleanup failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PluginCounts {
    pub total_discovered: usize,
    pub loaded: usize,
    pub active: usize,
    pub error: usize,
}

/// One row of the plugin listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginListing {
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    pub status: PluginStatus,
    pub enabled: bool,
    pub compatible: bool,
    pub platforms: Vec<TargetOs>,
    pub origin: String,
}

/// Drives plugins through discovery, load, execute and unload.
///
/// Single-threaded: every operation runs to completion on the caller's
/// thread. Failures inside plugin code (errors and panics alike) are
/// contained here; only `execute` hands them back to the caller.
pub struct PluginManager {
    services: Arc<Services>,
    engine: DiscoveryEngine,
    core_version: Version,
    target_platform: Option<TargetOs>,
    instances: BTreeMap<String, LoadedPlugin>,
    types: BTreeMap<String, PluginType>,
    failures: Vec<DiscoveryFailure>,
}

impl PluginManager {
    /// Manager loading shared-library plugins from the configured directories.
    pub fn new(config: &HostConfig, services: Arc<Services>) -> Self {
        Self::with_engine(
            DiscoveryEngine::with_dynamic_loader(config.plugin_dirs.clone()),
            services,
        )
        .with_core_version(config.core_version.clone())
    }

    pub fn with_engine(engine: DiscoveryEngine, services: Arc<Services>) -> Self {
        Self {
            services,
            engine,
            core_version: version::current(),
            target_platform: None,
            instances: BTreeMap::new(),
            types: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    pub fn with_core_version(mut self, core_version: Version) -> Self {
        self.core_version = core_version;
        self
    }

    pub fn services(&self) -> &Arc<Services> {
        &self.services
    }

    /// Override the platform used by `list`; otherwise it is detected from
    /// the open extraction.
    pub fn set_target_platform(&mut self, platform: Option<TargetOs>) {
        self.target_platform = platform;
    }

    pub fn target_platform(&self) -> TargetOs {
        self.target_platform
            .unwrap_or_else(|| self.services.detect_platform())
    }

    /// Rescan the plugin directories, replacing the type registry.
    /// Returns the number of discovered types.
    pub fn discover(&mut self) -> usize {
        let discovery = self.engine.discover();
        self.types = discovery.types;
        self.failures = discovery.failures;

        for (name, loaded) in &self.instances {
            match self.types.get(name) {
                None => warn!("Plugin {} is loaded but no longer discovered", name),
                Some(plugin_type) if !plugin_type.same_type(&loaded.plugin_type) => warn!(
                    "Plugin {} changed on disk, unload and load it again to use the new version",
                    name
                ),
                Some(_) => {}
            }
        }

        self.types.len()
    }

    pub fn types(&self) -> &BTreeMap<String, PluginType> {
        &self.types
    }

    pub fn discovery_failures(&self) -> &[DiscoveryFailure] {
        &self.failures
    }

    /// Load a plugin, returning the live instance or `None` when it is
    /// unknown, disabled or failed to start.
    pub fn load(&mut self, name: &str) -> Option<&LoadedPlugin> {
        match self.try_load(name) {
            LoadOutcome::Loaded | LoadOutcome::AlreadyLoaded => self.instances.get(name),
            _ => None,
        }
    }

    /// Load a plugin and report exactly what happened.
    pub fn try_load(&mut self, name: &str) -> LoadOutcome {
        let plugin_type = match self.types.get(name) {
            Some(plugin_type) => plugin_type.clone(),
            None => {
                warn!("Plugin {} not found", name);
                return LoadOutcome::NotFound;
            }
        };

        if self.instances.contains_key(name) {
            debug!("Plugin {} already loaded", name);
            return LoadOutcome::AlreadyLoaded;
        }

        let services = Arc::clone(&self.services);
        let constructed = panic::catch_unwind(AssertUnwindSafe(|| {
            let plugin = plugin_type.instantiate(services);
            let metadata = plugin.metadata();
            (plugin, metadata)
        }));
        let (mut plugin, metadata) = match constructed {
            Ok(built) => built,
            Err(payload) => {
                return self.load_failed(name, format!("construction panicked: {}", panic_message(&*payload)));
            }
        };

        if !metadata.enabled {
            info!("Plugin {} is disabled, not loading", name);
            return LoadOutcome::Disabled;
        }

        if let Err(reason) = self.check_requirements(&metadata) {
            return self.load_failed(name, reason);
        }

        match panic::catch_unwind(AssertUnwindSafe(|| plugin.initialize())) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return self.load_failed(name, format!("initialize failed: {:#}", e)),
            Err(payload) => {
                return self.load_failed(name, format!("initialize panicked: {}", panic_message(&*payload)));
            }
        }

        info!("Loaded plugin {} v{}", name, metadata.version);
        self.instances.insert(
            name.to_string(),
            LoadedPlugin {
                plugin,
                metadata,
                status: PluginStatus::Initialized,
                plugin_type,
            },
        );
        LoadOutcome::Loaded
    }

    fn load_failed(&self, name: &str, reason: String) -> LoadOutcome {
        error!("Failed to load plugin {}: {}", name, reason);
        LoadOutcome::Failed(reason)
    }

    /// Core version and dependency constraints declared in the metadata.
    fn check_requirements(&self, metadata: &PluginMetadata) -> Result<(), String> {
        match version::satisfies(&self.core_version, &metadata.min_core_version) {
            Ok(true) => {}
            Ok(false) => {
                return Err(format!(
                    "requires core {} but host is {}",
                    metadata.min_core_version, self.core_version
                ))
            }
            Err(e) => return Err(e.to_string()),
        }

        let missing: Vec<&str> = metadata
            .dependencies
            .iter()
            .filter(|dep| !self.types.contains_key(dep.as_str()))
            .map(|dep| dep.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(format!("missing dependencies: {}", missing.join(", ")));
        }

        Ok(())
    }

    /// Discover, then try to load every discovered plugin.
    pub fn load_all(&mut self) -> LoadReport {
        self.discover();

        let mut report = LoadReport::default();
        let names: Vec<String> = self.types.keys().cloned().collect();
        for name in names {
            match self.try_load(&name) {
                LoadOutcome::Loaded | LoadOutcome::AlreadyLoaded => report.loaded.push(name),
                LoadOutcome::Disabled => report.disabled.push(name),
                LoadOutcome::Failed(reason) => report.failed.push((name, reason)),
                LoadOutcome::NotFound => {}
            }
        }

        info!(
            "Loaded {} plugins ({} disabled, {} failed)",
            report.loaded.len(),
            report.disabled.len(),
            report.failed.len()
        );
        report
    }

    /// Run `cleanup` and drop the instance.
    pub fn unload(&mut self, name: &str) -> UnloadOutcome {
        let mut loaded = match self.instances.remove(name) {
            Some(loaded) => loaded,
            None => {
                debug!("Plugin {} is not loaded", name);
                return UnloadOutcome::NotLoaded;
            }
        };

        match panic::catch_unwind(AssertUnwindSafe(|| loaded.plugin.cleanup())) {
            Ok(()) => {
                loaded.status = PluginStatus::Unloaded;
                info!("Unloaded plugin {}", name);
                UnloadOutcome::Unloaded
            }
            Err(payload) => {
                let reason = panic_message(&*payload);
                error!("Cleanup of plugin {} panicked: {}", name, reason);
                warn!("Removed plugin {} despite failed cleanup", name);
                UnloadOutcome::CleanupFailed(reason)
            }
        }
    }

    /// Unload every live instance.
    pub fn unload_all(&mut self) -> Vec<(String, UnloadOutcome)> {
        let names: Vec<String> = self.instances.keys().cloned().collect();
        names
            .into_iter()
            .map(|name| {
                let outcome = self.unload(&name);
                (name, outcome)
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&LoadedPlugin> {
        self.instances.get(name)
    }

    /// Run a loaded plugin. The plugin's own error comes back unchanged
    /// inside `HostError::PluginFailed` and leaves the plugin in `Error`.
    pub fn execute(&mut self, name: &str, args: &PluginArgs) -> HostResult<Value> {
        let loaded = self
            .instances
            .get_mut(name)
            .ok_or_else(|| HostError::NotLoaded(name.to_string()))?;

        loaded.status = PluginStatus::Active;
        let result = panic::catch_unwind(AssertUnwindSafe(|| loaded.plugin.execute(args)));

        let failure = match result {
            Ok(Ok(value)) => {
                loaded.status = PluginStatus::Initialized;
                debug!("Plugin {} finished", name);
                return Ok(value);
            }
            Ok(Err(e)) => e,
            Err(payload) => anyhow!("plugin panicked: {}", panic_message(&*payload)),
        };

        loaded.status = PluginStatus::Error;
        error!("Plugin {} failed: {:#}", name, failure);
        Err(HostError::PluginFailed {
            name: name.to_string(),
            source: failure,
        })
    }

    pub fn count(&self) -> PluginCounts {
        let with_status =
            |status: PluginStatus| self.instances.values().filter(|p| p.status == status).count();
        PluginCounts {
            total_discovered: self.types.len(),
            loaded: self.instances.len(),
            active: with_status(PluginStatus::Active),
            error: with_status(PluginStatus::Error),
        }
    }

    pub fn is_compatible(&self, plugin_type: &PluginType, target: TargetOs) -> bool {
        compat::is_compatible(plugin_type, target, &self.services)
    }

    pub fn get_compatible(&self, target: TargetOs) -> BTreeMap<&str, &PluginType> {
        compat::get_compatible(&self.types, target, &self.services)
    }

    /// Read-only projection of both registries.
    ///
    /// Disabled plugins are hidden unless `show_all`; with
    /// `filter_by_platform` only plugins compatible with `target_platform()`
    /// are returned.
    pub fn list(&self, show_all: bool, filter_by_platform: bool) -> Vec<PluginListing> {
        let platform = self.target_platform();
        let mut rows = Vec::new();

        for (name, plugin_type) in &self.types {
            let (metadata, status) = match self.instances.get(name) {
                Some(loaded) => (Some(loaded.metadata.clone()), loaded.status),
                None => match compat::probe_metadata(plugin_type, &self.services) {
                    Ok(metadata) => {
                        let status = if metadata.enabled {
                            PluginStatus::Unloaded
                        } else {
                            PluginStatus::Disabled
                        };
                        (Some(metadata), status)
                    }
                    Err(e) => {
                        warn!("Could not read metadata of {}: {}", name, e);
                        (None, PluginStatus::Error)
                    }
                },
            };

            let row = match metadata {
                Some(metadata) => PluginListing {
                    name: name.clone(),
                    compatible: compat::targets_platform(&metadata.target_os, platform),
                    version: metadata.version,
                    author: metadata.author,
                    description: metadata.description,
                    status,
                    enabled: metadata.enabled,
                    platforms: metadata.target_os,
                    origin: origin_of(plugin_type),
                },
                None => PluginListing {
                    name: name.clone(),
                    version: "?".to_string(),
                    author: String::new(),
                    description: "metadata unavailable".to_string(),
                    status,
                    enabled: true,
                    compatible: true,
                    platforms: Vec::new(),
                    origin: origin_of(plugin_type),
                },
            };

            if !show_all && !row.enabled {
                continue;
            }
            if filter_by_platform && !row.compatible {
                continue;
            }
            rows.push(row);
        }

        rows
    }
}

fn origin_of(plugin_type: &PluginType) -> String {
    plugin_type
        .origin()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        if !self.instances.is_empty() {
            self.unload_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::discovery::tests::{touch, FakeLoader, FakeModule};
    use serde_json::json;
    use tempfile::TempDir;

    #[derive(Debug)]
    struct RuntimeError(&'static str);

    impl std::fmt::Display for RuntimeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for RuntimeError {}

    fn bump(services: &Services, key: &str) {
        let n = counter(services, key);
        services.set_state(key, json!(n + 1));
    }

    fn counter(services: &Services, key: &str) -> u64 {
        services
            .get_state(key)
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
    }

    // Each plugin counts its initialize/cleanup calls in the shared state.
    macro_rules! test_plugin {
        ($ty:ident {
            metadata: $meta:expr,
            initialize: $init:expr,
            execute: $exec:expr,
            cleanup: $cleanup:expr $(,)?
        }) => {
            struct $ty {
                services: Arc<Services>,
            }

            impl ForensicPlugin for $ty {
                fn new(services: Arc<Services>) -> Self {
                    $ty { services }
                }

                fn metadata(&self) -> PluginMetadata {
                    let base = PluginMetadata::new(stringify!($ty), "1.0.0", "test plugin", "tests");
                    ($meta)(base)
                }

                fn initialize(&mut self) -> anyhow::Result<()> {
                    bump(&self.services, concat!(stringify!($ty), ".initialized"));
                    ($init)()
                }

                fn execute(&mut self, args: &PluginArgs) -> anyhow::Result<Value> {
                    ($exec)(args)
                }

                fn cleanup(&mut self) {
                    bump(&self.services, concat!(stringify!($ty), ".cleaned"));
                    ($cleanup)()
                }
            }
        };
    }

    test_plugin!(Foo {
        metadata: |m: PluginMetadata| m,
        initialize: || Ok(()),
        execute: |args: &PluginArgs| Ok(json!({ "echo": args.positional })),
        cleanup: || {},
    });

    test_plugin!(Bar {
        metadata: |m: PluginMetadata| m.with_target_os(&[TargetOs::Android]),
        initialize: || Ok(()),
        execute: |_args: &PluginArgs| Ok(json!("bar")),
        cleanup: || {},
    });

    test_plugin!(Switched {
        metadata: |m: PluginMetadata| m.with_enabled(false),
        initialize: || Ok(()),
        execute: |_args: &PluginArgs| Ok(Value::Null),
        cleanup: || {},
    });

    test_plugin!(Boom {
        metadata: |m: PluginMetadata| m,
        initialize: || Ok(()),
        execute: |_args: &PluginArgs| Err(anyhow::Error::new(RuntimeError("boom"))),
        cleanup: || {},
    });

    test_plugin!(Flaky {
        metadata: |m: PluginMetadata| m,
        initialize: || Ok(()),
        execute: |args: &PluginArgs| match args.get("fail") {
            Some(Value::Bool(true)) => Err(anyhow!("asked to fail")),
            _ => Ok(json!("ok")),
        },
        cleanup: || {},
    });

    test_plugin!(Explodes {
        metadata: |m: PluginMetadata| m,
        initialize: || Ok(()),
        execute: |_args: &PluginArgs| -> anyhow::Result<Value> { panic!("execute exploded") },
        cleanup: || {},
    });

    test_plugin!(BadInit {
        metadata: |m: PluginMetadata| m,
        initialize: || Err(anyhow!("database locked")),
        execute: |_args: &PluginArgs| Ok(Value::Null),
        cleanup: || {},
    });

    test_plugin!(PanicInit {
        metadata: |m: PluginMetadata| m,
        initialize: || -> anyhow::Result<()> { panic!("init exploded") },
        execute: |_args: &PluginArgs| Ok(Value::Null),
        cleanup: || {},
    });

    test_plugin!(StickyCleanup {
        metadata: |m: PluginMetadata| m,
        initialize: || Ok(()),
        execute: |_args: &PluginArgs| Ok(Value::Null),
        cleanup: || panic!("cleanup exploded"),
    });

    test_plugin!(NeedsBar {
        metadata: |m: PluginMetadata| m.with_dependencies(&["Bar"]),
        initialize: || Ok(()),
        execute: |_args: &PluginArgs| Ok(Value::Null),
        cleanup: || {},
    });

    test_plugin!(NeedsMissing {
        metadata: |m: PluginMetadata| m.with_dependencies(&["Bar", "Ghost"]),
        initialize: || Ok(()),
        execute: |_args: &PluginArgs| Ok(Value::Null),
        cleanup: || {},
    });

    test_plugin!(NeedsRelease {
        metadata: |m: PluginMetadata| m.with_min_core_version("1.0.0"),
        initialize: || Ok(()),
        execute: |_args: &PluginArgs| Ok(Value::Null),
        cleanup: || {},
    });

    test_plugin!(FutureCore {
        metadata: |m: PluginMetadata| m.with_min_core_version("99.0.0"),
        initialize: || Ok(()),
        execute: |_args: &PluginArgs| Ok(Value::Null),
        cleanup: || {},
    });

    struct Host {
        _dir: TempDir,
        manager: PluginManager,
    }

    fn host(types: Vec<PluginType>) -> Host {
        host_at(types, Version::new(1, 0, 0))
    }

    /// One plugin directory with a module file per type, already discovered.
    fn host_at(types: Vec<PluginType>, core: Version) -> Host {
        let dir = TempDir::new().unwrap();
        let mut loader = FakeLoader::new();
        for plugin_type in types {
            let stem = plugin_type.name().to_lowercase();
            touch(dir.path(), &format!("{}.plug", stem));
            loader = loader.module(&stem, FakeModule::Types(vec![plugin_type]));
        }
        let engine = DiscoveryEngine::new(vec![dir.path().to_path_buf()], Box::new(loader));
        let mut manager = PluginManager::with_engine(engine, Arc::new(Services::new()))
            .with_core_version(core);
        manager.discover();
        Host { _dir: dir, manager }
    }

    #[test]
    fn test_full_lifecycle() {
        let mut host = host(vec![PluginType::of::<Foo>()]);
        let manager = &mut host.manager;
        assert_eq!(manager.types().keys().collect::<Vec<_>>(), vec!["Foo"]);

        let status = manager.load("Foo").map(|p| p.status());
        assert_eq!(status, Some(PluginStatus::Initialized));

        let out = manager
            .execute("Foo", &PluginArgs::new().arg(json!(7)))
            .unwrap();
        assert_eq!(out, json!({ "echo": [7] }));
        assert_eq!(manager.get("Foo").unwrap().status(), PluginStatus::Initialized);

        assert_eq!(manager.unload("Foo"), UnloadOutcome::Unloaded);
        assert!(manager.get("Foo").is_none());
        assert_eq!(manager.count().loaded, 0);
        assert_eq!(counter(manager.services(), "Foo.cleaned"), 1);
    }

    #[test]
    fn test_load_is_idempotent() {
        let mut host = host(vec![PluginType::of::<Foo>()]);
        let manager = &mut host.manager;

        let first = manager.load("Foo").map(|p| p as *const LoadedPlugin);
        let second = manager.load("Foo").map(|p| p as *const LoadedPlugin);
        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(manager.try_load("Foo"), LoadOutcome::AlreadyLoaded);
        assert_eq!(counter(manager.services(), "Foo.initialized"), 1);
        assert_eq!(manager.count().loaded, 1);
    }

    #[test]
    fn test_unknown_plugin_is_absent() {
        let mut host = host(vec![]);
        let manager = &mut host.manager;

        assert!(manager.load("DoesNotExist").is_none());
        assert_eq!(manager.try_load("DoesNotExist"), LoadOutcome::NotFound);
        assert!(manager.get("DoesNotExist").is_none());
        assert_eq!(manager.unload("DoesNotExist"), UnloadOutcome::NotLoaded);
        assert!(matches!(
            manager.execute("DoesNotExist", &PluginArgs::new()),
            Err(HostError::NotLoaded(_))
        ));
        assert_eq!(manager.count().loaded, 0);
    }

    #[test]
    fn test_disabled_plugin_never_registers() {
        let mut host = host(vec![PluginType::of::<Switched>()]);
        let manager = &mut host.manager;

        assert!(manager.load("Switched").is_none());
        assert_eq!(manager.try_load("Switched"), LoadOutcome::Disabled);
        assert!(manager.get("Switched").is_none());
        assert_eq!(counter(manager.services(), "Switched.initialized"), 0);
        assert_eq!(manager.count().loaded, 0);
    }

    #[test]
    fn test_execute_failure_propagates_and_sets_error() {
        let mut host = host(vec![PluginType::of::<Boom>()]);
        let manager = &mut host.manager;
        manager.load("Boom").unwrap();

        let err = manager.execute("Boom", &PluginArgs::new()).unwrap_err();
        let source = err.plugin_error().expect("plugin error kept");
        let runtime = source.downcast_ref::<RuntimeError>().expect("same error type");
        assert_eq!(runtime.0, "boom");
        assert_eq!(manager.get("Boom").unwrap().status(), PluginStatus::Error);

        let counts = manager.count();
        assert_eq!(counts.error, 1);
        assert_eq!(counts.active, 0);
    }

    #[test]
    fn test_execute_panic_is_contained() {
        let mut host = host(vec![PluginType::of::<Explodes>()]);
        let manager = &mut host.manager;
        manager.load("Explodes").unwrap();

        let err = manager.execute("Explodes", &PluginArgs::new()).unwrap_err();
        assert!(err.to_string().contains("execute exploded"));
        assert_eq!(manager.get("Explodes").unwrap().status(), PluginStatus::Error);
    }

    #[test]
    fn test_execute_recovers_from_error_status() {
        let mut host = host(vec![PluginType::of::<Flaky>()]);
        let manager = &mut host.manager;
        manager.load("Flaky").unwrap();

        let failing = PluginArgs::new().kwarg("fail", json!(true));
        assert!(manager.execute("Flaky", &failing).is_err());
        assert_eq!(manager.get("Flaky").unwrap().status(), PluginStatus::Error);

        assert_eq!(manager.execute("Flaky", &PluginArgs::new()).unwrap(), json!("ok"));
        assert_eq!(manager.get("Flaky").unwrap().status(), PluginStatus::Initialized);
    }

    #[test]
    fn test_initialize_failure_is_absorbed() {
        let mut host = host(vec![PluginType::of::<BadInit>(), PluginType::of::<PanicInit>()]);
        let manager = &mut host.manager;

        assert!(manager.load("BadInit").is_none());
        match manager.try_load("BadInit") {
            LoadOutcome::Failed(reason) => assert!(reason.contains("database locked")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(manager.load("PanicInit").is_none());
        assert_eq!(manager.count().loaded, 0);
    }

    #[test]
    fn test_cleanup_panic_force_removes() {
        let mut host = host(vec![PluginType::of::<StickyCleanup>()]);
        let manager = &mut host.manager;
        manager.load("StickyCleanup").unwrap();

        match manager.unload("StickyCleanup") {
            UnloadOutcome::CleanupFailed(reason) => assert!(reason.contains("cleanup exploded")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(manager.get("StickyCleanup").is_none());
        assert_eq!(manager.unload("StickyCleanup"), UnloadOutcome::NotLoaded);
    }

    #[test]
    fn test_dependencies_must_be_discovered() {
        let mut host = host(vec![
            PluginType::of::<Bar>(),
            PluginType::of::<NeedsBar>(),
            PluginType::of::<NeedsMissing>(),
        ]);
        let manager = &mut host.manager;

        assert!(manager.load("NeedsBar").is_some());
        match manager.try_load("NeedsMissing") {
            LoadOutcome::Failed(reason) => assert_eq!(reason, "missing dependencies: Ghost"),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_min_core_version_enforced() {
        let mut host = host(vec![PluginType::of::<FutureCore>()]);
        let manager = &mut host.manager;

        match manager.try_load("FutureCore") {
            LoadOutcome::Failed(reason) => assert!(reason.contains("99.0.0")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(counter(manager.services(), "FutureCore.initialized"), 0);
    }

    #[test]
    fn test_load_all_and_unload_all() {
        let mut host = host(vec![
            PluginType::of::<Foo>(),
            PluginType::of::<Switched>(),
            PluginType::of::<BadInit>(),
            PluginType::of::<Bar>(),
        ]);
        let manager = &mut host.manager;

        let report = manager.load_all();
        assert_eq!(report.loaded, vec!["Bar".to_string(), "Foo".to_string()]);
        assert_eq!(report.disabled, vec!["Switched".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "BadInit");

        let counts = manager.count();
        assert_eq!(counts.total_discovered, 4);
        assert_eq!(counts.loaded, 2);

        let outcomes = manager.unload_all();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|(_, o)| o.is_success()));
        assert_eq!(manager.count().loaded, 0);
    }

    #[test]
    fn test_drop_cleans_up_live_plugins() {
        let services = Arc::new(Services::new());
        {
            let mut host = host(vec![PluginType::of::<Foo>()]);
            // Swap in our own services so the counters outlive the manager.
            host.manager.services = Arc::clone(&services);
            host.manager.load("Foo").unwrap();
        }
        assert_eq!(counter(&services, "Foo.cleaned"), 1);
    }

    #[test]
    fn test_rediscovery_keeps_instances() {
        let mut host = host(vec![PluginType::of::<Foo>()]);
        let manager = &mut host.manager;
        manager.load("Foo").unwrap();

        assert_eq!(manager.discover(), 1);
        assert_eq!(manager.get("Foo").unwrap().status(), PluginStatus::Initialized);
        assert_eq!(manager.try_load("Foo"), LoadOutcome::AlreadyLoaded);
    }

    #[test]
    fn test_load_after_type_vanishes_is_not_found() {
        let mut host = host(vec![PluginType::of::<Foo>()]);
        host.manager.load("Foo").unwrap();

        std::fs::remove_file(host._dir.path().join("foo.plug")).unwrap();
        assert_eq!(host.manager.discover(), 0);

        assert_eq!(host.manager.try_load("Foo"), LoadOutcome::NotFound);
        assert!(host.manager.load("Foo").is_none());
        // The live instance is still owned by the manager until unloaded.
        assert_eq!(host.manager.unload("Foo"), UnloadOutcome::Unloaded);
    }

    #[test]
    fn test_prerelease_host_rejects_release_requirement() {
        let core = version::parse("1.0.0-rc1").unwrap();
        let mut host = host_at(vec![PluginType::of::<NeedsRelease>()], core);

        match host.manager.try_load("NeedsRelease") {
            LoadOutcome::Failed(reason) => assert!(reason.contains("1.0.0-rc1")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_unload_outcome_display() {
        assert_eq!(
            UnloadOutcome::CleanupFailed("cleanup exploded".to_string()).to_string(),
            "cleanup failed: cleanup exploded"
        );
        assert_eq!(UnloadOutcome::Unloaded.to_string(), "unloaded");
    }

    #[test]
    fn test_list_does_not_touch_lifecycle() {
        let mut host = host(vec![
            PluginType::of::<Foo>(),
            PluginType::of::<Bar>(),
            PluginType::of::<Switched>(),
        ]);
        let manager = &mut host.manager;
        manager.set_target_platform(Some(TargetOs::Ios));
        manager.load("Foo").unwrap();
        let before = manager.count();

        let visible: Vec<String> = manager.list(false, false).into_iter().map(|r| r.name).collect();
        assert_eq!(visible, vec!["Bar".to_string(), "Foo".to_string()]);

        let all = manager.list(true, false);
        assert_eq!(all.len(), 3);
        let switched = all.iter().find(|r| r.name == "Switched").unwrap();
        assert_eq!(switched.status, PluginStatus::Disabled);
        let foo = all.iter().find(|r| r.name == "Foo").unwrap();
        assert_eq!(foo.status, PluginStatus::Initialized);

        let ios: Vec<String> = manager.list(true, true).into_iter().map(|r| r.name).collect();
        assert_eq!(ios, vec!["Foo".to_string(), "Switched".to_string()]);

        assert_eq!(manager.count(), before);
        assert_eq!(counter(manager.services(), "Bar.initialized"), 0);
    }

    #[test]
    fn test_compatibility_through_manager() {
        let host = host(vec![PluginType::of::<Foo>(), PluginType::of::<Bar>()]);
        let manager = &host.manager;

        let bar = &manager.types()["Bar"];
        assert!(manager.is_compatible(bar, TargetOs::Android));
        assert!(!manager.is_compatible(bar, TargetOs::Ios));

        assert_eq!(manager.get_compatible(TargetOs::Ios).len(), 1);
        assert_eq!(manager.get_compatible(TargetOs::Any).len(), 2);
    }
}
