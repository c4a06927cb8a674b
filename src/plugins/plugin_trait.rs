//! Plugin contract shared by the host and every forensic plugin
use crate::services::Services;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Operating system a plugin targets, or the platform detected in an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetOs {
    /// Wildcard: the plugin applies to every extraction.
    Any,
    Ios,
    Android,
    /// Detection marker for extractions whose platform could not be determined.
    Unknown,
}

impl TargetOs {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetOs::Any => "any",
            TargetOs::Ios => "ios",
            TargetOs::Android => "android",
            TargetOs::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for TargetOs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TargetOs {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "any" => Ok(TargetOs::Any),
            "ios" => Ok(TargetOs::Ios),
            "android" => Ok(TargetOs::Android),
            "unknown" => Ok(TargetOs::Unknown),
            other => Err(format!("unknown target platform '{}'", other)),
        }
    }
}

/// Immutable description of a plugin type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    /// Minimum host core version, e.g. `"0.1.0"`. Empty means unconstrained.
    pub min_core_version: String,
    /// Names of other plugins that must be discovered for this one to load.
    pub dependencies: Vec<String>,
    pub enabled: bool,
    pub target_os: Vec<TargetOs>,
}

impl PluginMetadata {
    /// Enabled metadata targeting every platform, with no dependencies.
    pub fn new(name: &str, version: &str, description: &str, author: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            description: description.to_string(),
            author: author.to_string(),
            min_core_version: String::new(),
            dependencies: Vec::new(),
            enabled: true,
            target_os: vec![TargetOs::Any],
        }
    }

    pub fn with_min_core_version(mut self, version: &str) -> Self {
        self.min_core_version = version.to_string();
        self
    }

    pub fn with_dependencies(mut self, dependencies: &[&str]) -> Self {
        self.dependencies = dependencies.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_target_os(mut self, target_os: &[TargetOs]) -> Self {
        self.target_os = target_os.to_vec();
        self
    }
}

/// Lifecycle status of a plugin instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStatus {
    Unloaded,
    Loaded,
    Initialized,
    Active,
    Error,
    Disabled,
}

impl PluginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginStatus::Unloaded => "unloaded",
            PluginStatus::Loaded => "loaded",
            PluginStatus::Initialized => "initialized",
            PluginStatus::Active => "active",
            PluginStatus::Error => "error",
            PluginStatus::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Arguments passed through to `ForensicPlugin::execute`. The host never
/// interprets them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PluginArgs {
    pub positional: Vec<Value>,
    pub keyword: Map<String, Value>,
}

impl PluginArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    pub fn kwarg(mut self, key: &str, value: Value) -> Self {
        self.keyword.insert(key.to_string(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.keyword.get(key)
    }
}

/// Trait that all forensic plugins must implement
///
/// Plugins built as shared libraries must report failures with `Err`: a
/// panic cannot unwind across the library boundary.
pub trait ForensicPlugin: Send + Sync {
    /// Build an instance around the shared services. Must not do I/O;
    /// heavy work belongs in `initialize`.
    fn new(services: Arc<Services>) -> Self
    where
        Self: Sized;

    /// Describe this plugin. Must be side-effect free.
    fn metadata(&self) -> PluginMetadata;

    /// One-time setup, called once right after construction.
    fn initialize(&mut self) -> anyhow::Result<()>;

    /// The plugin's primary operation.
    fn execute(&mut self, args: &PluginArgs) -> anyhow::Result<Value>;

    /// Best-effort teardown. Must not fail; absorb and log internal errors.
    fn cleanup(&mut self);
}
