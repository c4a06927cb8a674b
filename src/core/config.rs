//! Host configuration: where plugins live and which core version is advertised
use crate::core::version;
use crate::error::{HostError, HostResult};
use semver::Version;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding extra plugin directories (platform path-list syntax).
pub const PLUGIN_PATH_ENV: &str = "EXTPARSER_PLUGIN_PATH";

/// Default bundled plugin directory, relative to the working directory.
pub const DEFAULT_PLUGIN_DIR: &str = "plugins";

/// Settings for the plugin host.
///
/// `plugin_dirs` is scanned in order and later directories override earlier
/// ones when two plugins share a type name, so bundled directories go first
/// and local overrides last.
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub plugin_dirs: Vec<PathBuf>,
    pub core_version: Version,
}

/// On-disk shape of the JSON config file. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    plugin_dirs: Vec<PathBuf>,
    core_version: Option<String>,
}

impl HostConfig {
    pub fn new(plugin_dirs: Vec<PathBuf>) -> Self {
        Self {
            plugin_dirs,
            core_version: version::current(),
        }
    }

    /// Load settings from a JSON config file.
    ///
    /// Relative plugin directories are resolved against the config file's own
    /// directory.
    pub fn from_file(path: &Path) -> HostResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: ConfigFile = serde_json::from_str(&content).map_err(|e| {
            HostError::ConfigError(format!("{}: {}", path.display(), e))
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let plugin_dirs = file
            .plugin_dirs
            .into_iter()
            .map(|dir| if dir.is_relative() { base.join(dir) } else { dir })
            .collect();

        let core_version = match file.core_version {
            Some(v) => version::parse(&v)?,
            None => version::current(),
        };

        Ok(Self {
            plugin_dirs,
            core_version,
        })
    }

    /// Append the directories listed in `EXTPARSER_PLUGIN_PATH`, if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(paths) = std::env::var_os(PLUGIN_PATH_ENV) {
            for dir in std::env::split_paths(&paths) {
                if !dir.as_os_str().is_empty() && !self.plugin_dirs.contains(&dir) {
                    self.plugin_dirs.push(dir);
                }
            }
        }
        self
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::new(vec![PathBuf::from(DEFAULT_PLUGIN_DIR)])
    }
}
