//! Services shared with every plugin: logging, shared state, extraction access
use crate::error::{HostError, HostResult};
use crate::plugins::plugin_trait::TargetOs;
use log::{info, Level, LevelFilter, Log, Record};
use serde_json::Value;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use zip::ZipArchive;

/// Path prefixes that only appear in iOS filesystem extractions.
const IOS_MARKERS: &[&str] = &[
    "private/var/mobile/",
    "System/Library/CoreServices/SystemVersion.plist",
];

/// Path prefixes that only appear in Android filesystem extractions.
const ANDROID_MARKERS: &[&str] = &["data/data/", "system/build.prop"];

/// Log target of messages plugins send through `Services`.
pub const PLUGIN_LOG_TARGET: &str = "plugin";

struct OpenArchive {
    path: PathBuf,
    archive: ZipArchive<File>,
}

/// Capability facade handed to every plugin at construction.
///
/// One instance is shared by all plugins. Nothing here isolates plugins from
/// each other: a plugin that closes or replaces the archive does so for all.
pub struct Services {
    archive: Mutex<Option<OpenArchive>>,
    state: Mutex<HashMap<String, Value>>,
    // Captured from the host so plugin libraries, which carry their own copy
    // of `log`, still reach the host's logger.
    logger: &'static dyn Log,
    max_level: LevelFilter,
}

// A poisoned lock only means a plugin panicked while holding it; the data is
// still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Services {
    pub fn new() -> Self {
        Self {
            archive: Mutex::new(None),
            state: Mutex::new(HashMap::new()),
            logger: log::logger(),
            max_level: log::max_level(),
        }
    }

    fn log(&self, level: Level, text: &str) {
        if level > self.max_level {
            return;
        }
        self.logger.log(
            &Record::builder()
                .args(format_args!("{}", text))
                .level(level)
                .target(PLUGIN_LOG_TARGET)
                .build(),
        );
    }

    pub fn log_info(&self, text: &str) {
        self.log(Level::Info, text);
    }

    pub fn log_warning(&self, text: &str) {
        self.log(Level::Warn, text);
    }

    pub fn log_error(&self, text: &str) {
        self.log(Level::Error, text);
    }

    /// Open a ZIP extraction, replacing any archive already open.
    pub fn open_archive(&self, path: &Path) -> HostResult<()> {
        let file = File::open(path)?;
        let archive = ZipArchive::new(file)?;
        info!(
            "Opened extraction {} ({} entries)",
            path.display(),
            archive.len()
        );
        *lock(&self.archive) = Some(OpenArchive {
            path: path.to_path_buf(),
            archive,
        });
        Ok(())
    }

    pub fn close_archive(&self) {
        lock(&self.archive).take();
    }

    pub fn has_archive(&self) -> bool {
        lock(&self.archive).is_some()
    }

    pub fn archive_path(&self) -> Option<PathBuf> {
        lock(&self.archive).as_ref().map(|open| open.path.clone())
    }

    /// Names of all entries in the open extraction.
    pub fn archive_entries(&self) -> HostResult<Vec<String>> {
        let guard = lock(&self.archive);
        let open = guard.as_ref().ok_or(HostError::NoArchive)?;
        Ok(open.archive.file_names().map(|n| n.to_string()).collect())
    }

    /// Read one file out of the open extraction.
    pub fn read_archive_file(&self, name: &str) -> HostResult<Vec<u8>> {
        let mut guard = lock(&self.archive);
        let open = guard.as_mut().ok_or(HostError::NoArchive)?;
        let mut entry = open.archive.by_name(name)?;
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Guess which mobile OS the open extraction came from.
    pub fn detect_platform(&self) -> TargetOs {
        let entries = match self.archive_entries() {
            Ok(entries) => entries,
            Err(_) => return TargetOs::Unknown,
        };

        let has_marker = |markers: &[&str]| {
            entries.iter().any(|entry| {
                let entry = entry.trim_start_matches("./").trim_start_matches('/');
                markers.iter().any(|m| entry.starts_with(m) || entry.contains(&format!("/{}", m)))
            })
        };

        if has_marker(IOS_MARKERS) {
            TargetOs::Ios
        } else if has_marker(ANDROID_MARKERS) {
            TargetOs::Android
        } else {
            TargetOs::Unknown
        }
    }

    pub fn set_state(&self, key: &str, value: Value) {
        lock(&self.state).insert(key.to_string(), value);
    }

    pub fn get_state(&self, key: &str) -> Option<Value> {
        lock(&self.state).get(key).cloned()
    }

    pub fn remove_state(&self, key: &str) -> Option<Value> {
        lock(&self.state).remove(key)
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new()
    }
}
