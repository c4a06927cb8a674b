//! Custom error types for the application
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("CSV into_inner error: {0}")]
    CsvIntoInnerError(#[from] csv::IntoInnerError<csv::Writer<Vec<u8>>>),

    #[error("UTF-8 conversion error: {0}")]
    FromUtf8Error(#[from] std::string::FromUtf8Error),

    #[error("Archive error: {0}")]
    ArchiveError(#[from] zip::result::ZipError),

    #[error("No extraction archive is open")]
    NoArchive,

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Invalid version {version:?}: {source}")]
    VersionError {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("Plugin not loaded: {0}")]
    NotLoaded(String),

    /// The plugin's own failure, carried unchanged so callers can inspect it.
    #[error("Plugin '{name}' failed: {source}")]
    PluginFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl HostError {
    /// The plugin-originated error behind a `PluginFailed`, if any.
    pub fn plugin_error(&self) -> Option<&anyhow::Error> {
        match self {
            HostError::PluginFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type HostResult<T> = Result<T, HostError>;
