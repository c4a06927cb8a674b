//! Output format traits for plugin listings, counts and run results
use crate::error::HostError;
use crate::plugins::manager::{PluginCounts, PluginListing};
use serde_json::Value;

/// Trait for output formatters
pub trait OutputFormatter: Send + Sync {
    fn format_plugins(&self, plugins: &[PluginListing]) -> Result<String, HostError>;
    fn format_counts(&self, counts: &PluginCounts) -> Result<String, HostError>;
    /// Render plugin results keyed by plugin name.
    fn format_results(&self, results: &[(String, Value)]) -> Result<String, HostError>;
}

/// Enum for output format types
#[derive(Debug, Clone, PartialEq)]
pub enum OutputFormat {
    Text,
    Csv,
    Json,
    Jsonl,
}

/// Enum for output destination
#[derive(Debug, Clone)]
pub enum OutputDestination {
    Stdout,
    File(std::path::PathBuf),
}

/// Output writer that combines format and destination
pub struct OutputWriter {
    formatter: Box<dyn OutputFormatter>,
    destination: OutputDestination,
}

impl OutputWriter {
    /// Create a new output writer
    pub fn new(format: OutputFormat, destination: OutputDestination) -> Self {
        let formatter: Box<dyn OutputFormatter> = match format {
            OutputFormat::Text => Box::new(crate::formats::text::TextFormatter),
            OutputFormat::Csv => Box::new(crate::formats::csv::CsvFormatter),
            OutputFormat::Json => Box::new(crate::formats::json::JsonFormatter),
            OutputFormat::Jsonl => Box::new(crate::formats::jsonl::JsonlFormatter),
        };

        Self {
            formatter,
            destination,
        }
    }

    pub fn write_plugins(&self, plugins: &[PluginListing]) -> Result<(), HostError> {
        let content = self.formatter.format_plugins(plugins)?;
        self.emit(content)
    }

    pub fn write_counts(&self, counts: &PluginCounts) -> Result<(), HostError> {
        let content = self.formatter.format_counts(counts)?;
        self.emit(content)
    }

    pub fn write_results(&self, results: &[(String, Value)]) -> Result<(), HostError> {
        let content = self.formatter.format_results(results)?;
        self.emit(content)
    }

    fn emit(&self, content: String) -> Result<(), HostError> {
        match &self.destination {
            OutputDestination::Stdout => {
                println!("{}", content);
            }
            OutputDestination::File(path) => {
                std::fs::write(path, content)?;
            }
        }

        Ok(())
    }
}
