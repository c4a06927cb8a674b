//! JSON output formatter
use crate::error::HostError;
use crate::formats::traits::OutputFormatter;
use crate::plugins::manager::{PluginCounts, PluginListing};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Serialize)]
struct OutputWrapper<T> {
    kind: String,
    timestamp: String,
    count: usize,
    results: T,
}

fn wrap<T: Serialize>(kind: &str, count: usize, results: T) -> Result<String, HostError> {
    let wrapper = OutputWrapper {
        kind: kind.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        count,
        results,
    };

    Ok(serde_json::to_string_pretty(&wrapper)?)
}

/// JSON formatter that outputs data in JSON format with metadata
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_plugins(&self, plugins: &[PluginListing]) -> Result<String, HostError> {
        wrap("plugins", plugins.len(), plugins)
    }

    fn format_counts(&self, counts: &PluginCounts) -> Result<String, HostError> {
        wrap("counts", 1, counts)
    }

    fn format_results(&self, results: &[(String, Value)]) -> Result<String, HostError> {
        let by_plugin: Map<String, Value> = results.iter().cloned().collect();
        wrap("results", results.len(), by_plugin)
    }
}
