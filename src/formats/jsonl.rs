//! JSONL (JSON Lines) output formatter
use crate::error::HostError;
use crate::formats::traits::OutputFormatter;
use crate::plugins::manager::{PluginCounts, PluginListing};
use serde_json::{json, Value};

/// JSONL formatter that outputs data as JSON objects, one per line
pub struct JsonlFormatter;

impl OutputFormatter for JsonlFormatter {
    fn format_plugins(&self, plugins: &[PluginListing]) -> Result<String, HostError> {
        let mut output = String::new();

        for plugin in plugins {
            let line = serde_json::to_string(plugin)?;
            output.push_str(&line);
            output.push('\n');
        }

        Ok(output)
    }

    fn format_counts(&self, counts: &PluginCounts) -> Result<String, HostError> {
        let mut output = serde_json::to_string(counts)?;
        output.push('\n');
        Ok(output)
    }

    fn format_results(&self, results: &[(String, Value)]) -> Result<String, HostError> {
        let mut output = String::new();

        for (plugin, result) in results {
            let line = serde_json::to_string(&json!({ "plugin": plugin, "result": result }))?;
            output.push_str(&line);
            output.push('\n');
        }

        Ok(output)
    }
}
