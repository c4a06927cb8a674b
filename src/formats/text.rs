//! Text (table) output formatter
use crate::error::HostError;
use crate::formats::traits::OutputFormatter;
use crate::plugins::manager::{PluginCounts, PluginListing};
use prettytable::{Cell, Row, Table};
use serde_json::Value;

/// Text formatter that outputs data in a human-readable table format
pub struct TextFormatter;

fn header(titles: &[&str]) -> Row {
    Row::new(titles.iter().map(|t| Cell::new(t).style_spec("c")).collect())
}

impl OutputFormatter for TextFormatter {
    fn format_plugins(&self, plugins: &[PluginListing]) -> Result<String, HostError> {
        if plugins.is_empty() {
            return Ok("No plugins found.".to_string());
        }

        let mut table = Table::new();
        table.set_format(*prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(header(&[
            "NAME",
            "VERSION",
            "STATUS",
            "ENABLED",
            "COMPATIBLE",
            "PLATFORMS",
            "DESCRIPTION",
        ]));

        for plugin in plugins {
            let platforms = plugin
                .platforms
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            table.add_row(Row::new(vec![
                Cell::new(&plugin.name),
                Cell::new(&plugin.version),
                Cell::new(plugin.status.as_str()),
                Cell::new(if plugin.enabled { "yes" } else { "no" }),
                Cell::new(if plugin.compatible { "yes" } else { "no" }),
                Cell::new(&platforms),
                Cell::new(&plugin.description),
            ]));
        }

        Ok(table.to_string())
    }

    fn format_counts(&self, counts: &PluginCounts) -> Result<String, HostError> {
        let mut table = Table::new();
        table.set_format(*prettytable::format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
        table.set_titles(header(&["DISCOVERED", "LOADED", "ACTIVE", "ERROR"]));
        table.add_row(Row::new(vec![
            Cell::new(&counts.total_discovered.to_string()),
            Cell::new(&counts.loaded.to_string()),
            Cell::new(&counts.active.to_string()),
            Cell::new(&counts.error.to_string()),
        ]));

        Ok(table.to_string())
    }

    fn format_results(&self, results: &[(String, Value)]) -> Result<String, HostError> {
        let mut output = String::new();

        for (plugin, result) in results {
            output.push_str(&format!("=== {} ===\n", plugin));
            output.push_str(&serde_json::to_string_pretty(result)?);
            output.push('\n');
        }

        Ok(output)
    }
}
