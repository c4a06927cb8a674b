//! CSV output formatter
use crate::error::HostError;
use crate::formats::traits::OutputFormatter;
use crate::plugins::manager::{PluginCounts, PluginListing};
use csv::Writer;
use serde_json::Value;

/// CSV formatter that outputs data in comma-separated values format
pub struct CsvFormatter;

fn platforms(listing: &PluginListing) -> String {
    listing
        .platforms
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(";")
}

impl OutputFormatter for CsvFormatter {
    fn format_plugins(&self, plugins: &[PluginListing]) -> Result<String, HostError> {
        let mut wtr = Writer::from_writer(vec![]);

        wtr.write_record([
            "name",
            "version",
            "author",
            "status",
            "enabled",
            "compatible",
            "platforms",
            "description",
            "origin",
        ])?;

        for plugin in plugins {
            wtr.write_record(&[
                plugin.name.clone(),
                plugin.version.clone(),
                plugin.author.clone(),
                plugin.status.to_string(),
                plugin.enabled.to_string(),
                plugin.compatible.to_string(),
                platforms(plugin),
                plugin.description.clone(),
                plugin.origin.clone(),
            ])?;
        }

        wtr.flush()?;
        let data = wtr.into_inner()?;
        Ok(String::from_utf8(data)?)
    }

    fn format_counts(&self, counts: &PluginCounts) -> Result<String, HostError> {
        let mut wtr = Writer::from_writer(vec![]);

        wtr.write_record(["total_discovered", "loaded", "active", "error"])?;
        wtr.write_record(&[
            counts.total_discovered.to_string(),
            counts.loaded.to_string(),
            counts.active.to_string(),
            counts.error.to_string(),
        ])?;

        wtr.flush()?;
        let data = wtr.into_inner()?;
        Ok(String::from_utf8(data)?)
    }

    fn format_results(&self, results: &[(String, Value)]) -> Result<String, HostError> {
        let mut wtr = Writer::from_writer(vec![]);

        wtr.write_record(["plugin", "result"])?;
        for (plugin, result) in results {
            wtr.write_record(&[plugin.clone(), serde_json::to_string(result)?])?;
        }

        wtr.flush()?;
        let data = wtr.into_inner()?;
        Ok(String::from_utf8(data)?)
    }
}
