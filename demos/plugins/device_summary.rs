//! Plugin library summarising the open extraction
use extractparser::export_plugin;
use extractparser::plugins::{ForensicPlugin, PluginArgs, PluginMetadata, TargetOs};
use extractparser::services::Services;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct DeviceSummary {
    services: Arc<Services>,
    runs: u64,
}

impl ForensicPlugin for DeviceSummary {
    fn new(services: Arc<Services>) -> Self {
        Self { services, runs: 0 }
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new(
            "DeviceSummary",
            "1.0.0",
            "Platform and entry count of the open extraction",
            "extractparser",
        )
        .with_target_os(&[TargetOs::Ios, TargetOs::Android])
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        self.services.set_state("device_summary.initialized", json!(true));
        Ok(())
    }

    fn execute(&mut self, args: &PluginArgs) -> anyhow::Result<Value> {
        self.runs += 1;
        let entries = self
            .services
            .archive_entries()
            .map(|entries| entries.len())
            .unwrap_or(0);
        self.services
            .log_info(&format!("summarised {} archive entries", entries));

        Ok(json!({
            "platform": self.services.detect_platform(),
            "entries": entries,
            "runs": self.runs,
            "label": args.get("label").cloned().unwrap_or(Value::Null),
        }))
    }

    fn cleanup(&mut self) {
        self.services.set_state("device_summary.cleaned", json!(true));
    }
}

export_plugin!(DeviceSummary);
