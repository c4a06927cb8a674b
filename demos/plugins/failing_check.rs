//! Plugin library whose check always fails
use extractparser::export_plugin;
use extractparser::plugins::{ForensicPlugin, PluginArgs, PluginMetadata};
use extractparser::services::Services;
use serde_json::Value;
use std::sync::Arc;

pub struct FailingCheck;

impl ForensicPlugin for FailingCheck {
    fn new(_services: Arc<Services>) -> Self {
        FailingCheck
    }

    fn metadata(&self) -> PluginMetadata {
        PluginMetadata::new("FailingCheck", "0.1.0", "Keychain integrity check", "extractparser")
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn execute(&mut self, _args: &PluginArgs) -> anyhow::Result<Value> {
        anyhow::bail!("keychain database is locked")
    }

    fn cleanup(&mut self) {}
}

export_plugin!(FailingCheck);
