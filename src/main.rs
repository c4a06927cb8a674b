//! Main entry point for the extraction plugin host
use anyhow::{bail, Context};
use clap::Parser;
use log::{warn, LevelFilter};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::Arc;

use extractparser::cli::args::{Cli, Command, OutputFormatArg};
use extractparser::core::config::HostConfig;
use extractparser::formats::traits::{OutputDestination, OutputFormat, OutputWriter};
use extractparser::plugins::compat::probe_metadata;
use extractparser::plugins::{LoadOutcome, PluginArgs, PluginManager, UnloadOutcome};
use extractparser::services::Services;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let config = build_config(&cli)?;

    let services = Arc::new(Services::new());
    if let Some(archive) = &cli.archive {
        services
            .open_archive(archive)
            .with_context(|| format!("could not open extraction {}", archive.display()))?;
    }

    let mut manager = PluginManager::new(&config, Arc::clone(&services));
    manager.set_target_platform(cli.platform.map(Into::into));

    let output_format = match cli.format {
        OutputFormatArg::Text => OutputFormat::Text,
        OutputFormatArg::Csv => OutputFormat::Csv,
        OutputFormatArg::Json => OutputFormat::Json,
        OutputFormatArg::Jsonl => OutputFormat::Jsonl,
    };

    let output_dest = if let Some(output_path) = &cli.output {
        OutputDestination::File(output_path.clone())
    } else {
        OutputDestination::Stdout
    };

    let output_writer = OutputWriter::new(output_format, output_dest);

    match &cli.command {
        Command::List {
            all,
            platform_filter,
            name,
        } => {
            manager.discover();
            let mut rows = manager.list(*all, *platform_filter);
            if let Some(pattern) = name {
                let re = Regex::new(pattern)?;
                rows.retain(|row| re.is_match(&row.name));
            }
            output_writer.write_plugins(&rows)?;
        }
        Command::Count => {
            manager.discover();
            output_writer.write_counts(&manager.count())?;
        }
        Command::Run {
            name,
            all,
            args,
            kwargs,
        } => {
            let plugin_args = parse_plugin_args(args, kwargs)?;
            if *all {
                run_all_plugins(&mut manager, &plugin_args, &output_writer)?;
            } else if let Some(name) = name {
                run_plugin(&mut manager, name, &plugin_args, &output_writer)?;
            } else {
                bail!("specify a plugin name or --all");
            }
        }
        Command::Info { name } => {
            manager.discover();
            let plugin_type = match manager.types().get(name) {
                Some(plugin_type) => plugin_type,
                None => bail!("Plugin '{}' not found", name),
            };
            let metadata = probe_metadata(plugin_type, manager.services())
                .map_err(|e| anyhow::anyhow!("could not read metadata of {}: {}", name, e))?;
            let info = json!({
                "metadata": metadata,
                "module": plugin_type.module_id(),
                "origin": plugin_type.origin().map(|p| p.display().to_string()),
                "compatible": manager.is_compatible(plugin_type, manager.target_platform()),
                "archive": manager.services().archive_path().map(|p| p.display().to_string()),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}

/// Config file (if any), then `--plugin-dir` entries, then the environment.
fn build_config(cli: &Cli) -> anyhow::Result<HostConfig> {
    let mut config = match &cli.config {
        Some(path) => HostConfig::from_file(path)?,
        None if !cli.plugin_dirs.is_empty() => HostConfig::new(Vec::new()),
        None => HostConfig::default(),
    };
    for dir in &cli.plugin_dirs {
        if !config.plugin_dirs.contains(dir) {
            config.plugin_dirs.push(dir.clone());
        }
    }
    Ok(config.with_env_overrides())
}

/// Arguments are parsed as JSON when possible, otherwise kept as strings.
fn parse_plugin_args(args: &[String], kwargs: &[String]) -> anyhow::Result<PluginArgs> {
    let to_value = |raw: &str| -> Value {
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    };

    let mut plugin_args = PluginArgs::new();
    for raw in args {
        plugin_args = plugin_args.arg(to_value(raw));
    }
    for raw in kwargs {
        let (key, value) = match raw.split_once('=') {
            Some(pair) => pair,
            None => bail!("keyword argument '{}' must be KEY=VALUE", raw),
        };
        plugin_args = plugin_args.kwarg(key, to_value(value));
    }
    Ok(plugin_args)
}

/// Load, execute and unload a single plugin
fn run_plugin(
    manager: &mut PluginManager,
    name: &str,
    args: &PluginArgs,
    output_writer: &OutputWriter,
) -> anyhow::Result<()> {
    manager.discover();
    match manager.try_load(name) {
        LoadOutcome::Loaded | LoadOutcome::AlreadyLoaded => {}
        LoadOutcome::NotFound => bail!("Plugin '{}' not found", name),
        LoadOutcome::Disabled => bail!("Plugin '{}' is disabled", name),
        LoadOutcome::Failed(reason) => bail!("Plugin '{}' failed to load: {}", name, reason),
    }

    // Render a failure before unloading: the error's code lives in the plugin library.
    let result = manager.execute(name, args).map_err(|e| format!("{:#}", e));
    report_unload(name, &manager.unload(name));
    let value = match result {
        Ok(value) => value,
        Err(message) => bail!(message),
    };

    output_writer.write_results(&[(name.to_string(), value)])?;
    Ok(())
}

/// Run every loadable plugin, continuing past individual failures
fn run_all_plugins(
    manager: &mut PluginManager,
    args: &PluginArgs,
    output_writer: &OutputWriter,
) -> anyhow::Result<()> {
    let report = manager.load_all();
    for (name, reason) in &report.failed {
        warn!("Skipping {}: {}", name, reason);
    }

    let mut results = Vec::new();
    let mut failed = 0;
    for name in &report.loaded {
        match manager.execute(name, args) {
            Ok(value) => results.push((name.clone(), value)),
            Err(e) => {
                eprintln!("Plugin {} failed: {:#}", name, e);
                failed += 1;
            }
        }
    }
    for (name, outcome) in manager.unload_all() {
        report_unload(&name, &outcome);
    }

    output_writer.write_results(&results)?;
    if failed > 0 {
        bail!("{} of {} plugins failed", failed, report.loaded.len());
    }
    Ok(())
}

fn report_unload(name: &str, outcome: &UnloadOutcome) {
    if let UnloadOutcome::CleanupFailed(_) = outcome {
        eprintln!("Plugin {} {}", name, outcome);
    }
}
