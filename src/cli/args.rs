//! Command-line argument parsing for the extraction plugin host
use crate::plugins::plugin_trait::TargetOs;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "extparser")]
#[command(about = "Plugin host for mobile forensic extractions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Plugin directory to scan; repeatable, later directories override earlier ones
    #[arg(short, long = "plugin-dir", value_name = "DIR")]
    pub plugin_dirs: Vec<std::path::PathBuf>,

    /// JSON config file with plugin directories and core version
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<std::path::PathBuf>,

    /// ZIP filesystem extraction to open for plugins
    #[arg(long, value_name = "ZIP")]
    pub archive: Option<std::path::PathBuf>,

    /// Target platform (default: detected from the archive)
    #[arg(long, value_enum)]
    pub platform: Option<PlatformArg>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormatArg,

    /// Output file (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<std::path::PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    pub debug: bool,

    /// Enable verbose output (lifecycle and status messages)
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// List discovered plugins
    List {
        /// Include disabled plugins
        #[arg(short, long)]
        all: bool,

        /// Only show plugins compatible with the target platform
        #[arg(long)]
        platform_filter: bool,

        /// Filter by plugin name (regex)
        #[arg(long)]
        name: Option<String>,
    },

    /// Show discovery and lifecycle counts
    Count,

    /// Load and execute plugins
    Run {
        /// Plugin to run
        name: Option<String>,

        /// Run every loadable plugin
        #[arg(short, long, conflicts_with = "name")]
        all: bool,

        /// Positional argument passed to the plugin (JSON, or a plain string)
        #[arg(long = "arg", value_name = "JSON")]
        args: Vec<String>,

        /// Keyword argument passed to the plugin
        #[arg(long = "kwarg", value_name = "KEY=JSON")]
        kwargs: Vec<String>,
    },

    /// Show a plugin's metadata
    Info {
        /// Plugin name
        name: String,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormatArg {
    Text,
    Csv,
    Json,
    Jsonl,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum PlatformArg {
    Any,
    Ios,
    Android,
    Unknown,
}

impl From<PlatformArg> for TargetOs {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Any => TargetOs::Any,
            PlatformArg::Ios => TargetOs::Ios,
            PlatformArg::Android => TargetOs::Android,
            PlatformArg::Unknown => TargetOs::Unknown,
        }
    }
}
