use clap::Parser;
use serde::Deserialize;

use crate::{commands::Command, error::Result};

const DEFAULT_CONFIG_PATH: &str = "config/taxreport.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// JSON file holding the connection settings.
    pub state_path: String,
    /// Directory downloaded documents are cached in.
    pub cache_dir: String,
    pub level: String,
    /// Skip wiping the document cache at startup.
    pub keep_cache: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            state_path: "config/connection.json".to_string(),
            cache_dir: "cache/documents".to_string(),
            level: "info".to_string(),
            keep_cache: false,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "taxreport", about = "Record tax-deductible expenses and their documents")]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override the connection settings file.
    #[arg(long)]
    state_path: Option<String>,
    /// Override the document cache directory.
    #[arg(long)]
    cache_dir: Option<String>,
    /// Override the log level (e.g. debug).
    #[arg(long)]
    level: Option<String>,
    /// Keep documents cached by previous runs.
    #[arg(long)]
    keep_cache: bool,

    #[command(subcommand)]
    command: Command,
}

pub fn load() -> Result<(AppConfig, Command)> {
    let args = Args::parse();

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("TAXREPORT"));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(state_path) = args.state_path {
        settings.state_path = state_path;
    }
    if let Some(cache_dir) = args.cache_dir {
        settings.cache_dir = cache_dir;
    }
    if let Some(level) = args.level {
        settings.level = level;
    }
    if args.keep_cache {
        settings.keep_cache = true;
    }

    Ok((settings, args.command))
}
