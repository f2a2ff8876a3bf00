//! Effective run settings: CLI flags over config file over built-in defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use harvester_core::config::load_file_config;
use harvester_core::resolve::DEFAULT_DIAGNOSTICS_DIR;
use harvester_core::search::DEFAULT_MAX_RESULTS;
use harvester_core::transport::DEFAULT_REQUEST_TIMEOUT;
use harvester_core::{FileConfig, load_default_file_config};
use tracing::debug;

use crate::cli::{Args, Command};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunSettings {
    pub timeout: Duration,
    pub mailto: Option<String>,
    /// `None` when diagnostics are disabled.
    pub diagnostics_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub max_results: usize,
    pub usage_log: Option<PathBuf>,
}

impl RunSettings {
    pub(crate) fn resolve(args: &Args, file: &FileConfig) -> Self {
        let timeout = args
            .timeout
            .or(file.timeout_secs)
            .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs);

        let diagnostics_dir = if args.no_debug || (file.debug == Some(false) && args.debug_dir.is_none()) {
            None
        } else {
            Some(
                args.debug_dir
                    .clone()
                    .or_else(|| file.debug_dir.clone())
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DIAGNOSTICS_DIR)),
            )
        };

        let cli_max = match &args.command {
            Command::Search(search) => search.max_results.and_then(|n| usize::try_from(n).ok()),
            Command::Fetch(_) => None,
        };

        Self {
            timeout,
            mailto: file.mailto.clone(),
            diagnostics_dir,
            output_dir: file.output_dir.clone(),
            max_results: cli_max.or(file.max_results).unwrap_or(DEFAULT_MAX_RESULTS),
            usage_log: file.usage_log.clone(),
        }
    }
}

/// Reads `--config` when given, else the default location, then applies
/// environment fallbacks.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let config = if let Some(path) = explicit {
        load_file_config(path)
            .with_context(|| format!("Failed to load config file '{}'", path.display()))?
    } else {
        let loaded = load_default_file_config().context("Failed to load default config file")?;
        debug!(path = ?loaded.path, from_file = loaded.loaded_from_file(), "config resolved");
        loaded.into_config()
    };
    Ok(config.with_env_fallbacks())
}
