//! File configuration for CLI defaults.
//!
//! The file is line oriented: `key = value`, one per line, `#` starts a
//! comment outside quotes, strings are double-quoted, booleans are
//! `true`/`false`. Unknown keys are rejected so typos surface early.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

/// Environment variable supplying the metadata API contact address.
pub const MAILTO_ENV: &str = "OPENALEX_MAILTO";
/// Environment variable enabling the local usage log.
pub const USAGE_LOG_ENV: &str = "HARVESTER_USAGE_LOG";

/// Errors raised while reading or validating the config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config syntax on line {line}: expected key = value")]
    Syntax { line: usize },

    #[error("unknown configuration key '{key}' on line {line}")]
    UnknownKey { key: String, line: usize },

    #[error("invalid `{key}` value on line {line}: {reason}")]
    InvalidValue {
        key: String,
        line: usize,
        reason: String,
    },

    #[error("invalid config value for `{key}`: {value}. Expected range: {expected}")]
    OutOfRange {
        key: &'static str,
        value: u64,
        expected: &'static str,
    },
}

/// Values read from the config file. Every field is optional; CLI flags win
/// over file values and file values win over built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Contact address sent to the metadata API.
    pub mailto: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Where resolution diagnostics are written.
    pub debug_dir: Option<PathBuf>,
    /// Whether diagnostics are written at all.
    pub debug: Option<bool>,
    /// Default PDF output directory.
    pub output_dir: Option<PathBuf>,
    /// Default search row limit.
    pub max_results: Option<usize>,
    /// JSON-lines usage log path.
    pub usage_log: Option<PathBuf>,
}

impl FileConfig {
    /// Validates value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] naming the offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(timeout) = self.timeout_secs
            && !(1..=3600).contains(&timeout)
        {
            return Err(ConfigError::OutOfRange {
                key: "timeout_secs",
                value: timeout,
                expected: "1..=3600",
            });
        }
        if let Some(max) = self.max_results
            && !(1..=10_000).contains(&max)
        {
            return Err(ConfigError::OutOfRange {
                key: "max_results",
                value: max as u64,
                expected: "1..=10000",
            });
        }
        Ok(())
    }

    /// Fills unset values from `OPENALEX_MAILTO` and `HARVESTER_USAGE_LOG`.
    #[must_use]
    pub fn with_env_fallbacks(self) -> Self {
        self.with_fallbacks_from(|name| env::var(name).ok())
    }

    fn with_fallbacks_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if self.mailto.is_none() {
            self.mailto = non_empty(MAILTO_ENV);
        }
        if self.usage_log.is_none() {
            self.usage_log = non_empty(USAGE_LOG_ENV).map(PathBuf::from);
        }
        self
    }
}

/// Loaded config plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path, when a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed config when the file exists.
    pub config: Option<FileConfig>,
}

impl LoadedConfig {
    #[must_use]
    pub fn loaded_from_file(&self) -> bool {
        self.config.is_some()
    }

    /// The parsed config, or defaults when no file was found.
    #[must_use]
    pub fn into_config(self) -> FileConfig {
        self.config.unwrap_or_default()
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/harvester/config.toml`
/// 2. `$HOME/.config/harvester/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("harvester")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("harvester")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path if present.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file exists but cannot be read or parsed.
pub fn load_default_file_config() -> Result<LoadedConfig, ConfigError> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

/// Loads and validates a specific config file.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read, has a syntax error,
/// an unknown key, or an out-of-range value.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config_str(&raw)?;
    debug!(path = %path.display(), "loaded config file");
    Ok(config)
}

fn parse_config_str(raw: &str) -> Result<FileConfig, ConfigError> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_no = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            return Err(ConfigError::Syntax { line: line_no });
        };
        let key = raw_key.trim();
        let value = raw_value.trim();
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: key.to_string(),
            line: line_no,
            reason,
        };

        match key {
            "mailto" => cfg.mailto = Some(parse_string_literal(value).map_err(invalid)?),
            "timeout_secs" => cfg.timeout_secs = Some(parse_integer_u64(value).map_err(invalid)?),
            "debug_dir" => {
                cfg.debug_dir = Some(PathBuf::from(parse_string_literal(value).map_err(invalid)?));
            }
            "debug" => cfg.debug = Some(parse_boolean(value).map_err(invalid)?),
            "output_dir" => {
                cfg.output_dir = Some(PathBuf::from(parse_string_literal(value).map_err(invalid)?));
            }
            "max_results" => {
                let parsed = parse_integer_u64(value).map_err(invalid)?;
                let n = usize::try_from(parsed)
                    .map_err(|_| invalid("integer value out of range".to_string()))?;
                cfg.max_results = Some(n);
            }
            "usage_log" => {
                cfg.usage_log = Some(PathBuf::from(parse_string_literal(value).map_err(invalid)?));
            }
            unknown => {
                return Err(ConfigError::UnknownKey {
                    key: unknown.to_string(),
                    line: line_no,
                });
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String, String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        return Err("expected double-quoted string".to_string());
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u64(raw_value: &str) -> Result<u64, String> {
    let token = raw_value.trim();
    if token.is_empty() {
        return Err("expected integer value".to_string());
    }
    let value = token.parse::<i128>().map_err(|e| e.to_string())?;
    if value < 0 {
        return Err("expected non-negative integer".to_string());
    }
    u64::try_from(value).map_err(|_| "integer value out of range for u64".to_string())
}

fn parse_boolean(raw_value: &str) -> Result<bool, String> {
    match raw_value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err("expected 'true' or 'false'".to_string()),
    }
}
