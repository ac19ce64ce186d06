//! Queue options loader
//!
//! Loads [`QueueOptions`] from environment variables or a file.
//!
//! ## Loading Strategy
//! 1. Environment variables, if `SPILLWAY_BUFFER_SIZE` is set
//! 2. Otherwise the first config file found by [`probe_config_paths`]
//! 3. JSON and TOML are both accepted, picked by file extension
//!
//! ## Environment Variables
//! - `SPILLWAY_BUFFER_SIZE`: ingress capacity (required)
//! - `SPILLWAY_QUEUE_NAME`: base queue name
//! - `SPILLWAY_NAMESPACE`: queue name namespace
//! - `SPILLWAY_OVERFLOW_THRESHOLD_BYTES`: bodies above this go to the blob store
//! - `SPILLWAY_VISIBILITY_TIMEOUT`: visibility timeout in seconds
//! - `SPILLWAY_MAX_RETRY_ATTEMPTS`: attempt budget for every call class
//! - `SPILLWAY_REPLACE_EXISTING_QUEUE`: recreate a non-empty queue (true/false)
//!
//! Values are only parsed here; bounds are checked by
//! [`QueueOptions::validate`].

use std::path::{Path, PathBuf};
use std::str::FromStr;

use spillway_domain::{DomainError, QueueOptions, Result};

pub const ENV_BUFFER_SIZE: &str = "SPILLWAY_BUFFER_SIZE";
pub const ENV_QUEUE_NAME: &str = "SPILLWAY_QUEUE_NAME";
pub const ENV_NAMESPACE: &str = "SPILLWAY_NAMESPACE";
pub const ENV_OVERFLOW_THRESHOLD: &str = "SPILLWAY_OVERFLOW_THRESHOLD_BYTES";
pub const ENV_VISIBILITY_TIMEOUT: &str = "SPILLWAY_VISIBILITY_TIMEOUT";
pub const ENV_MAX_RETRY_ATTEMPTS: &str = "SPILLWAY_MAX_RETRY_ATTEMPTS";
pub const ENV_REPLACE_EXISTING: &str = "SPILLWAY_REPLACE_EXISTING_QUEUE";

const FILE_STEMS: [&str; 2] = ["spillway", "config"];
const FILE_EXTENSIONS: [&str; 2] = ["json", "toml"];

/// Load options from the environment, falling back to a config file
///
/// # Errors
/// Returns `DomainError::Config` when neither source yields options or a
/// value cannot be parsed.
pub fn load() -> Result<QueueOptions> {
    match load_from_env() {
        Ok(options) => {
            tracing::info!("Queue options loaded from environment variables");
            Ok(options)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Falling back to config file");
            load_from_file(None)
        }
    }
}

pub fn load_from_env() -> Result<QueueOptions> {
    load_from_lookup(|key| std::env::var(key).ok())
}

/// Build options from an arbitrary key lookup
///
/// `lookup` receives the `SPILLWAY_*` variable names listed in the module
/// documentation.
pub fn load_from_lookup<F>(lookup: F) -> Result<QueueOptions>
where
    F: Fn(&str) -> Option<String>,
{
    let buffer_size = lookup(ENV_BUFFER_SIZE).ok_or_else(|| {
        DomainError::config(
            ENV_BUFFER_SIZE,
            format!("Missing required environment variable: {ENV_BUFFER_SIZE}"),
        )
    })?;

    let mut options = QueueOptions::new(parse(ENV_BUFFER_SIZE, &buffer_size)?);
    options.name = lookup(ENV_QUEUE_NAME);
    options.namespace = lookup(ENV_NAMESPACE);

    if let Some(raw) = lookup(ENV_OVERFLOW_THRESHOLD) {
        options.overflow_threshold_bytes = parse(ENV_OVERFLOW_THRESHOLD, &raw)?;
    }
    if let Some(raw) = lookup(ENV_VISIBILITY_TIMEOUT) {
        options.visibility_timeout_secs = Some(parse(ENV_VISIBILITY_TIMEOUT, &raw)?);
    }
    if let Some(raw) = lookup(ENV_MAX_RETRY_ATTEMPTS) {
        options = options.with_max_retry_attempts(parse(ENV_MAX_RETRY_ATTEMPTS, &raw)?);
    }
    if let Some(raw) = lookup(ENV_REPLACE_EXISTING) {
        options.replace_existing_queue = parse_bool(ENV_REPLACE_EXISTING, &raw)?;
    }

    Ok(options)
}

/// Load options from `path`, or from the first probed location when `None`
pub fn load_from_file(path: Option<PathBuf>) -> Result<QueueOptions> {
    let config_path = match path {
        Some(p) if p.exists() => p,
        Some(p) => {
            return Err(DomainError::config(
                "config_file",
                format!("Config file not found: {}", p.display()),
            ))
        }
        None => probe_config_paths().ok_or_else(|| {
            DomainError::config("config_file", "No config file found in any of the standard locations")
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading queue options from file");

    let contents = std::fs::read_to_string(&config_path).map_err(|e| {
        DomainError::config("config_file", format!("Failed to read config file: {e}"))
    })?;

    parse_options(&contents, &config_path)
}

fn parse_options(contents: &str, path: &Path) -> Result<QueueOptions> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| DomainError::config("config_file", format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| DomainError::config("config_file", format!("Invalid JSON format: {e}"))),
        other => Err(DomainError::config(
            "config_file",
            format!("Unsupported config format: {other}"),
        )),
    }
}

/// First existing `spillway.*` or `config.*` file in the working directory,
/// its two parents, or next to the executable
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd.clone());
        roots.push(cwd.join(".."));
        roots.push(cwd.join("../.."));
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
        roots.push(exe_dir);
    }

    probe_in(&roots)
}

fn probe_in(roots: &[PathBuf]) -> Option<PathBuf> {
    roots
        .iter()
        .flat_map(|root| {
            FILE_STEMS.iter().flat_map(move |stem| {
                FILE_EXTENSIONS.iter().map(move |ext| root.join(format!("{stem}.{ext}")))
            })
        })
        .find(|path| path.exists())
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| DomainError::config(key, format!("Invalid value {raw:?}: {e}")))
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn parse_bool(key: &'static str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(DomainError::config(key, format!("Invalid boolean {raw:?}"))),
    }
}
