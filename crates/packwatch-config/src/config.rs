use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use packwatch_utils::time::parse_duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    error::{ConfigError, Result},
    types::{PackageKind, TransportKind},
};

/// Floor applied to the configured poll interval.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(5);

const DEFAULT_POLL_INTERVAL: &str = "30s";
const DEFAULT_REGISTRY_URL: &str = "https://registry.packwatch.dev/v0/servers";
const DEFAULT_OUTPUT_DIR: &str = "packs";
const DEFAULT_STATE_FILE: &str = "packwatch-state.json";

/// Application's configuration, as read from `packwatch.toml`.
///
/// Optional fields fall back to built-in defaults; list fields left empty
/// mean "no restriction". Use [`Config::settings`] to obtain the validated,
/// typed form the daemon runs with.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// URL of the registry listing endpoint.
    pub registry_url: Option<String>,

    /// How often to poll the registry (e.g. "30s", "5m", "1h").
    /// Default: 30s
    pub poll_interval: Option<String>,

    /// Directory where generated packs are written.
    /// Default: ./packs
    pub output_dir: Option<String>,

    /// Path of the persisted watch state file.
    /// Default: ./packwatch-state.json
    pub state_file: Option<String>,

    /// Package types eligible for generation. Empty means all.
    pub package_types: Option<Vec<String>>,

    /// Transport types eligible for generation. Empty means all.
    pub transport_types: Option<Vec<String>>,

    /// Evaluate what would be generated without writing packs.
    /// Default: false
    pub dry_run: Option<bool>,

    /// Regenerate packs even for entries already recorded in state.
    /// Default: false
    pub force_overwrite: Option<bool>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_url: Some(DEFAULT_REGISTRY_URL.to_string()),
            poll_interval: Some(DEFAULT_POLL_INTERVAL.to_string()),
            output_dir: Some(DEFAULT_OUTPUT_DIR.to_string()),
            state_file: Some(DEFAULT_STATE_FILE.to_string()),
            package_types: None,
            transport_types: None,
            dry_run: None,
            force_overwrite: None,
        }
    }
}

/// Validated, typed settings the daemon runs with.
#[derive(Clone, Debug)]
pub struct WatchSettings {
    pub registry_url: String,
    pub poll_interval: Duration,
    pub output_dir: PathBuf,
    pub state_file: PathBuf,
    pub package_types: Vec<PackageKind>,
    pub transport_types: Vec<TransportKind>,
    pub dry_run: bool,
    pub force_overwrite: bool,
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// A missing file yields the built-in defaults. A present but malformed
    /// file is an error and prevents startup.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::IoError(err)),
        }
    }

    /// Validates the raw configuration into [`WatchSettings`].
    ///
    /// # Errors
    ///
    /// * [`ConfigError::InvalidPollInterval`] for an unparsable interval.
    /// * [`ConfigError::InvalidPackageType`] / [`ConfigError::InvalidTransportType`]
    ///   for unknown allow-list values.
    /// * [`ConfigError::MissingRegistryUrl`] for an empty registry URL.
    pub fn settings(&self) -> Result<WatchSettings> {
        let registry_url = self
            .registry_url
            .clone()
            .unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string());
        if registry_url.trim().is_empty() {
            return Err(ConfigError::MissingRegistryUrl);
        }

        let raw_interval = self.poll_interval.as_deref().unwrap_or(DEFAULT_POLL_INTERVAL);
        let mut poll_interval = parse_duration(raw_interval)
            .filter(|d| !d.is_zero())
            .ok_or_else(|| ConfigError::InvalidPollInterval(raw_interval.to_string()))?;
        if poll_interval < MIN_POLL_INTERVAL {
            warn!(
                "Poll interval {raw_interval} is below the {}s floor, clamping",
                MIN_POLL_INTERVAL.as_secs()
            );
            poll_interval = MIN_POLL_INTERVAL;
        }

        Ok(WatchSettings {
            registry_url,
            poll_interval,
            output_dir: PathBuf::from(
                self.output_dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR),
            ),
            state_file: PathBuf::from(
                self.state_file.as_deref().unwrap_or(DEFAULT_STATE_FILE),
            ),
            package_types: parse_package_types(self.package_types.as_deref().unwrap_or(&[]))?,
            transport_types: parse_transport_types(
                self.transport_types.as_deref().unwrap_or(&[]),
            )?,
            dry_run: self.dry_run.unwrap_or(false),
            force_overwrite: self.force_overwrite.unwrap_or(false),
        })
    }
}

/// Parses package-type allow-list values into the closed vocabulary.
pub fn parse_package_types<S: AsRef<str>>(values: &[S]) -> Result<Vec<PackageKind>> {
    values.iter().map(|v| v.as_ref().trim().parse()).collect()
}

/// Parses transport-type allow-list values into the closed vocabulary.
pub fn parse_transport_types<S: AsRef<str>>(values: &[S]) -> Result<Vec<TransportKind>> {
    values.iter().map(|v| v.as_ref().trim().parse()).collect()
}

/// Splits a comma-separated allow-list argument into its values.
///
/// Empty segments are dropped, so `"npm,,pypi,"` parses the same as
/// `"npm,pypi"`.
pub fn split_list_arg(arg: &str) -> Vec<String> {
    arg.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Writes a default configuration file to `path`.
///
/// # Errors
///
/// Returns [`ConfigError::ConfigAlreadyExists`] if the file is already
/// present; an existing configuration is never overwritten.
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        return Err(ConfigError::ConfigAlreadyExists);
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        packwatch_utils::fs::ensure_dir_exists(parent)?;
    }

    let content = toml::to_string_pretty(&Config::default())?;
    fs::write(path, content)?;
    Ok(())
}
