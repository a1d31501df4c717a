//! Persisted watch state.
//!
//! The daemon's memory of what it has already generated lives in a single
//! JSON document on disk: a [`WatchState`] mapping canonical [`StateKey`]
//! strings to per-entry [`ServerState`] records. The file is rewritten
//! whole at the end of every cycle through [`StateStore::save`], which uses
//! a write-new-then-replace discipline so readers (and the next process)
//! never observe a torn file.

use std::{collections::BTreeMap, fmt, path::PathBuf, str::FromStr};

use chrono::{DateTime, Utc};
use packwatch_config::{PackageKind, TransportKind};
use packwatch_registry::PackageEntry;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::{CoreError, ErrorContext},
    CoreResult,
};

/// Canonical identity of a processed entry.
///
/// Formats as `<namespace>/<name>@<version>:<packageType>:<transportType>`;
/// the separators are part of the on-disk contract and round-trip through
/// [`FromStr`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct StateKey {
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub package_type: PackageKind,
    pub transport_type: TransportKind,
}

impl StateKey {
    pub fn from_entry(entry: &PackageEntry) -> Self {
        Self {
            namespace: entry.namespace.clone(),
            name: entry.name.clone(),
            version: entry.version.clone(),
            package_type: entry.package_type,
            transport_type: entry.transport_type,
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}:{}:{}",
            self.namespace, self.name, self.version, self.package_type, self.transport_type
        )
    }
}

impl FromStr for StateKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidStateKey(s.to_string());

        let (rest, transport) = s.rsplit_once(':').ok_or_else(invalid)?;
        let (rest, package) = rest.rsplit_once(':').ok_or_else(invalid)?;
        let (rest, version) = rest.rsplit_once('@').ok_or_else(invalid)?;
        let (namespace, name) = rest.split_once('/').ok_or_else(invalid)?;

        if namespace.is_empty() || name.is_empty() || version.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            package_type: package.parse().map_err(|_| invalid())?,
            transport_type: transport.parse().map_err(|_| invalid())?,
        })
    }
}

/// Persisted record of one processed entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerState {
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub package_type: PackageKind,
    pub transport_type: TransportKind,
    /// The registry-reported last-modified instant at generation time.
    pub updated_at: DateTime<Utc>,
    /// Set only after a successful generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

/// Persisted root state: poll watermark plus all processed entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchState {
    #[serde(default)]
    pub last_poll: Option<DateTime<Utc>>,
    #[serde(default)]
    pub servers: BTreeMap<String, ServerState>,
}

impl WatchState {
    /// Whether the given entry is outstanding.
    ///
    /// An entry needs generation when its key has never been recorded, when
    /// the registry reports it changed since it was recorded, or when
    /// force-overwrite is enabled.
    pub fn needs_generation(
        &self,
        key: &StateKey,
        updated_at: DateTime<Utc>,
        force_overwrite: bool,
    ) -> bool {
        if force_overwrite {
            return true;
        }
        match self.servers.get(&key.to_string()) {
            Some(existing) => existing.updated_at < updated_at,
            None => true,
        }
    }

    /// Records a successful generation for `entry`.
    pub fn record_generated(&mut self, entry: &PackageEntry, generated_at: DateTime<Utc>) {
        let key = StateKey::from_entry(entry).to_string();
        self.servers.insert(
            key,
            ServerState {
                namespace: entry.namespace.clone(),
                name: entry.name.clone(),
                version: entry.version.clone(),
                package_type: entry.package_type,
                transport_type: entry.transport_type,
                updated_at: entry.updated_at,
                generated_at: Some(generated_at),
            },
        );
    }

    /// Advances the poll watermark. `last_poll` never moves backwards.
    pub fn record_poll(&mut self, polled_at: DateTime<Utc>) {
        if self.last_poll.is_none_or(|prev| prev <= polled_at) {
            self.last_poll = Some(polled_at);
        }
    }
}

/// Owns the persisted state file.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Loads the persisted state.
    ///
    /// A missing file yields an empty state. A file that fails to parse is
    /// logged and discarded, also yielding an empty state: corrupted state
    /// degrades to re-generation, it never prevents startup.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::IoError`] only for real I/O failures such as
    /// permission errors.
    pub fn load(&self) -> CoreResult<WatchState> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting fresh", self.path.display());
                return Ok(WatchState::default());
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("reading state file {}", self.path.display())
                });
            }
        };

        match serde_json::from_slice(&content) {
            Ok(state) => Ok(state),
            Err(err) => {
                warn!(
                    "State file {} is malformed ({err}), discarding it",
                    self.path.display()
                );
                Ok(WatchState::default())
            }
        }
    }

    /// Persists the whole state durably.
    ///
    /// The serialized document is written to a sibling temporary file and
    /// atomically renamed over the target, so a crash mid-save leaves the
    /// previous state intact and parsable.
    pub fn save(&self, state: &WatchState) -> CoreResult<()> {
        let content = serde_json::to_vec_pretty(state)?;
        packwatch_utils::fs::atomic_write(&self.path, &content)?;
        debug!(
            servers = state.servers.len(),
            "Persisted watch state to {}",
            self.path.display()
        );
        Ok(())
    }
}
