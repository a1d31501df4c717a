//! Pack generation.
//!
//! [`PackGenerator`] is the seam between the reconcile loop and whatever
//! renders deployment artifacts. The bundled [`FsPackGenerator`] writes one
//! directory per entry containing a `pack.json` manifest.

use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use packwatch_registry::PackageEntry;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{CoreError, ErrorContext},
    CoreResult,
};

/// Options controlling a single generation.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Root directory packs are written under.
    pub output_dir: PathBuf,
    /// Replace an existing pack instead of failing.
    pub force_overwrite: bool,
    /// Validate and resolve paths, but write nothing.
    pub dry_run: bool,
}

/// Produces a deployment pack for a resolved entry.
///
/// Implementations are blocking and potentially slow; the reconcile loop
/// runs them on the blocking pool, one entry at a time, and treats every
/// error as non-fatal to the cycle.
pub trait PackGenerator: Send + Sync {
    fn generate(&self, entry: &PackageEntry, opts: &GenerateOptions) -> CoreResult<()>;
}

/// Manifest written into every generated pack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackManifest {
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub package_type: String,
    pub transport_type: String,
    pub updated_at: DateTime<Utc>,
    pub generator: String,
}

impl PackManifest {
    fn for_entry(entry: &PackageEntry) -> Self {
        Self {
            namespace: entry.namespace.clone(),
            name: entry.name.clone(),
            version: entry.version.clone(),
            package_type: entry.package_type.to_string(),
            transport_type: entry.transport_type.to_string(),
            updated_at: entry.updated_at,
            generator: concat!("packwatch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Writes packs as plain directories under the output root.
#[derive(Default, Clone)]
pub struct FsPackGenerator;

impl FsPackGenerator {
    /// The directory a pack for `entry` lands in:
    /// `<output>/<namespace>/<name>-<version>-<packageType>-<transportType>`.
    pub fn pack_dir(output_dir: &Path, entry: &PackageEntry) -> PathBuf {
        output_dir.join(&entry.namespace).join(format!(
            "{}-{}-{}-{}",
            entry.name, entry.version, entry.package_type, entry.transport_type
        ))
    }
}

impl PackGenerator for FsPackGenerator {
    fn generate(&self, entry: &PackageEntry, opts: &GenerateOptions) -> CoreResult<()> {
        let pack_dir = Self::pack_dir(&opts.output_dir, entry);

        if pack_dir.exists() {
            if !opts.force_overwrite {
                return Err(CoreError::PackExists(pack_dir));
            }
            if !opts.dry_run {
                packwatch_utils::fs::safe_remove(&pack_dir)?;
            }
        }

        if opts.dry_run {
            debug!("Dry run, not writing pack to {}", pack_dir.display());
            return Ok(());
        }

        packwatch_utils::fs::ensure_dir_exists(&pack_dir)?;

        let manifest_path = pack_dir.join("pack.json");
        let file = File::create(&manifest_path)
            .with_context(|| format!("creating manifest {}", manifest_path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &PackManifest::for_entry(entry))?;

        debug!("Wrote pack to {}", pack_dir.display());
        Ok(())
    }
}
