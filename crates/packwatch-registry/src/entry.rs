//! Registry entry models.
//!
//! [`RemoteServer`] is the shape an entry has on the wire: one record per
//! published package version, carrying every transport it supports.
//! [`PackageEntry`] is the flattened unit the daemon reconciles: one record
//! per (package, transport) pair. Entries whose package or transport type
//! falls outside the known vocabularies are skipped with a warning rather
//! than failing the whole listing.

use chrono::{DateTime, Utc};
use packwatch_config::{PackageKind, TransportKind};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A single reconcilable unit: one package version over one transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub package_type: PackageKind,
    pub transport_type: TransportKind,
    /// Registry-reported last-modified instant, used to detect change
    /// since last processing.
    pub updated_at: DateTime<Utc>,
}

/// A registry entry as returned by the listing endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteServer {
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub package_type: String,
    #[serde(default)]
    pub transports: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl RemoteServer {
    /// Flattens this record into one [`PackageEntry`] per supported
    /// transport, dropping unknown package or transport types.
    pub fn into_entries(self) -> Vec<PackageEntry> {
        let package_type: PackageKind = match self.package_type.parse() {
            Ok(kind) => kind,
            Err(_) => {
                warn!(
                    "Skipping {}/{}@{}: unknown package type `{}`",
                    self.namespace, self.name, self.version, self.package_type
                );
                return Vec::new();
            }
        };

        self.transports
            .iter()
            .filter_map(|transport| {
                match transport.parse::<TransportKind>() {
                    Ok(transport_type) => {
                        Some(PackageEntry {
                            namespace: self.namespace.clone(),
                            name: self.name.clone(),
                            version: self.version.clone(),
                            package_type,
                            transport_type,
                            updated_at: self.updated_at,
                        })
                    }
                    Err(_) => {
                        warn!(
                            "Skipping {}/{}@{}: unknown transport `{transport}`",
                            self.namespace, self.name, self.version
                        );
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server(package_type: &str, transports: &[&str]) -> RemoteServer {
        RemoteServer {
            namespace: "acme".to_string(),
            name: "hello".to_string(),
            version: "1.0.0".to_string(),
            package_type: package_type.to_string(),
            transports: transports.iter().map(|s| s.to_string()).collect(),
            updated_at: "2026-01-02T03:04:05Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_flattens_one_entry_per_transport() {
        let entries = server("npm", &["stdio", "http"]).into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].transport_type, TransportKind::Stdio);
        assert_eq!(entries[1].transport_type, TransportKind::Http);
        assert!(entries.iter().all(|e| e.package_type == PackageKind::Npm));
    }

    #[test]
    fn test_unknown_package_type_drops_record() {
        assert!(server("cargo", &["stdio"]).into_entries().is_empty());
    }

    #[test]
    fn test_unknown_transport_is_skipped_individually() {
        let entries = server("pypi", &["stdio", "carrier-pigeon"]).into_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].transport_type, TransportKind::Stdio);
    }

    #[test]
    fn test_wire_deserialization() {
        let raw = r#"{
            "namespace": "acme",
            "name": "hello",
            "version": "2.1.0",
            "package_type": "oci",
            "transports": ["sse"],
            "updated_at": "2026-03-04T05:06:07Z"
        }"#;
        let server: RemoteServer = serde_json::from_str(raw).unwrap();
        let entries = server.into_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].package_type, PackageKind::Oci);
        assert_eq!(
            entries[0].updated_at,
            "2026-03-04T05:06:07Z".parse::<DateTime<Utc>>().unwrap()
        );
    }
}
