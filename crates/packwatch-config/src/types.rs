//! Closed vocabularies for package and transport types.
//!
//! Allow-lists and registry entries are validated against these enums when
//! configuration is loaded or a listing page is parsed; downstream code
//! (the filter, the state key) never sees a malformed value.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The packaging ecosystem an entry is distributed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageKind {
    Npm,
    Pypi,
    Oci,
    Nuget,
}

impl PackageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageKind::Npm => "npm",
            PackageKind::Pypi => "pypi",
            PackageKind::Oci => "oci",
            PackageKind::Nuget => "nuget",
        }
    }
}

impl fmt::Display for PackageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "npm" => Ok(PackageKind::Npm),
            "pypi" => Ok(PackageKind::Pypi),
            "oci" => Ok(PackageKind::Oci),
            "nuget" => Ok(PackageKind::Nuget),
            other => Err(ConfigError::InvalidPackageType(other.to_string())),
        }
    }
}

/// The transport an entry speaks once deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Stdio,
    Http,
    Sse,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Stdio => "stdio",
            TransportKind::Http => "http",
            TransportKind::Sse => "sse",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdio" => Ok(TransportKind::Stdio),
            "http" => Ok(TransportKind::Http),
            "sse" => Ok(TransportKind::Sse),
            other => Err(ConfigError::InvalidTransportType(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_kind_round_trip() {
        for kind in [
            PackageKind::Npm,
            PackageKind::Pypi,
            PackageKind::Oci,
            PackageKind::Nuget,
        ] {
            assert_eq!(kind.to_string().parse::<PackageKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_transport_kind_round_trip() {
        for kind in [TransportKind::Stdio, TransportKind::Http, TransportKind::Sse] {
            assert_eq!(kind.to_string().parse::<TransportKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_unknown_values_rejected() {
        assert!(matches!(
            "cargo".parse::<PackageKind>(),
            Err(ConfigError::InvalidPackageType(_))
        ));
        assert!(matches!(
            "websocket".parse::<TransportKind>(),
            Err(ConfigError::InvalidTransportType(_))
        ));
    }

    #[test]
    fn test_serde_uses_lowercase() {
        assert_eq!(
            serde_json::to_string(&PackageKind::Npm).unwrap(),
            "\"npm\""
        );
        assert_eq!(
            serde_json::from_str::<TransportKind>("\"stdio\"").unwrap(),
            TransportKind::Stdio
        );
    }
}
