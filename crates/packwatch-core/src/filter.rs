//! Eligibility filtering for registry entries.

use packwatch_config::{PackageKind, TransportKind};
use packwatch_registry::PackageEntry;

/// Decides whether an entry is eligible for processing.
///
/// An entry passes when its package type is in `allowed_package_types` and
/// its transport type is in `allowed_transport_types`; an empty allow-list
/// places no restriction on that axis. Malformed allow-list values are
/// rejected at configuration time, so this function has no error path.
pub fn is_eligible(
    entry: &PackageEntry,
    allowed_package_types: &[PackageKind],
    allowed_transport_types: &[TransportKind],
) -> bool {
    let package_ok = allowed_package_types.is_empty()
        || allowed_package_types.contains(&entry.package_type);
    let transport_ok = allowed_transport_types.is_empty()
        || allowed_transport_types.contains(&entry.transport_type);
    package_ok && transport_ok
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(package_type: PackageKind, transport_type: TransportKind) -> PackageEntry {
        PackageEntry {
            namespace: "acme".to_string(),
            name: "hello".to_string(),
            version: "1.0.0".to_string(),
            package_type,
            transport_type,
            updated_at: "2026-01-02T03:04:05Z".parse().unwrap(),
        }
    }

    #[test]
    fn test_empty_allow_lists_allow_everything() {
        assert!(is_eligible(
            &entry(PackageKind::Pypi, TransportKind::Sse),
            &[],
            &[]
        ));
    }

    #[test]
    fn test_both_axes_must_match() {
        let allowed_packages = [PackageKind::Npm];
        let allowed_transports = [TransportKind::Stdio];

        assert!(is_eligible(
            &entry(PackageKind::Npm, TransportKind::Stdio),
            &allowed_packages,
            &allowed_transports
        ));
        assert!(!is_eligible(
            &entry(PackageKind::Pypi, TransportKind::Stdio),
            &allowed_packages,
            &allowed_transports
        ));
        assert!(!is_eligible(
            &entry(PackageKind::Npm, TransportKind::Http),
            &allowed_packages,
            &allowed_transports
        ));
    }

    #[test]
    fn test_single_empty_axis_restricts_only_the_other() {
        let allowed_transports = [TransportKind::Stdio];
        assert!(is_eligible(
            &entry(PackageKind::Nuget, TransportKind::Stdio),
            &[],
            &allowed_transports
        ));
        assert!(!is_eligible(
            &entry(PackageKind::Nuget, TransportKind::Http),
            &[],
            &allowed_transports
        ));
    }
}
