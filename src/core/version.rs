//! Host core version, used for plugin minimum-version constraints
use crate::error::{HostError, HostResult};
use semver::Version;

/// Version of this build of the host.
pub fn current() -> Version {
    Version::parse(env!("CARGO_PKG_VERSION")).unwrap_or_else(|_| Version::new(0, 0, 0))
}

/// Parse a full `major.minor.patch` version, with an optional leading `v`.
pub fn parse(text: &str) -> HostResult<Version> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).map_err(|source| HostError::VersionError {
        version: text.to_string(),
        source,
    })
}

/// Check whether `core` satisfies a `min_core_version` constraint.
///
/// An empty constraint always holds. A leading `>=` is accepted. Pre-release
/// hosts sort before the release they precede, so `1.0.0-rc1` does not
/// satisfy `1.0.0`.
pub fn satisfies(core: &Version, constraint: &str) -> HostResult<bool> {
    let trimmed = constraint.trim().trim_start_matches(">=").trim();
    if trimmed.is_empty() {
        return Ok(true);
    }
    let required = parse(trimmed)?;
    Ok(*core >= required)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_matches_package() {
        assert_eq!(current().to_string(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_parse_accepts_v_prefix() {
        assert_eq!(parse("v2.4.1").unwrap(), Version::new(2, 4, 1));
        assert_eq!(parse("2.4.1-beta").unwrap().pre.as_str(), "beta");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse("one.two"), Err(HostError::VersionError { .. })));
        assert!(parse("1.2").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_satisfies_constraint() {
        let host = Version::new(1, 5, 0);
        assert!(satisfies(&host, "").unwrap());
        assert!(satisfies(&host, "1.0.0").unwrap());
        assert!(satisfies(&host, ">= 1.5.0").unwrap());
        assert!(satisfies(&host, ">=1.5.0").unwrap());
        assert!(!satisfies(&host, "1.5.1").unwrap());
        assert!(!satisfies(&host, "2.0.0").unwrap());
        assert!(satisfies(&host, "not-a-version").is_err());
    }

    #[test]
    fn test_prerelease_host_precedes_release() {
        let host = parse("1.0.0-rc1").unwrap();
        assert!(!satisfies(&host, "1.0.0").unwrap());
        assert!(satisfies(&host, "1.0.0-alpha").unwrap());
        assert!(satisfies(&host, "0.9.0").unwrap());
    }
}
