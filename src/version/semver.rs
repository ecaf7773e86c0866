use semver::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    Latest,
    Outdated,
    Newer,
    Invalid,
}

/// Parse a version string into a semver::Version, normalizing partial versions.
///
/// Handles partial versions like "1" or "1.2" by padding with zeros, strips a
/// leading 'v', and drops a fourth numeric component as used by assembly
/// versions ("1.2.3.4" -> 1.2.3).
///
/// Examples:
/// - "1" -> Version(1, 0, 0)
/// - "v1.2" -> Version(1, 2, 0)
/// - "1.2.3.0" -> Version(1, 2, 3)
pub fn parse_version(version: &str) -> Option<Version> {
    let version = version.trim();
    let version = version.strip_prefix('v').unwrap_or(version);
    let parts: Vec<&str> = version.split('.').collect();
    let normalized = match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        4 if parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())) =>
        {
            parts[..3].join(".")
        }
        _ => version.to_string(),
    };
    Version::parse(&normalized).ok()
}

/// Compare an installed version against the newest published one
pub fn compare_versions(current_version: &str, latest_version: &str) -> CompareResult {
    let (Some(current), Some(latest)) = (parse_version(current_version), parse_version(latest_version))
    else {
        return CompareResult::Invalid;
    };

    match current.cmp(&latest) {
        std::cmp::Ordering::Equal => CompareResult::Latest,
        std::cmp::Ordering::Less => CompareResult::Outdated,
        std::cmp::Ordering::Greater => CompareResult::Newer,
    }
}
