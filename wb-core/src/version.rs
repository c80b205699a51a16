//! Server version parsing and the version-to-image-family cutover.

use std::cmp::Ordering;
use std::fmt;

/// Image lineage a server version runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFamily {
    /// Releases before 1.6.0
    Legacy,
    /// Releases from 1.6.0 on
    Current,
    /// Admin sidecar; only ever shipped for legacy deployments
    LegacyAdmin,
}

impl ImageFamily {
    /// Tag prefix of this family within the image repository.
    pub fn tag_prefix(&self) -> &'static str {
        match self {
            ImageFamily::Legacy => "wb-hmis-server",
            ImageFamily::Current => "wb-fastr-server",
            ImageFamily::LegacyAdmin => "wb-hmis-server-admin",
        }
    }

    /// Family of the application image for `version`.
    ///
    /// `major > 1`, or `major == 1 && minor >= 6`, selects [`ImageFamily::Current`].
    /// Anything older, or anything that does not parse, stays on the legacy family.
    pub fn for_server(version: &str) -> Self {
        match ServerVersion::parse(version) {
            Some(v) if v.major > 1 || (v.major == 1 && v.minor >= 6) => ImageFamily::Current,
            _ => ImageFamily::Legacy,
        }
    }
}

impl fmt::Display for ImageFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag_prefix())
    }
}

/// `major.minor[.patch]` version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServerVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ServerVersion {
    /// Parse `major.minor[.patch]`. Returns `None` for anything else.
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self { major, minor, patch })
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Compare two version strings numerically; unparsable strings sort first.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    match (ServerVersion::parse(a), ServerVersion::parse(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Highest version among `versions`, ignoring empty strings.
pub fn latest<'a>(versions: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    versions.into_iter().filter(|v| !v.trim().is_empty()).max_by(|a, b| compare_versions(a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_cutover() {
        assert_eq!(ImageFamily::for_server("1.5.9"), ImageFamily::Legacy);
        assert_eq!(ImageFamily::for_server("1.6.0"), ImageFamily::Current);
        assert_eq!(ImageFamily::for_server("1.6"), ImageFamily::Current);
        assert_eq!(ImageFamily::for_server("2.0.0"), ImageFamily::Current);
        assert_eq!(ImageFamily::for_server("0.9.0"), ImageFamily::Legacy);
    }

    #[test]
    fn test_unparsable_is_legacy() {
        assert_eq!(ImageFamily::for_server("latest"), ImageFamily::Legacy);
        assert_eq!(ImageFamily::for_server(""), ImageFamily::Legacy);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            ServerVersion::parse("1.6.7"),
            Some(ServerVersion { major: 1, minor: 6, patch: 7 })
        );
        assert_eq!(
            ServerVersion::parse("2.1"),
            Some(ServerVersion { major: 2, minor: 1, patch: 0 })
        );
        assert_eq!(ServerVersion::parse("1"), None);
        assert_eq!(ServerVersion::parse("1.2.3.4"), None);
        assert_eq!(ServerVersion::parse("1.x"), None);
    }

    #[test]
    fn test_latest_is_numeric_not_lexical() {
        assert_eq!(latest(["1.9.0", "1.10.0", "1.2.3"]), Some("1.10.0"));
        assert_eq!(latest(["", "1.0.0"]), Some("1.0.0"));
        assert_eq!(latest(Vec::<&str>::new()), None);
    }
}
