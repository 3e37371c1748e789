//! Installer filename parsing and release version ordering.
//!
//! Installer files follow a fixed naming scheme,
//! `medplum-agent-installer-<major>.<minor>.<patch>.exe`. Anything else in the
//! releases directory is ignored by the catalog.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};

static INSTALLER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"medplum-agent-installer-([0-9]+)\.([0-9]+)\.([0-9]+)\.exe")
        .expect("installer pattern is a valid regex")
});

/// Three-component semantic version of a release.
///
/// Ordering follows semantic version precedence: major, then minor, then patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReleaseVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl ReleaseVersion {
    /// Creates a version from its three components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Release tag for this version, e.g. `v1.2.3`.
    pub fn tag(&self) -> String {
        format!("v{self}")
    }

    /// Compares two versions for newest-first ordering.
    pub fn cmp_descending(&self, other: &Self) -> Ordering {
        other.cmp(self)
    }
}

impl fmt::Display for ReleaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for ReleaseVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Outcome of matching a filename against the installer naming scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilenameMatch {
    /// The filename names an installer for this version
    Installer(ReleaseVersion),
    /// The filename is not an installer and is excluded from the catalog
    NoMatch,
}

impl FilenameMatch {
    /// Returns the matched version, if any.
    pub fn version(self) -> Option<ReleaseVersion> {
        match self {
            Self::Installer(version) => Some(version),
            Self::NoMatch => None,
        }
    }
}

/// Matches a filename against the installer naming scheme.
///
/// The pattern is searched for anywhere in the name, so it need not span the
/// whole filename. Components too large for `u64` count as no match.
pub fn match_installer(filename: &str) -> FilenameMatch {
    let Some(captures) = INSTALLER_PATTERN.captures(filename) else {
        return FilenameMatch::NoMatch;
    };

    let component = |index: usize| captures.get(index)?.as_str().parse::<u64>().ok();
    match (component(1), component(2), component(3)) {
        (Some(major), Some(minor), Some(patch)) => {
            FilenameMatch::Installer(ReleaseVersion::new(major, minor, patch))
        }
        _ => FilenameMatch::NoMatch,
    }
}

/// Derives the release version encoded in an installer filename.
///
/// # Examples
/// ```
/// use relserve_core::version::{ReleaseVersion, derive_version};
///
/// assert_eq!(
///     derive_version("medplum-agent-installer-1.2.3.exe"),
///     Some(ReleaseVersion::new(1, 2, 3))
/// );
/// assert_eq!(derive_version("readme.txt"), None);
/// ```
pub fn derive_version(filename: &str) -> Option<ReleaseVersion> {
    match_installer(filename).version()
}
