use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ResolutionError;

/// Release channel of a published framework version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    Release,
    Prerelease,
    Nightly,
}

impl ReleaseType {
    pub const ALL: [ReleaseType; 3] = [Self::Release, Self::Prerelease, Self::Nightly];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Release => "release",
            Self::Prerelease => "prerelease",
            Self::Nightly => "nightly",
        }
    }

    /// Whether records of this channel are shown when the user opted into
    /// `allowed`. Stable releases are always shown.
    #[must_use]
    pub fn is_visible(self, allowed: &HashSet<ReleaseType>) -> bool {
        self == Self::Release || allowed.contains(&self)
    }
}

impl fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown release type: {input} (expected release, prerelease or nightly)")]
pub struct ReleaseTypeParseError {
    pub input: String,
}

impl FromStr for ReleaseType {
    type Err = ReleaseTypeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ReleaseTypeParseError {
                input: trimmed.to_string(),
            })
    }
}

/// One published release as listed by the remote version index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    pub name: String,
    pub release_type: ReleaseType,
    pub download_url: String,
}

impl VersionRecord {
    pub fn new(
        name: impl Into<String>,
        release_type: ReleaseType,
        download_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            release_type,
            download_url: download_url.into(),
        }
    }
}

/// A local archive and the framework version embedded in it, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub path: PathBuf,
    pub version: Option<String>,
}

/// Outcome of installed-version resolution as shown to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstalledVersion {
    Known(String),
    Unknown,
}

impl InstalledVersion {
    #[must_use]
    pub fn from_resolution(result: Result<String, ResolutionError>) -> Self {
        match result {
            Ok(version) => Self::Known(version),
            Err(ResolutionError::NotFound) => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_known(&self) -> Option<&str> {
        match self {
            Self::Known(version) => Some(version),
            Self::Unknown => None,
        }
    }

    /// Parse the raw version, if one was found.
    #[must_use]
    pub fn parsed(&self) -> Option<Result<FrameworkVersion, VersionParseError>> {
        self.as_known().map(str::parse)
    }
}

impl fmt::Display for InstalledVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(version) => f.write_str(version),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Structured framework version: `major.minor[.patch][.qualifier]`, where the
/// qualifier may also be attached with a dash (`7.1.0-SNAPSHOT`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameworkVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub qualifier: Option<String>,
}

impl FrameworkVersion {
    #[must_use]
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            qualifier: None,
        }
    }

    #[must_use]
    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    /// The `major.minor` line this version belongs to, e.g. `7.1`.
    #[must_use]
    pub fn minor_line(&self) -> String {
        format!("{}.{}", self.major, self.minor)
    }
}

impl Ord for FrameworkVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.qualifier, &other.qualifier) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for FrameworkVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FrameworkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(qualifier) = &self.qualifier {
            write!(f, ".{qualifier}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComponent {
    Major,
    Minor,
    Patch,
}

impl fmt::Display for VersionComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    #[error("Expected major.minor[.patch][.qualifier] format, got: {input}")]
    InvalidFormat { input: String },
    #[error("Invalid {component} version: {value}")]
    InvalidComponent {
        component: VersionComponent,
        value: String,
    },
}

fn split_dash(part: &str) -> (&str, Option<&str>) {
    match part.split_once('-') {
        Some((number, qualifier)) => (number, Some(qualifier)),
        None => (part, None),
    }
}

fn parse_component(value: &str, component: VersionComponent) -> Result<u32, VersionParseError> {
    value
        .parse()
        .map_err(|_| VersionParseError::InvalidComponent {
            component,
            value: value.to_string(),
        })
}

impl FromStr for FrameworkVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        let invalid = || VersionParseError::InvalidFormat {
            input: input.to_string(),
        };

        let mut parts = input.splitn(4, '.');
        let major_str = parts.next().ok_or_else(invalid)?;
        let minor_part = parts.next().ok_or_else(invalid)?;

        let (minor_str, patch_str, qualifier) = match (parts.next(), parts.next()) {
            (None, _) => {
                let (minor, qualifier) = split_dash(minor_part);
                (minor, None, qualifier)
            }
            (Some(patch_part), None) => {
                let (patch, qualifier) = split_dash(patch_part);
                (minor_part, Some(patch), qualifier)
            }
            (Some(patch_part), Some(rest)) => (minor_part, Some(patch_part), Some(rest)),
        };

        if qualifier.is_some_and(str::is_empty) {
            return Err(invalid());
        }

        let major = parse_component(major_str, VersionComponent::Major)?;
        let minor = parse_component(minor_str, VersionComponent::Minor)?;
        let patch = match patch_str {
            Some(patch) => parse_component(patch, VersionComponent::Patch)?,
            None => 0,
        };

        Ok(Self {
            major,
            minor,
            patch,
            qualifier: qualifier.map(str::to_string),
        })
    }
}
