//! Platform artifact selection.
//!
//! An [`ArtifactTable`] maps a platform key to the asset filenames that are
//! acceptable on that platform, most preferred first. [`select_artifact`]
//! picks the first of those present in a release and works out how to
//! decompress it.

use crate::error::InstallationError;
use crate::models::ReleaseRecord;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Compression format of a release artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// Single gzip stream wrapping the executable.
    Gz,
    /// Zip archive; the first file entry is the executable.
    Zip,
}

impl ArchiveType {
    /// Derive the archive type from a filename extension.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename).extension()?.to_str()?;
        match extension.to_ascii_lowercase().as_str() {
            "gz" => Some(ArchiveType::Gz),
            "zip" => Some(ArchiveType::Zip),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveType::Gz => "gz",
            ArchiveType::Zip => "zip",
        }
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One filename or an ordered list of them, as written in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum Candidates {
    One(String),
    Many(Vec<String>),
}

impl From<Candidates> for Vec<String> {
    fn from(value: Candidates) -> Self {
        match value {
            Candidates::One(name) => vec![name],
            Candidates::Many(names) => names,
        }
    }
}

/// Platform key to acceptable artifact filenames, in priority order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Candidates>")]
pub struct ArtifactTable(BTreeMap<String, Vec<String>>);

impl From<BTreeMap<String, Candidates>> for ArtifactTable {
    fn from(map: BTreeMap<String, Candidates>) -> Self {
        Self(map.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

impl ArtifactTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a platform's candidate filenames.
    pub fn with_platform<I, S>(mut self, platform: impl Into<String>, filenames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(platform, filenames);
        self
    }

    pub fn insert<I, S>(&mut self, platform: impl Into<String>, filenames: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .insert(platform.into(), filenames.into_iter().map(Into::into).collect());
    }

    /// Candidate filenames for a platform, most preferred first.
    pub fn candidates(&self, platform: &str) -> Option<&[String]> {
        self.0.get(platform).map(Vec::as_slice)
    }

    pub fn platforms(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Everything needed to download one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactDescriptor {
    pub filename: String,
    pub size: u64,
    pub url: String,
    pub archive_type: ArchiveType,
    pub release_tag: String,
}

/// Platform key of the running system.
pub fn current_platform_key() -> &'static str {
    std::env::consts::OS
}

/// Pick the artifact to download for `platform` from `release`.
///
/// The first candidate filename present in the release wins. Fails with
/// `UnsupportedPlatform` when no candidate is present and with
/// `UnsupportedFileType` when the winner is neither gzip nor zip.
pub fn select_artifact(
    release: &ReleaseRecord,
    platform: &str,
    table: &ArtifactTable,
) -> Result<ArtifactDescriptor> {
    let unsupported = || InstallationError::UnsupportedPlatform {
        platform: platform.to_string(),
    };

    let asset = table
        .candidates(platform)
        .unwrap_or_default()
        .iter()
        .find_map(|name| release.asset(name))
        .ok_or_else(unsupported)?;

    let archive_type = ArchiveType::from_filename(&asset.filename).ok_or_else(|| {
        InstallationError::UnsupportedFileType {
            filename: asset.filename.clone(),
        }
    })?;

    debug!(
        "Selected {} ({}, {} bytes) for platform {} from {}",
        asset.filename, archive_type, asset.size, platform, release.tag
    );

    Ok(ArtifactDescriptor {
        filename: asset.filename.clone(),
        size: asset.size,
        url: asset.download_url.clone(),
        archive_type,
        release_tag: release.tag.clone(),
    })
}
