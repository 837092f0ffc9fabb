//! GitHub release metadata types.
//!
//! `GitHubRelease`/`GitHubAsset` mirror the API payload. They are converted
//! into [`ReleaseRecord`]/[`AssetRecord`], which is what the rest of the crate
//! works with.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// GitHub release asset as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAsset {
    pub name: String,
    pub size: u64,
    pub browser_download_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// GitHub release as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub prerelease: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

/// A downloadable file attached to a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub filename: String,
    pub size: u64,
    pub download_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

/// A tagged release and its assets keyed by filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRecord {
    pub tag: String,
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
    pub is_prerelease: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub assets: BTreeMap<String, AssetRecord>,
}

impl ReleaseRecord {
    /// Look up an asset by filename.
    pub fn asset(&self, filename: &str) -> Option<&AssetRecord> {
        self.assets.get(filename)
    }

    /// Asset filenames in sorted order.
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }
}

// GitHub reports an asset's last upload as `updated_at`; that is the moment
// it became downloadable, so it stands in for the publish time.
impl From<GitHubAsset> for AssetRecord {
    fn from(asset: GitHubAsset) -> Self {
        Self {
            filename: asset.name,
            size: asset.size,
            download_url: asset.browser_download_url,
            created_at: asset.created_at,
            published_at: asset.updated_at,
        }
    }
}

impl From<GitHubRelease> for ReleaseRecord {
    fn from(release: GitHubRelease) -> Self {
        let assets = release
            .assets
            .into_iter()
            .map(|asset| (asset.name.clone(), AssetRecord::from(asset)))
            .collect();

        Self {
            tag: release.tag_name,
            name: release.name,
            url: release.html_url,
            is_prerelease: release.prerelease,
            created_at: release.created_at,
            published_at: release.published_at,
            assets,
        }
    }
}
