//! Data models for releases and version selection.

mod release;
mod version;

pub use release::{AssetRecord, GitHubAsset, GitHubRelease, ReleaseRecord};
pub use version::VersionSelector;
