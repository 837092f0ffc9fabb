//! relfetch core - resolve GitHub releases and stream platform binaries.
//!
//! This crate lists the releases of a repository, picks the asset that fits
//! the running platform, and hands back the executable's bytes as a
//! decompressed stream. Writing the bytes somewhere is left to the caller.
//!
//! # Example
//!
//! ```rust,ignore
//! use relfetch_core::{InstallerConfig, ReleaseFetcher, VersionSelector};
//!
//! #[tokio::main]
//! async fn main() -> relfetch_core::Result<()> {
//!     let fetcher = ReleaseFetcher::new(InstallerConfig::default().with_env_overrides())?;
//!
//!     let releases = fetcher.list_releases(None).await?;
//!     println!("Found {} releases", releases.len());
//!
//!     let stream = fetcher
//!         .download(&VersionSelector::Latest, "linux", None)
//!         .await?;
//!     println!("Downloading {}", stream.metadata().filename);
//!     stream.save_to("./deno".as_ref()).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod models;
pub mod network;

// Re-export commonly used types
pub use artifact::{
    current_platform_key, select_artifact, ArchiveType, ArtifactDescriptor, ArtifactTable,
};
pub use config::{AppConfig, InstallerConfig, NetworkConfig};
pub use error::{InstallationError, RelfetchError, Result};
pub use models::{AssetRecord, ReleaseRecord, VersionSelector};
pub use network::{ArtifactMetadata, ArtifactStream, DownloadProgress, HttpClient};

use network::ReleasesClient;
use tokio::sync::mpsc;
use tracing::info;

/// Main entry point: release lookup and artifact download for one
/// configured repository.
///
/// Every call goes to the network; nothing is cached between calls.
pub struct ReleaseFetcher {
    releases: ReleasesClient,
}

impl ReleaseFetcher {
    /// Create a fetcher after validating `config`.
    pub fn new(config: InstallerConfig) -> Result<Self> {
        config.validate()?;
        let http = HttpClient::new(&config)?;
        Ok(Self::with_client(http, config))
    }

    /// Create a fetcher around an existing HTTP client.
    pub fn with_client(http: HttpClient, config: InstallerConfig) -> Self {
        Self {
            releases: ReleasesClient::new(http, config),
        }
    }

    pub fn config(&self) -> &InstallerConfig {
        self.releases.config()
    }

    /// List releases in server order.
    ///
    /// `None` lists every release; a selector narrows the listing to
    /// `latest` or a single tag.
    pub async fn list_releases(
        &self,
        filter: Option<&VersionSelector>,
    ) -> Result<Vec<ReleaseRecord>> {
        self.releases.list_releases(filter).await
    }

    /// Resolve one release. Fails with `ReleaseNotFound` for unknown tags.
    pub async fn fetch_release(&self, version: &VersionSelector) -> Result<ReleaseRecord> {
        self.releases.fetch_release(version).await
    }

    /// Pick the artifact for `platform` using the configured table.
    pub fn select_artifact(
        &self,
        release: &ReleaseRecord,
        platform: &str,
    ) -> Result<ArtifactDescriptor> {
        select_artifact(release, platform, &self.config().artifacts)
    }

    /// Resolve `version`, pick the artifact for `platform` and start
    /// downloading it.
    ///
    /// Domain failures (`ReleaseNotFound`, `UnsupportedPlatform`,
    /// `UnsupportedFileType`) are raised before any asset byte is
    /// requested. Progress events on raw bytes go to `progress_tx` when
    /// given.
    pub async fn download(
        &self,
        version: &VersionSelector,
        platform: &str,
        progress_tx: Option<mpsc::UnboundedSender<DownloadProgress>>,
    ) -> Result<ArtifactStream> {
        let release = self.fetch_release(version).await?;
        let descriptor = self.select_artifact(&release, platform)?;
        info!(
            "Downloading {} from release {} for {}",
            descriptor.filename, descriptor.release_tag, platform
        );

        network::open_artifact_stream(
            self.releases.http(),
            &descriptor,
            progress_tx,
            self.config().zip_buffer_limit,
        )
        .await
    }
}
