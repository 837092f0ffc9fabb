//! Artifact download as a decompressed byte stream.
//!
//! Provides:
//! - [`ArtifactStream`], the executable's bytes plus metadata about the asset
//! - Progress reporting on the raw (compressed) bytes
//! - Saving a stream to disk through a `.download` temp file
//!
//! Dropping an [`ArtifactStream`] drops the HTTP body and cancels the
//! transfer.

use crate::artifact::ArtifactDescriptor;
use crate::config::AppConfig;
use crate::network::client::HttpClient;
use crate::network::decompress::{decompress, ByteStream};
use crate::network::progress::{DownloadProgress, ProgressEmitter, ProgressStream};
use crate::{RelfetchError, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Describes the asset behind an [`ArtifactStream`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    /// Asset filename as published in the release.
    pub filename: String,
    /// Compressed size advertised by the release.
    pub size: u64,
    pub url: String,
    /// Tag of the release the asset belongs to.
    pub version: String,
}

impl From<&ArtifactDescriptor> for ArtifactMetadata {
    fn from(descriptor: &ArtifactDescriptor) -> Self {
        Self {
            filename: descriptor.filename.clone(),
            size: descriptor.size,
            url: descriptor.url.clone(),
            version: descriptor.release_tag.clone(),
        }
    }
}

/// Decompressed executable bytes of one release artifact.
pub struct ArtifactStream {
    metadata: ArtifactMetadata,
    inner: ByteStream,
}

impl ArtifactStream {
    /// Build the pipeline `body -> progress -> decompressor` for an already
    /// opened body.
    pub fn from_body(
        descriptor: &ArtifactDescriptor,
        body: ByteStream,
        progress_tx: Option<mpsc::UnboundedSender<DownloadProgress>>,
        zip_buffer_limit: u64,
    ) -> Self {
        let emitter = ProgressEmitter::new(descriptor.size, progress_tx);
        let tapped = ProgressStream::new(body, emitter).boxed();

        Self {
            metadata: descriptor.into(),
            inner: decompress(
                tapped,
                descriptor.archive_type,
                descriptor.size,
                zip_buffer_limit,
            ),
        }
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.metadata
    }

    /// Write the stream to `destination`.
    ///
    /// Bytes go to `<destination>.download` first, which is renamed over
    /// `destination` only after the stream finished cleanly. On Unix the
    /// file is made executable (`0o744`). The temp file is removed on
    /// failure.
    ///
    /// # Returns
    ///
    /// Number of decompressed bytes written
    pub async fn save_to(self, destination: &Path) -> Result<u64> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| RelfetchError::io_with_path(e, parent))?;
            }
        }

        let temp_path = temp_path_for(destination);
        match self.write_file(&temp_path).await {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::rename(&temp_path, destination).await {
                    let _ = tokio::fs::remove_file(&temp_path).await;
                    return Err(RelfetchError::io_with_path(e, destination));
                }
                info!("Installed {} bytes to {}", bytes, destination.display());
                Ok(bytes)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                Err(e)
            }
        }
    }

    async fn write_file(mut self, path: &Path) -> Result<u64> {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| RelfetchError::io_with_path(e, path))?;

        let mut written = 0u64;
        while let Some(chunk) = self.inner.try_next().await? {
            file.write_all(&chunk)
                .await
                .map_err(|e| RelfetchError::io_with_path(e, path))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| RelfetchError::io_with_path(e, path))?;
        drop(file);

        set_executable(path).await?;
        debug!("Wrote {} bytes to {}", written, path.display());
        Ok(written)
    }
}

impl Stream for ArtifactStream {
    type Item = Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ArtifactStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStream")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Start downloading `descriptor` and return its decompressed stream.
///
/// Resolves once the server has answered; the body is read lazily as the
/// stream is polled.
pub async fn open_artifact_stream(
    http: &HttpClient,
    descriptor: &ArtifactDescriptor,
    progress_tx: Option<mpsc::UnboundedSender<DownloadProgress>>,
    zip_buffer_limit: u64,
) -> Result<ArtifactStream> {
    debug!(
        "downloading binary from: {} [type={}, size={}]",
        descriptor.url, descriptor.archive_type, descriptor.size
    );

    let response = http.get_download(&descriptor.url).await?;
    let url = descriptor.url.clone();
    let body = response
        .bytes_stream()
        .map_err(move |e| RelfetchError::Network {
            message: format!("Error reading download stream from {}: {}", url, e),
            status_code: None,
            source: Some(e),
        })
        .boxed();

    Ok(ArtifactStream::from_body(
        descriptor,
        body,
        progress_tx,
        zip_buffer_limit,
    ))
}

/// `<path>.download`, the name used while a file is being written.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(AppConfig::DOWNLOAD_SUFFIX);
    PathBuf::from(name)
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o744))
        .await
        .map_err(|e| RelfetchError::io_with_path(e, path))
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
