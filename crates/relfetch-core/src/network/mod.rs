//! Network layer: HTTP client, release listing, and artifact download.

mod client;
mod decompress;
mod download;
mod link;
mod progress;
mod releases;

pub use client::{HttpClient, JsonPage};
pub use decompress::{decompress, gunzip, unzip_first_entry, ByteStream};
pub use download::{open_artifact_stream, temp_path_for, ArtifactMetadata, ArtifactStream};
pub use link::{page_number, PageLinks};
pub use progress::{DownloadProgress, ProgressEmitter, ProgressStream};
pub use releases::ReleasesClient;
