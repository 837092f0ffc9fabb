//! Install a release binary into a local directory.

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use relfetch_core::{DownloadProgress, ReleaseFetcher, VersionSelector};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// `~/.<binary_name>/bin`, the default install location.
pub fn default_install_dir(binary_name: &str) -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine the home directory")?;
    Ok(home.join(format!(".{}", binary_name)).join("bin"))
}

/// Final path of the installed executable for `platform`.
pub fn binary_path(dir: &Path, binary_name: &str, platform: &str) -> PathBuf {
    if platform == "windows" {
        dir.join(format!("{}.exe", binary_name))
    } else {
        dir.join(binary_name)
    }
}

fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
        )?
        .progress_chars("#>-"),
    );
    Ok(bar)
}

async fn drive_bar(bar: ProgressBar, mut rx: mpsc::UnboundedReceiver<DownloadProgress>) {
    while let Some(progress) = rx.recv().await {
        if progress.bytes_total > 0 {
            bar.set_length(progress.bytes_total);
        }
        bar.set_position(progress.bytes_downloaded);
    }
    bar.finish_and_clear();
}

/// Wait for the progress task. A failed task only costs the display.
async fn join_bar(task: JoinHandle<()>) {
    if let Err(e) = task.await {
        warn!("Progress display failed: {}", e);
    }
}

/// Download `version` for `platform` and install it into `dir`.
///
/// Domain errors are returned unchanged inside the `anyhow::Error` so the
/// caller can pick them out with `downcast_ref`.
pub async fn run(
    fetcher: &ReleaseFetcher,
    version: &VersionSelector,
    platform: &str,
    dir: &Path,
) -> Result<PathBuf> {
    let config = fetcher.config();
    eprintln!("Querying {} for version: {}...", config.repo, version);

    let (tx, rx) = mpsc::unbounded_channel();
    let stream = fetcher.download(version, platform, Some(tx)).await?;

    let metadata = stream.metadata().clone();
    let display_version = metadata.version.trim_start_matches('v');
    eprintln!(
        "Downloading {}@{} from {}",
        config.binary_name, display_version, metadata.url
    );

    let bar = progress_bar()?;
    let bar_task = tokio::spawn(drive_bar(bar, rx));

    let destination = binary_path(dir, &config.binary_name, platform);
    debug!("install destination: {}", destination.display());
    let result = stream.save_to(&destination).await;
    // The sender lives inside the stream, which is gone now.
    join_bar(bar_task).await;
    let written = result?;

    info!("Wrote {} bytes", written);
    println!(
        "{}@{} is successfully installed!",
        config.binary_name, display_version
    );
    Ok(destination)
}
