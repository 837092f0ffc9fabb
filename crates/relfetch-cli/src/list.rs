//! `--list-releases`: print release tags inside a semver range.

use crate::version;
use anyhow::{Context, Result};
use relfetch_core::{ReleaseFetcher, ReleaseRecord};
use semver::VersionReq;
use std::process::ExitCode;
use tracing::debug;

const NO_RELEASES: u8 = 3;
const NO_MATCHES: u8 = 4;

/// One output line: the tag padded to ten columns, then the publish date.
pub fn format_release(release: &ReleaseRecord) -> String {
    let date = release.published_at.unwrap_or(release.created_at);
    format!("{:<10}{}", release.tag, date.format("%Y-%m-%d"))
}

/// Releases whose coerced tag falls inside `range`, in listing order.
pub fn matching<'a>(releases: &'a [ReleaseRecord], range: &VersionReq) -> Vec<&'a ReleaseRecord> {
    releases
        .iter()
        .filter(|r| version::coerce(&r.tag).is_some_and(|v| range.matches(&v)))
        .collect()
}

pub async fn run(fetcher: &ReleaseFetcher, range: Option<&str>) -> Result<ExitCode> {
    let range = version::range_for(range);
    debug!("list releases inside range=`{}`", range);
    eprintln!(
        "Querying {} for available releases...",
        fetcher.config().repo
    );

    let releases = fetcher
        .list_releases(None)
        .await
        .context("Failed to list releases")?;
    if releases.is_empty() {
        return Ok(crate::fail("No releases found.", NO_RELEASES));
    }

    let matches = matching(&releases, &range);
    if matches.is_empty() {
        return Ok(crate::fail(
            "There are no releases satisfying given range.",
            NO_MATCHES,
        ));
    }

    for release in matches {
        println!("{}", format_release(release));
    }
    Ok(ExitCode::SUCCESS)
}
