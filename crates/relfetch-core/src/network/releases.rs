//! GitHub releases listing and resolution.
//!
//! Provides:
//! - Paginated release listing that follows `Link: rel="next"` headers
//! - Single release lookup by tag or `latest`
//! - Translation of 404 responses into [`InstallationError::ReleaseNotFound`]
//!
//! Nothing is cached; every call hits the network.

use crate::config::InstallerConfig;
use crate::error::InstallationError;
use crate::models::{GitHubRelease, ReleaseRecord, VersionSelector};
use crate::network::client::HttpClient;
use crate::network::link::PageLinks;
use crate::{RelfetchError, Result};
use futures::{stream, Stream, TryStreamExt};
use serde::Deserialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};
use url::Url;

/// Listing endpoints answer with an array, single-release endpoints with an
/// object.
#[derive(Deserialize)]
#[serde(untagged)]
enum ReleasePayload {
    Many(Vec<GitHubRelease>),
    One(Box<GitHubRelease>),
}

impl ReleasePayload {
    fn into_records(self) -> Vec<ReleaseRecord> {
        match self {
            ReleasePayload::Many(releases) => releases.into_iter().map(Into::into).collect(),
            ReleasePayload::One(release) => vec![(*release).into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PageState {
    Fetching(Url),
    HasNext(Url),
    Done,
}

/// Bookkeeping for one walk over a paginated listing.
///
/// The walk stops after `limit` pages, where `limit` shrinks to the `last`
/// page the server advertises, or when a `next` link repeats a page that was
/// already requested.
#[derive(Debug)]
struct Pagination {
    state: PageState,
    fetched: u32,
    limit: u32,
    visited: HashSet<Url>,
}

impl Pagination {
    fn new(start: Url, limit: u32) -> Self {
        let mut visited = HashSet::new();
        visited.insert(start.clone());
        Self {
            state: PageState::HasNext(start),
            fetched: 0,
            limit,
            visited,
        }
    }

    /// Move to `Fetching` and return the URL to request, or `None` when done.
    fn begin(&mut self) -> Option<Url> {
        match std::mem::replace(&mut self.state, PageState::Done) {
            PageState::HasNext(url) => {
                self.state = PageState::Fetching(url.clone());
                Some(url)
            }
            PageState::Fetching(_) | PageState::Done => None,
        }
    }

    /// Record a fetched page and decide whether another one follows.
    fn complete(&mut self, links: &PageLinks) {
        self.fetched += 1;
        if let Some(last) = links.last_page() {
            self.limit = self.limit.min(last.max(1));
        }

        self.state = match links.next.clone() {
            None => PageState::Done,
            Some(_) if self.fetched >= self.limit => {
                warn!(
                    "Stopping pagination after {} pages (limit {})",
                    self.fetched, self.limit
                );
                PageState::Done
            }
            Some(next) if !self.visited.insert(next.clone()) => {
                warn!("Stopping pagination: `next` link {} was already visited", next);
                PageState::Done
            }
            Some(next) => PageState::HasNext(next),
        };
    }

    fn fail(&mut self) {
        self.state = PageState::Done;
    }
}

/// Client for the releases endpoints of one repository.
pub struct ReleasesClient {
    http: HttpClient,
    config: InstallerConfig,
}

impl ReleasesClient {
    /// Create a new releases client.
    pub fn new(http: HttpClient, config: InstallerConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// URL where a listing for `filter` starts.
    ///
    /// `None` lists every release; a selector narrows it to `latest` or one
    /// tag.
    pub fn listing_url(&self, filter: Option<&VersionSelector>) -> Result<Url> {
        let base = self.config.releases_url();
        let url = match filter.map(VersionSelector::resolved) {
            None => format!("{}?per_page={}", base, self.config.per_page),
            Some(VersionSelector::Tag(tag)) => {
                format!("{}/tags/{}", base, urlencoding::encode(&tag))
            }
            Some(_) => format!("{}/latest", base),
        };

        Url::parse(&url).map_err(|e| RelfetchError::Config {
            message: format!("Invalid releases URL {}: {}", url, e),
        })
    }

    /// Lazily walk the listing, yielding one page of releases at a time in
    /// server order. An error ends the stream.
    pub fn release_pages(
        &self,
        filter: Option<&VersionSelector>,
    ) -> impl Stream<Item = Result<Vec<ReleaseRecord>>> + '_ {
        let start = self.listing_url(filter);
        let limit = self.config.max_pages;
        let http = &self.http;

        let pagination = start.map(|url| Pagination::new(url, limit));
        stream::unfold(Some(pagination), move |state| async move {
            let mut pagination = match state? {
                Ok(pagination) => pagination,
                Err(e) => return Some((Err(e), None)),
            };
            let url = pagination.begin()?;

            debug!("fetch releases: url={}", url);
            match http.get_json_page::<ReleasePayload>(&url).await {
                Ok(page) => {
                    pagination.complete(&page.links);
                    Some((Ok(page.body.into_records()), Some(Ok(pagination))))
                }
                Err(e) => {
                    pagination.fail();
                    Some((Err(e), Some(Ok(pagination))))
                }
            }
        })
    }

    /// Fetch every page of the listing.
    ///
    /// Releases are returned in server order. A tag that shows up again on a
    /// later page (the listing shifted while we walked it) is dropped.
    pub async fn list_releases(
        &self,
        filter: Option<&VersionSelector>,
    ) -> Result<Vec<ReleaseRecord>> {
        let mut seen = HashSet::new();
        let releases: Vec<ReleaseRecord> = self
            .release_pages(filter)
            .try_fold(Vec::new(), |mut acc, page| {
                for release in page {
                    if seen.insert(release.tag.clone()) {
                        acc.push(release);
                    } else {
                        warn!("Skipping duplicate release {}", release.tag);
                    }
                }
                futures::future::ready(Ok(acc))
            })
            .await?;

        info!(
            "Fetched {} releases from {}",
            releases.len(),
            self.config.repo
        );
        Ok(releases)
    }

    /// Resolve a single release. `Unspecified` means `latest`.
    pub async fn fetch_release(&self, version: &VersionSelector) -> Result<ReleaseRecord> {
        let version = version.resolved();
        debug!("fetch single release: {}", version);

        match self.list_releases(Some(&version)).await {
            Ok(releases) => releases.into_iter().next().ok_or_else(|| {
                InstallationError::ReleaseNotFound {
                    version: version.to_string(),
                    source: None,
                }
                .into()
            }),
            Err(e) if e.is_not_found() => Err(InstallationError::ReleaseNotFound {
                version: version.to_string(),
                source: Some(Box::new(e)),
            }
            .into()),
            Err(e) => Err(e),
        }
    }
}
