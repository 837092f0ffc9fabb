//! HTTP client for the releases API and asset downloads.
//!
//! Provides a wrapper around reqwest with:
//! - User-agent management
//! - Optional token authentication for API requests only
//! - Status checking that turns failure codes into [`RelfetchError::Network`]
//!
//! No request timeout is applied unless the caller asks for one.

use crate::config::{InstallerConfig, NetworkConfig};
use crate::network::link::PageLinks;
use crate::{RelfetchError, Result};
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// One page of a JSON listing plus its navigation links.
#[derive(Debug)]
pub struct JsonPage<T> {
    pub body: T,
    pub links: PageLinks,
}

/// HTTP client shared by the release listing and artifact download paths.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    token: Option<String>,
}

impl HttpClient {
    /// Create a client for the given configuration.
    pub fn new(config: &InstallerConfig) -> Result<Self> {
        Self::build(Client::builder(), config)
    }

    /// Create a client that gives up connecting after `timeout`.
    ///
    /// Only connection setup is bounded; a slow but live download is never
    /// cut off.
    pub fn with_connect_timeout(config: &InstallerConfig, timeout: Duration) -> Result<Self> {
        Self::build(Client::builder().connect_timeout(timeout), config)
    }

    fn build(builder: reqwest::ClientBuilder, config: &InstallerConfig) -> Result<Self> {
        let client = builder
            .user_agent(NetworkConfig::user_agent())
            .build()
            .map_err(|e| RelfetchError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                status_code: None,
                source: Some(e),
            })?;

        Ok(Self {
            client,
            token: config.token.clone(),
        })
    }

    /// Get a reference to the underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Whether API requests carry a token.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// GET an API URL and decode its JSON body together with its `Link`
    /// header.
    pub async fn get_json_page<T: DeserializeOwned>(&self, url: &Url) -> Result<JsonPage<T>> {
        let mut request = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, NetworkConfig::GITHUB_ACCEPT);
        if let Some(token) = &self.token {
            request = request.header(header::AUTHORIZATION, format!("token {}", token));
        }

        let response = request.send().await.map_err(|e| RelfetchError::Network {
            message: format!("GET {} failed: {}", url, e),
            status_code: None,
            source: Some(e),
        })?;
        let response = check_response_status(response, url.as_str())?;

        let links = response
            .headers()
            .get(header::LINK)
            .and_then(|v| v.to_str().ok())
            .map(|v| PageLinks::parse(v, url))
            .unwrap_or_default();
        debug!("`Link` header: {:?}", links);

        let bytes = response.bytes().await.map_err(|e| RelfetchError::Network {
            message: format!("Error reading response from {}: {}", url, e),
            status_code: None,
            source: Some(e),
        })?;
        let body = serde_json::from_slice(&bytes).map_err(|e| RelfetchError::Json {
            message: format!("Failed to parse response from {}: {}", url, e),
            source: Some(e),
        })?;

        Ok(JsonPage { body, links })
    }

    /// GET a public download URL. No credentials are attached.
    pub async fn get_download(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RelfetchError::Network {
                message: format!("GET {} failed: {}", url, e),
                status_code: None,
                source: Some(e),
            })?;

        check_response_status(response, url)
    }
}

fn check_response_status(response: Response, url: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(RelfetchError::Network {
        message: format!("GET {} returned {}", url, status),
        status_code: Some(status.as_u16()),
        source: None,
    })
}
