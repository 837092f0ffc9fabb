//! Centralized configuration for relfetch.
//!
//! Compile-time constants live on [`AppConfig`] and [`NetworkConfig`]. The
//! per-project settings (which repository, which file per platform) live on
//! [`InstallerConfig`], which can be loaded from a JSON file.

use crate::artifact::ArtifactTable;
use crate::{RelfetchError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "relfetch";
    pub const DEFAULT_REPO: &'static str = "denoland/deno";
    pub const DEFAULT_BINARY_NAME: &'static str = "deno";
    pub const DOWNLOAD_SUFFIX: &'static str = ".download";
    pub const TOKEN_ENV: &'static str = "GITHUB_TOKEN";
    pub const API_BASE_ENV: &'static str = "RELFETCH_API_BASE";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const GITHUB_API_BASE: &'static str = "https://api.github.com";
    pub const GITHUB_ACCEPT: &'static str = "application/vnd.github.v3+json";
    pub const GITHUB_RELEASES_PER_PAGE: u32 = 100;
    /// Upper bound on followed `next` links when the server does not
    /// advertise a `last` page.
    pub const GITHUB_RELEASES_MAX_PAGES: u32 = 50;
    /// Largest zip archive we are willing to hold in memory while locating
    /// its central directory.
    pub const ZIP_BUFFER_LIMIT: u64 = 512 * 1024 * 1024;
    /// Most memory reserved for a zip archive before its bytes arrive.
    pub const ZIP_INITIAL_CAPACITY: usize = 8 * 1024 * 1024;
    /// Size of the chunks produced when reading a zip entry.
    pub const ZIP_READ_CHUNK_SIZE: usize = 64 * 1024;

    /// User agent sent with every request.
    pub fn user_agent() -> String {
        format!("{}/{}", AppConfig::APP_NAME, env!("CARGO_PKG_VERSION"))
    }
}

/// Settings describing which project to install and how to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallerConfig {
    /// Repository in `owner/name` form.
    pub repo: String,
    /// Platform key to acceptable asset filenames, in priority order.
    pub artifacts: ArtifactTable,
    /// Base URL of the releases API.
    pub api_base: String,
    /// Name of the installed executable (without `.exe`).
    pub binary_name: String,
    /// Token for API requests. Never sent to asset download URLs.
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub per_page: u32,
    pub max_pages: u32,
    pub zip_buffer_limit: u64,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        let artifacts = ArtifactTable::new()
            .with_platform(
                "linux",
                ["deno-x86_64-unknown-linux-gnu.zip", "deno_linux_x64.gz"],
            )
            .with_platform(
                "macos",
                ["deno-x86_64-apple-darwin.zip", "deno_osx_x64.gz"],
            )
            .with_platform(
                "windows",
                ["deno-x86_64-pc-windows-msvc.zip", "deno_win_x64.zip"],
            );

        Self {
            repo: AppConfig::DEFAULT_REPO.to_string(),
            artifacts,
            api_base: NetworkConfig::GITHUB_API_BASE.to_string(),
            binary_name: AppConfig::DEFAULT_BINARY_NAME.to_string(),
            token: None,
            per_page: NetworkConfig::GITHUB_RELEASES_PER_PAGE,
            max_pages: NetworkConfig::GITHUB_RELEASES_MAX_PAGES,
            zip_buffer_limit: NetworkConfig::ZIP_BUFFER_LIMIT,
        }
    }
}

impl InstallerConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| RelfetchError::io_with_path(e, path))?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| RelfetchError::Config {
            message: format!("Invalid config {}: {}", path.display(), e),
        })?;
        debug!("Loaded config from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    /// Apply `GITHUB_TOKEN` and `RELFETCH_API_BASE` from the environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(token) = env_value(AppConfig::TOKEN_ENV) {
            self.token = Some(token);
        }
        if let Some(api_base) = env_value(AppConfig::API_BASE_ENV) {
            self.api_base = api_base;
        }
        self
    }

    /// Check that the configuration can produce valid requests.
    pub fn validate(&self) -> Result<()> {
        let mut parts = self.repo.split('/');
        let valid_repo = matches!(
            (parts.next(), parts.next(), parts.next()),
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
        );
        if !valid_repo {
            return Err(RelfetchError::Config {
                message: format!("repo must be `owner/name`, got `{}`", self.repo),
            });
        }

        url::Url::parse(&self.api_base).map_err(|e| RelfetchError::Config {
            message: format!("invalid apiBase `{}`: {}", self.api_base, e),
        })?;

        if self.per_page == 0 || self.max_pages == 0 {
            return Err(RelfetchError::Config {
                message: "perPage and maxPages must be positive".to_string(),
            });
        }

        if self.binary_name.is_empty() {
            return Err(RelfetchError::Config {
                message: "binaryName must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Listing URL for all releases of the configured repository.
    pub fn releases_url(&self) -> String {
        format!(
            "{}/repos/{}/releases",
            self.api_base.trim_end_matches('/'),
            self.repo
        )
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
