//! Error types for relfetch.
//!
//! Errors are split in two layers. [`InstallationError`] holds the domain
//! failures a caller turns into a user-facing message (missing release,
//! unsupported platform, unsupported archive). Everything else on
//! [`RelfetchError`] is an unexpected fault and is propagated as-is.

use std::path::PathBuf;
use thiserror::Error;

/// Domain errors raised while resolving what to install.
#[derive(Debug, Error)]
pub enum InstallationError {
    #[error("Release not found: {version}")]
    ReleaseNotFound {
        version: String,
        /// The HTTP failure that reported the missing release, if any.
        #[source]
        source: Option<Box<RelfetchError>>,
    },

    #[error("Unsupported platform: {platform}")]
    UnsupportedPlatform { platform: String },

    #[error("Unsupported file type: {filename}")]
    UnsupportedFileType { filename: String },
}

/// Main error type for relfetch.
#[derive(Debug, Error)]
pub enum RelfetchError {
    #[error(transparent)]
    Installation(#[from] InstallationError),

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// HTTP status when the server answered with a failure code.
        status_code: Option<u16>,
        #[source]
        source: Option<reqwest::Error>,
    },

    // Archive errors
    #[error("Archive error: {message}")]
    Archive { message: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for relfetch operations.
pub type Result<T> = std::result::Result<T, RelfetchError>;

impl From<std::io::Error> for RelfetchError {
    fn from(err: std::io::Error) -> Self {
        RelfetchError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for RelfetchError {
    fn from(err: serde_json::Error) -> Self {
        RelfetchError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for RelfetchError {
    fn from(err: reqwest::Error) -> Self {
        RelfetchError::Network {
            message: err.to_string(),
            status_code: err.status().map(|s| s.as_u16()),
            source: Some(err),
        }
    }
}

impl From<zip::result::ZipError> for RelfetchError {
    fn from(err: zip::result::ZipError) -> Self {
        RelfetchError::Archive {
            message: err.to_string(),
        }
    }
}

impl RelfetchError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        RelfetchError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create an archive error.
    pub fn archive(message: impl Into<String>) -> Self {
        RelfetchError::Archive {
            message: message.into(),
        }
    }

    /// True when the server answered 404.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RelfetchError::Network {
                status_code: Some(404),
                ..
            }
        )
    }

    /// True for failures the user caused or can act on, as opposed to
    /// internal faults.
    pub fn is_domain_error(&self) -> bool {
        matches!(self, RelfetchError::Installation(_))
    }

    /// Borrow the domain error, if this is one.
    pub fn as_installation_error(&self) -> Option<&InstallationError> {
        match self {
            RelfetchError::Installation(err) => Some(err),
            _ => None,
        }
    }
}
