//! relfetch - install a GitHub-released binary for the current platform.
//!
//! By default this installs the latest `deno` release into `~/.deno/bin`.
//! A config file can point it at any repository that publishes gzip or zip
//! artifacts per platform.

mod install;
mod list;
mod version;

use anyhow::{Context, Result};
use clap::Parser;
use relfetch_core::{current_platform_key, InstallerConfig, ReleaseFetcher, RelfetchError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

const INVALID_VERSION: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "relfetch", version)]
#[command(about = "Install a release binary from GitHub")]
struct Args {
    /// Version to install, defaults to latest (`1.2` means `v1.2.0`)
    #[arg(value_name = "VERSION")]
    target: Option<String>,

    /// List releases, optionally only those inside a semver range
    #[arg(short, long, value_name = "RANGE", num_args = 0..=1, default_missing_value = "*")]
    list_releases: Option<String>,

    /// Platform key used to pick the artifact (defaults to the running OS)
    #[arg(long)]
    platform: Option<String>,

    /// JSON installer configuration
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Install directory (defaults to ~/.<binary>/bin)
    #[arg(long, value_name = "DIR")]
    install_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Print a user-facing error and produce the matching exit code.
pub(crate) fn fail(message: &str, code: u8) -> ExitCode {
    eprintln!("Error: {}", message);
    ExitCode::from(code)
}

fn init_logging(debug: bool) {
    let default_level = if debug {
        LevelFilter::DEBUG
    } else {
        LevelFilter::WARN
    };
    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<InstallerConfig> {
    let config = match path {
        Some(path) => InstallerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => InstallerConfig::default(),
    };
    Ok(config.with_env_overrides())
}

async fn run(args: Args) -> Result<ExitCode> {
    let config = load_config(args.config.as_ref())?;
    let fetcher = ReleaseFetcher::new(config).context("Invalid configuration")?;

    if let Some(range) = args.list_releases.as_deref() {
        // `relfetch ^1.2 -l` passes the range positionally.
        let range = if range == "*" {
            args.target.as_deref().unwrap_or(range)
        } else {
            range
        };
        return list::run(&fetcher, Some(range)).await;
    }

    let Some(selector) = version::selector_for(args.target.as_deref()) else {
        return Ok(fail("Invalid version provided.", INVALID_VERSION));
    };
    debug!("install version `{}`", selector);

    let platform = args
        .platform
        .unwrap_or_else(|| current_platform_key().to_string());
    let dir = match args.install_dir {
        Some(dir) => dir,
        None => install::default_install_dir(&fetcher.config().binary_name)?,
    };

    match install::run(&fetcher, &selector, &platform, &dir).await {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(err) => match err.downcast_ref::<RelfetchError>() {
            Some(domain) if domain.is_domain_error() => Ok(fail(&domain.to_string(), 1)),
            _ => Err(err),
        },
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.debug);
    run(args).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_install() {
        let args = Args::try_parse_from(["relfetch", "1.2", "--platform", "linux", "-d"]).unwrap();
        assert_eq!(args.target.as_deref(), Some("1.2"));
        assert_eq!(args.platform.as_deref(), Some("linux"));
        assert!(args.debug);
        assert!(args.list_releases.is_none());
    }

    #[test]
    fn test_args_list_without_range() {
        let args = Args::try_parse_from(["relfetch", "-l"]).unwrap();
        assert_eq!(args.list_releases.as_deref(), Some("*"));
        assert!(args.target.is_none());
    }

    #[test]
    fn test_args_list_with_range() {
        let args = Args::try_parse_from(["relfetch", "--list-releases", "^1.2"]).unwrap();
        assert_eq!(args.list_releases.as_deref(), Some("^1.2"));
    }

    #[test]
    fn test_load_default_config() {
        let config = load_config(None).unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_missing_config_fails() {
        let path = PathBuf::from("/nonexistent/relfetch.json");
        assert!(load_config(Some(&path)).is_err());
    }
}
