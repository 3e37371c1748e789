//! CLI command implementations

use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Subcommand};
use relserve_core::{
    FilenameMatch, Release, ReleaseCatalog, ScanPolicy, ServerConfig, match_installer,
};

/// Options shared by every command that reads the catalog.
///
/// Unset options fall back to the environment (`RELEASES_DIR`, `BASE_URL`)
/// and then to defaults.
#[derive(Args, Debug, Default)]
pub struct CatalogArgs {
    /// Directory holding installer files
    #[arg(long)]
    releases_dir: Option<PathBuf>,
    /// Public URL prefix used in download links
    #[arg(long)]
    base_url: Option<String>,
    /// Fail instead of skipping installers whose metadata cannot be read
    #[arg(long)]
    strict_scan: bool,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the release server
    Serve {
        /// Address to bind to
        #[arg(long)]
        host: Option<IpAddr>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        #[command(flatten)]
        catalog: CatalogArgs,
    },
    /// List all releases, newest first
    List {
        /// Print the `all.json` document instead of a table
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        catalog: CatalogArgs,
    },
    /// Print the latest release as JSON
    Latest {
        #[command(flatten)]
        catalog: CatalogArgs,
    },
    /// Report whether a filename is a recognized installer
    Check {
        /// Filename to check
        filename: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the error of the command that failed
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            host,
            port,
            catalog,
        } => serve(host, port, catalog).await,
        Commands::List { json, catalog } => list_releases(json, catalog).await,
        Commands::Latest { catalog } => show_latest(catalog).await,
        Commands::Check { filename } => {
            check_filename(&filename);
            Ok(())
        }
    }
}

fn resolve_config(args: CatalogArgs) -> ServerConfig {
    let mut config = ServerConfig::from_env();
    if let Some(dir) = args.releases_dir {
        config = config.with_releases_dir(dir);
    }
    if let Some(base_url) = args.base_url {
        config = config.with_base_url(base_url);
    }
    if args.strict_scan {
        config = config.with_scan_policy(ScanPolicy::Strict);
    }
    config
}

/// Start the release server
///
/// # Errors
/// - `RelserveError::Configuration` - Invalid base URL
/// - `RelserveError::Io` - Failed to bind the listener
pub async fn serve(
    host: Option<IpAddr>,
    port: Option<u16>,
    args: CatalogArgs,
) -> anyhow::Result<()> {
    let mut config = resolve_config(args);
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }

    relserve_web::run_server(config)
        .await
        .map_err(|e| {
            let message = e.user_message();
            anyhow::Error::new(e).context(message)
        })
}

async fn build_catalog(config: &ServerConfig) -> anyhow::Result<Vec<Release>> {
    ReleaseCatalog::from_config(config)
        .build_catalog()
        .await
        .with_context(|| format!("failed to list {}", config.releases_dir.display()))
}

/// List all releases
///
/// # Errors
/// - `CatalogError::DirectoryAccess` - Releases directory unreadable
/// - `CatalogError::FileAccess` - Installer unreadable under strict scanning
pub async fn list_releases(json: bool, args: CatalogArgs) -> anyhow::Result<()> {
    let config = resolve_config(args);
    let releases = build_catalog(&config).await?;

    if json {
        let document = serde_json::json!({ "versions": releases });
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    if releases.is_empty() {
        println!("No releases in {}", config.releases_dir.display());
        return Ok(());
    }

    println!("{:<12} {:<26} FILE", "TAG", "PUBLISHED");
    for release in &releases {
        println!(
            "{:<12} {:<26} {}",
            release.tag,
            release.published_at.format("%Y-%m-%d %H:%M:%S UTC"),
            release.filename().unwrap_or_default()
        );
    }
    Ok(())
}

/// Print the latest release
///
/// # Errors
/// Fails when the catalog cannot be read or holds no releases
pub async fn show_latest(args: CatalogArgs) -> anyhow::Result<()> {
    let config = resolve_config(args);
    let Some(latest) = build_catalog(&config).await?.into_iter().next() else {
        bail!("No releases found in {}", config.releases_dir.display());
    };

    println!("{}", serde_json::to_string_pretty(&latest)?);
    Ok(())
}

/// Report whether a filename is a recognized installer
pub fn check_filename(filename: &str) {
    match match_installer(filename) {
        FilenameMatch::Installer(version) => {
            println!("{filename}: installer for {} (tag {})", version, version.tag());
        }
        FilenameMatch::NoMatch => {
            println!("{filename}: not an installer, excluded from the catalog");
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_resolve_config_applies_flags() {
        let config = resolve_config(CatalogArgs {
            releases_dir: Some(PathBuf::from("/srv/releases")),
            base_url: Some("https://dl.example.com".to_string()),
            strict_scan: true,
        });

        assert_eq!(config.releases_dir, PathBuf::from("/srv/releases"));
        assert_eq!(config.base_url, "https://dl.example.com");
        assert_eq!(config.scan_policy, ScanPolicy::Strict);
    }

    #[tokio::test]
    async fn test_show_latest_fails_on_empty_catalog() {
        let dir = TempDir::new().unwrap();
        let args = CatalogArgs {
            releases_dir: Some(dir.path().to_path_buf()),
            ..CatalogArgs::default()
        };

        assert!(show_latest(args).await.is_err());
    }

    #[tokio::test]
    async fn test_list_releases_reports_missing_directory() {
        let dir = TempDir::new().unwrap();
        let args = CatalogArgs {
            releases_dir: Some(dir.path().join("missing")),
            ..CatalogArgs::default()
        };

        let err = list_releases(false, args).await.unwrap_err();
        assert!(err.to_string().contains("failed to list"));
    }
}
