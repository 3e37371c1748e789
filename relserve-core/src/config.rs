//! Centralized configuration for Relserve.
//!
//! Settings are read once at process start into an immutable [`ServerConfig`]
//! that is handed to the HTTP layer.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use tracing::warn;
use url::Url;

use crate::RelserveError;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 5001;

/// Default directory holding installer files.
pub const DEFAULT_RELEASES_DIR: &str = "releases";

/// How the catalog treats installer entries whose metadata cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPolicy {
    /// Log and exclude the entry, keep building the catalog
    #[default]
    SkipUnreadable,
    /// Fail the whole catalog query
    Strict,
}

/// Server configuration.
///
/// `base_url` is the public prefix used in download links. It defaults to
/// `http://localhost:<port>` and follows the port unless set explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub host: IpAddr,
    /// Port the HTTP listener binds to
    pub port: u16,
    /// Public URL prefix for download links
    pub base_url: String,
    /// Directory scanned for installer files
    pub releases_dir: PathBuf,
    /// Handling of unreadable installer entries
    pub scan_policy: ScanPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            base_url: default_base_url(DEFAULT_PORT),
            releases_dir: PathBuf::from(DEFAULT_RELEASES_DIR),
            scan_policy: ScanPolicy::default(),
        }
    }
}

/// `http://localhost:<port>`
pub fn default_base_url(port: u16) -> String {
    format!("http://localhost:{port}")
}

impl ServerConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Recognizes `PORT`, `HOST`, `BASE_URL`, `RELEASES_DIR` and
    /// `RELSERVE_STRICT_SCAN`. Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => config = config.with_port(port),
                Err(_) => warn!("Ignoring invalid PORT value: {port}"),
            }
        }

        if let Some(host) = lookup("HOST") {
            match host.trim().parse::<IpAddr>() {
                Ok(host) => config.host = host,
                Err(_) => warn!("Ignoring invalid HOST value: {host}"),
            }
        }

        if let Some(base_url) = lookup("BASE_URL").filter(|v| !v.trim().is_empty()) {
            config.base_url = base_url.trim().to_string();
        }

        if let Some(dir) = lookup("RELEASES_DIR").filter(|v| !v.trim().is_empty()) {
            config.releases_dir = PathBuf::from(dir);
        }

        if let Some(strict) = lookup("RELSERVE_STRICT_SCAN") {
            match parse_flag(&strict) {
                Some(true) => config.scan_policy = ScanPolicy::Strict,
                Some(false) => config.scan_policy = ScanPolicy::SkipUnreadable,
                None => warn!("Ignoring invalid RELSERVE_STRICT_SCAN value: {strict}"),
            }
        }

        config
    }

    /// Sets the port, moving the default base URL along with it.
    pub fn with_port(mut self, port: u16) -> Self {
        if self.base_url == default_base_url(self.port) {
            self.base_url = default_base_url(port);
        }
        self.port = port;
        self
    }

    /// Sets the bind address.
    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Sets the public URL prefix for download links.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the releases directory.
    pub fn with_releases_dir(mut self, releases_dir: impl Into<PathBuf>) -> Self {
        self.releases_dir = releases_dir.into();
        self
    }

    /// Sets the scan policy.
    pub fn with_scan_policy(mut self, scan_policy: ScanPolicy) -> Self {
        self.scan_policy = scan_policy;
        self
    }

    /// Socket address the server listens on.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Checks that the base URL is an absolute http(s) URL.
    ///
    /// # Errors
    /// - `RelserveError::Configuration` - Base URL is not an absolute http(s) URL
    pub fn validate(&self) -> Result<(), RelserveError> {
        let url = Url::parse(&self.base_url).map_err(|e| RelserveError::Configuration {
            reason: format!("invalid BASE_URL '{}': {e}", self.base_url),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RelserveError::Configuration {
                reason: format!("BASE_URL must use http or https, got '{}'", url.scheme()),
            });
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_map(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_vars(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5001);
        assert_eq!(config.base_url, "http://localhost:5001");
        assert_eq!(config.releases_dir, PathBuf::from("releases"));
        assert_eq!(config.scan_policy, ScanPolicy::SkipUnreadable);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_moves_default_base_url() {
        let config = from_map(&[("PORT", "8080")]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.listen_addr().port(), 8080);
    }

    #[test]
    fn test_explicit_base_url_wins() {
        let config = from_map(&[("PORT", "8080"), ("BASE_URL", "https://releases.example.com")]);
        assert_eq!(config.base_url, "https://releases.example.com");

        let config = ServerConfig::default()
            .with_base_url("https://cdn.example.com")
            .with_port(9000);
        assert_eq!(config.base_url, "https://cdn.example.com");
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = from_map(&[
            ("PORT", "not-a-port"),
            ("HOST", "nowhere"),
            ("RELSERVE_STRICT_SCAN", "maybe"),
        ]);
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn test_strict_scan_and_releases_dir() {
        let config = from_map(&[("RELSERVE_STRICT_SCAN", "true"), ("RELEASES_DIR", "/srv/rel")]);
        assert_eq!(config.scan_policy, ScanPolicy::Strict);
        assert_eq!(config.releases_dir, PathBuf::from("/srv/rel"));
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        let config = ServerConfig::default().with_base_url("localhost:5001/x");
        assert!(config.validate().is_err());

        let config = ServerConfig::default().with_base_url("ftp://example.com");
        assert!(matches!(
            config.validate(),
            Err(RelserveError::Configuration { .. })
        ));
    }
}
