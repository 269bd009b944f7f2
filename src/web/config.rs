//! Web server configuration.

use crate::error::{MonitorError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::warn;

/// Where the monitor listens and what it serves besides the feeds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
    /// Allow any origin, so a page hosted elsewhere can embed the feeds
    pub enable_cors: bool,
    /// Directory with the monitor page (`index.html`) and its assets
    pub static_dir: Option<PathBuf>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: crate::DEFAULT_WEB_PORT,
            enable_cors: true,
            static_dir: Some(PathBuf::from("static")),
        }
    }
}

impl WebConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_cors(mut self, enable_cors: bool) -> Self {
        self.enable_cors = enable_cors;
        self
    }

    pub fn with_static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Socket address to bind. The host must be an IP literal.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| {
                MonitorError::config_error(format!(
                    "Invalid bind address {}:{}: {}",
                    self.host, self.port, e
                ))
            })
    }

    /// The static directory, if one is configured and present on disk.
    pub fn static_root(&self) -> Option<PathBuf> {
        let dir = self.static_dir.as_ref()?;
        if dir.is_dir() {
            Some(dir.clone())
        } else {
            warn!("Static path {:?} does not exist, serving default index", dir);
            None
        }
    }

    /// Custom monitor page, when the static directory provides one.
    pub fn index_file(&self) -> Option<PathBuf> {
        self.static_root()
            .map(|dir| dir.join("index.html"))
            .filter(|file| file.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        let config = WebConfig::new("127.0.0.1", 9000).with_cors(false);
        assert_eq!(config.bind_address().unwrap(), "127.0.0.1:9000".parse().unwrap());
        assert!(!config.enable_cors);
        assert_eq!(WebConfig::default().port, 8080);
    }

    #[test]
    fn test_hostname_is_rejected() {
        let config = WebConfig::new("nursery.local", 8080);
        assert!(matches!(config.bind_address(), Err(MonitorError::Config(_))));
    }

    #[test]
    fn test_missing_static_dir_falls_back() {
        let config = WebConfig::default().with_static_dir(Some(PathBuf::from("no/such/dir")));
        assert!(config.static_root().is_none());
        assert!(config.index_file().is_none());
        assert!(WebConfig::default().with_static_dir(None).static_root().is_none());
    }

    #[test]
    fn test_static_dir_without_index() {
        let src = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src");
        let config = WebConfig::default().with_static_dir(Some(src.clone()));
        assert_eq!(config.static_root(), Some(src));
        assert!(config.index_file().is_none());
    }
}
