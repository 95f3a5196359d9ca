use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Name of the optional settings file looked up in the data directory.
pub const CONFIG_FILE_NAME: &str = "appengine.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub quota: QuotaConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Project allowance given to users whose details are created without one.
    pub default_max_projects: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            default_max_projects: 5,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("appengine.db")
    }

    /// Reads `appengine.toml` from `data_dir` if present, otherwise returns defaults
    /// rooted at `data_dir`.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            Self::from_toml(&raw)?
        } else {
            Self::default()
        };
        config.data_dir = data_dir.to_path_buf();
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        if config.quota.default_max_projects < 0 {
            return Err(Error::Config(
                "quota.default_max_projects cannot be negative".to_string(),
            ));
        }
        Ok(config)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            data_dir: PathBuf::from("./data"),
            quota: QuotaConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServerConfig::from_toml("port = 9001\n[quota]\ndefault_max_projects = 2\n")
            .unwrap();
        assert_eq!(config.port, 9001);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.quota.default_max_projects, 2);
    }

    #[test]
    fn test_negative_quota_rejected() {
        let err = ServerConfig::from_toml("[quota]\ndefault_max_projects = -1\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_without_file() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig::load(dir.path()).unwrap();
        assert_eq!(config.data_dir, dir.path());
        assert_eq!(config.quota.default_max_projects, 5);
        assert!(config.db_path().ends_with("appengine.db"));
    }

    #[test]
    fn test_load_reads_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "host = \"0.0.0.0\"\n").unwrap();
        let config = ServerConfig::load(dir.path()).unwrap();
        assert_eq!(config.host, "0.0.0.0");
    }
}
