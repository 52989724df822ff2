use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 6379;

/// Where the store lives. Every field is optional in the YAML file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl StoreConfig {
    /// Apply command-line (or environment) values over this config.
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }
}

pub fn load_config(path: &Path) -> Result<StoreConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let cfg: StoreConfig = serde_yaml::from_str(&content).context("Failed to parse YAML config")?;
    Ok(cfg)
}

/// Resolve the store address once at startup: defaults, then the optional
/// file, then explicit overrides.
pub fn resolve(path: Option<&Path>, host: Option<String>, port: Option<u16>) -> Result<StoreConfig> {
    let base = match path {
        Some(path) => load_config(path)?,
        None => StoreConfig::default(),
    };
    Ok(base.with_overrides(host, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn yaml(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_defaults() {
        let cfg = resolve(None, None, None).unwrap();
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.port, 6379);
    }

    #[test]
    fn test_file_then_overrides() {
        let f = yaml("host: redis.internal\nport: 7000\n");
        let cfg = resolve(Some(f.path()), None, None).unwrap();
        assert_eq!(
            cfg,
            StoreConfig {
                host: "redis.internal".into(),
                port: 7000
            }
        );

        let cfg = resolve(Some(f.path()), None, Some(7001)).unwrap();
        assert_eq!(cfg.host, "redis.internal");
        assert_eq!(cfg.port, 7001);
    }

    #[test]
    fn test_partial_file() {
        let f = yaml("port: 6380\n");
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.port, 6380);
    }

    #[test]
    fn test_bad_file() {
        let f = yaml("hots: typo\n");
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML config"));

        let missing = Path::new("/nonexistent/redisfs.yaml");
        assert!(load_config(missing).is_err());
    }
}
