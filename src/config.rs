use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Shared settings for the three control-plane binaries. Listen addresses
/// apply to the role that binds them; dial addresses to the role that
/// connects out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlPlaneConfig {
    pub controller_listen: String,
    pub router_listen: String,
    /// Where the controller reaches the router.
    pub router_addr: String,
    /// Where the switch reaches the controller.
    pub controller_addr: String,
    /// Applied to every socket operation: connect, read, write.
    pub io_timeout_secs: u64,
}

impl Default for ControlPlaneConfig {
    fn default() -> Self {
        Self {
            controller_listen: "127.0.0.1:2345".to_string(),
            router_listen: "127.0.0.1:1234".to_string(),
            router_addr: "127.0.0.1:1234".to_string(),
            controller_addr: "127.0.0.1:2345".to_string(),
            io_timeout_secs: 10,
        }
    }
}

impl ControlPlaneConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("cannot parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_use_the_reference_ports() {
        let config = ControlPlaneConfig::default();
        assert_eq!(config.controller_listen, "127.0.0.1:2345");
        assert_eq!(config.router_listen, "127.0.0.1:1234");
        assert_eq!(config.io_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn partial_config_files_fall_back_to_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{\"router_addr\": \"10.1.1.1:4000\"}}").unwrap();

        let config = ControlPlaneConfig::load(file.path()).unwrap();
        assert_eq!(config.router_addr, "10.1.1.1:4000");
        assert_eq!(config.controller_listen, "127.0.0.1:2345");
    }

    #[test]
    fn save_and_load_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let mut config = ControlPlaneConfig::default();
        config.io_timeout_secs = 3;
        config.save(file.path()).unwrap();
        let loaded = ControlPlaneConfig::load(file.path()).unwrap();
        assert_eq!(loaded.io_timeout_secs, 3);
        assert_eq!(loaded.router_listen, config.router_listen);
    }
}
