//! Runtime configuration
//!
//! Carries the tunable constants from the communication subsystem's
//! backpressure ("quench") policy and the per-record transfer cap, plus
//! the protocol compatibility floor. Everything here has a sane
//! default; a TOML file only needs to override what it wants to
//! change, mirroring the teacher's `AppConfig`/`ConfigLoader` split.

use std::path::Path;
use serde::{Deserialize, Serialize};

use crate::{AsbridgeError, Result};

/// Root runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub quench: QuenchConfig,
    pub protocol: ProtocolConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            quench: QuenchConfig::default(),
            protocol: ProtocolConfig::default(),
        }
    }
}

/// Backpressure tuning for the Broker's quench computation (§4.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QuenchConfig {
    /// Hard depth cap on the WM-bound data queue. At or above this
    /// depth, quench is unconditionally `Blocked`.
    pub queue_max: usize,
    /// Number of delivered data messages that must accumulate in a
    /// batch window before rate-based quench kicks in.
    pub batch_count: u32,
    /// Milliseconds of quench per message once the batch trigger has
    /// fired.
    pub rate_ms_per_msg: u64,
    /// Upper bound on transfer micro-loop iterations per ready tunnel
    /// in a single post-select pass (§4.4). Not a protocol requirement,
    /// just a fairness knob, so it is configurable rather than a
    /// hardcoded literal.
    pub transfer_cap: u32,
    /// Milliseconds the SCM caps its select timeout to while any
    /// record is `Connecting`, so it re-probes the tunnel promptly.
    pub connect_probe_interval_ms: u64,
}

impl Default for QuenchConfig {
    fn default() -> Self {
        Self {
            queue_max: 50,
            batch_count: 100,
            rate_ms_per_msg: 5,
            transfer_cap: 20,
            connect_probe_interval_ms: 300,
        }
    }
}

/// Protocol compatibility constants for the role handshake (§4.3-4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProtocolConfig {
    pub major: u32,
    pub minor: u32,
    pub last_compatible_minor: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            major: 1,
            minor: 6,
            last_compatible_minor: 3,
        }
    }
}

/// Loads a [`RuntimeConfig`] from TOML, falling back to defaults.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a specific path, or return defaults if
    /// the path does not exist.
    pub fn load_from_path(path: &Path) -> Result<RuntimeConfig> {
        if !path.exists() {
            return Ok(RuntimeConfig::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str, path: &Path) -> Result<RuntimeConfig> {
        let config: RuntimeConfig =
            toml::from_str(content).map_err(|e| AsbridgeError::ConfigInvalid {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate a configuration for internally-consistent values.
    pub fn validate(config: &RuntimeConfig) -> Result<()> {
        if config.quench.queue_max == 0 {
            return Err(AsbridgeError::config("quench.queue_max must be at least 1"));
        }
        if config.quench.transfer_cap == 0 {
            return Err(AsbridgeError::config(
                "quench.transfer_cap must be at least 1",
            ));
        }
        if config.protocol.last_compatible_minor > config.protocol.minor {
            return Err(AsbridgeError::config(
                "protocol.last_compatible_minor cannot exceed protocol.minor",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.quench.queue_max, 50);
        assert_eq!(config.quench.batch_count, 100);
        assert_eq!(config.quench.rate_ms_per_msg, 5);
        assert_eq!(config.quench.transfer_cap, 20);
    }

    #[test]
    fn test_load_missing_path_returns_defaults() {
        let config = ConfigLoader::load_from_path(Path::new("/nonexistent/asbridge.toml"))
            .unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn test_load_from_path_reads_an_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asbridge.toml");
        std::fs::write(&path, "[quench]\nqueue_max = 75\n").unwrap();

        let config = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(config.quench.queue_max, 75);
        assert_eq!(config.quench.batch_count, 100);
    }

    #[test]
    fn test_load_from_path_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asbridge.toml");
        std::fs::write(&path, "[quench]\nqueue_max = 0\n").unwrap();

        assert!(ConfigLoader::load_from_path(&path).is_err());
    }

    #[test]
    fn test_parse_partial_override() {
        let toml = r#"
            [quench]
            queue_max = 200
        "#;
        let config = ConfigLoader::parse(toml, &PathBuf::from("asbridge.toml")).unwrap();
        assert_eq!(config.quench.queue_max, 200);
        // Untouched fields keep their defaults.
        assert_eq!(config.quench.batch_count, 100);
    }

    #[test]
    fn test_validate_rejects_zero_queue_max() {
        let mut config = RuntimeConfig::default();
        config.quench.queue_max = 0;
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_inconsistent_minor() {
        let mut config = RuntimeConfig::default();
        config.protocol.last_compatible_minor = config.protocol.minor + 1;
        assert!(ConfigLoader::validate(&config).is_err());
    }
}
