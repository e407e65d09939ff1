//! Collector configuration.
//!
//! Loaded from an optional JSON file; missing keys take their defaults, and
//! the CLI overrides individual fields afterwards. [`CollectorConfig::validate`]
//! runs before anything starts, and a failure is fatal.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the SNMP collector and the query server it feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// SNMP agent as `host:port`.
    #[serde(default = "default_agent")]
    pub agent: String,

    /// SNMPv2c community string.
    #[serde(default = "default_community")]
    pub community: String,

    /// Time between cycle starts.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Per-attempt SNMP request timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Extra attempts after the first timeout.
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Upper bound on one group fetch, including retries. Must be at least
    /// `request_timeout_ms * (retries + 1)`.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Collect receptacle state as one extra batch per cycle.
    #[serde(default)]
    pub poll_receptacles: bool,

    /// Query server bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Query server port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_agent() -> String {
    "192.168.1.103:161".to_string()
}

fn default_community() -> String {
    "LiebertEM".to_string()
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    800
}

fn default_retries() -> u32 {
    1
}

fn default_fetch_timeout_ms() -> u64 {
    2000
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8888
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            agent: default_agent(),
            community: default_community(),
            interval_ms: default_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            retries: default_retries(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            poll_receptacles: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

impl CollectorConfig {
    /// Read a JSON config file. Keys not present keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    /// Check every field that would otherwise fail later at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let port_ok = self
            .agent
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !port_ok {
            return Err(ConfigError::Invalid {
                field: "agent",
                reason: format!("expected host:port, got {:?}", self.agent),
            });
        }
        if self.community.is_empty() {
            return Err(ConfigError::Invalid {
                field: "community",
                reason: "must not be empty".to_string(),
            });
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "interval_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.request_timeout_ms == 0 || self.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout",
                reason: "timeouts must be greater than zero".to_string(),
            });
        }
        let budget = self.snmp_budget_ms();
        if self.fetch_timeout_ms < budget {
            return Err(ConfigError::Invalid {
                field: "fetch_timeout_ms",
                reason: format!(
                    "{} ms leaves no room for retries; request_timeout_ms x (retries + 1) is {budget} ms",
                    self.fetch_timeout_ms
                ),
            });
        }
        Ok(())
    }

    /// Longest time one SNMP fetch can take with every retry used.
    pub fn snmp_budget_ms(&self) -> u64 {
        self.request_timeout_ms
            .saturating_mul(u64::from(self.retries) + 1)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_deployment() {
        let config = CollectorConfig::default();
        assert_eq!(config.agent, "192.168.1.103:161");
        assert_eq!(config.community, "LiebertEM");
        assert_eq!(config.interval(), Duration::from_millis(1000));
        assert_eq!(config.port, 8888);
        assert!(!config.poll_receptacles);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"community": "public", "poll_receptacles": true}}"#).unwrap();

        let config = CollectorConfig::load(file.path()).unwrap();
        assert_eq!(config.community, "public");
        assert!(config.poll_receptacles);
        assert_eq!(config.agent, default_agent());
        assert_eq!(config.interval_ms, 1000);
    }

    #[test]
    fn test_load_roundtrip() {
        let config = CollectorConfig {
            agent: "10.0.0.5:1161".to_string(),
            interval_ms: 250,
            ..Default::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&config).unwrap().as_bytes())
            .unwrap();
        assert_eq!(CollectorConfig::load(file.path()).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = CollectorConfig::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = CollectorConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_agent() {
        for agent in ["192.168.1.103", ":161", "pdu:notaport", ""] {
            let config = CollectorConfig {
                agent: agent.to_string(),
                ..Default::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid { field: "agent", .. })),
                "{agent:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_rejects_fetch_timeout_below_retry_budget() {
        let config = CollectorConfig {
            request_timeout_ms: 1500,
            retries: 1,
            ..Default::default()
        };
        assert_eq!(config.snmp_budget_ms(), 3000);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "fetch_timeout_ms", .. })
        ));

        let config = CollectorConfig {
            fetch_timeout_ms: 3000,
            ..config
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = CollectorConfig {
            interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
