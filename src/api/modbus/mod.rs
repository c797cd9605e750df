pub mod master;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use master::ModbusMaster;

pub use crate::core::{
    FlumePollHandler, HealthSnapshot, LoggingHandler, PollGroup, PollGroupSpec, PollHandler,
    PollOutcome, RegisterState, DEFAULT_POLL_GROUPS,
};
pub use crate::protocol::{
    modbus::{ErrorKind, ModbusError, RegisterClass},
    registers::{RegisterId, RegisterValue},
};

/// Link settings for one controller. Defaults match a stock CTS 602 installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub slave_address: u8,
    /// Delay between two scheduled group reads
    pub poll_interval_ms: u64,
    /// Link is reported offline once the last success is older than this
    pub offline_timeout_ms: u64,
    /// Deadline for a complete response after the request is written
    pub response_timeout_ms: u64,
    /// Bound on waiting for another transaction to release the wire
    pub lock_timeout_ms: u64,
    /// Replaces the built-in poll table when set
    pub poll_groups: Option<Vec<PollGroupSpec>>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port_name: default_port_name(),
            baud_rate: 19200,
            slave_address: 30,
            poll_interval_ms: 3000,
            offline_timeout_ms: 10_000,
            response_timeout_ms: 500,
            lock_timeout_ms: 1000,
            poll_groups: None,
        }
    }
}

fn default_port_name() -> String {
    if cfg!(windows) {
        "COM1".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

impl LinkConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|err| anyhow!("Invalid config: {err}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|err| anyhow!("Failed to serialize config: {err}"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.slave_address == 0 || self.slave_address > 247 {
            return Err(anyhow!(
                "slave_address {} outside 1..=247",
                self.slave_address
            ));
        }
        if self.baud_rate == 0 {
            return Err(anyhow!("baud_rate must be positive"));
        }
        for (name, value) in [
            ("response_timeout_ms", self.response_timeout_ms),
            ("lock_timeout_ms", self.lock_timeout_ms),
            ("poll_interval_ms", self.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(anyhow!("{name} must be positive"));
            }
        }
        Ok(())
    }

    pub fn poll_specs(&self) -> &[PollGroupSpec] {
        self.poll_groups.as_deref().unwrap_or(DEFAULT_POLL_GROUPS)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.slave_address, 30);
        assert_eq!(config.baud_rate, 19200);
        assert_eq!(config.poll_specs().len(), DEFAULT_POLL_GROUPS.len());
    }

    #[test]
    fn test_partial_toml() -> Result<()> {
        let config = LinkConfig::from_toml(
            r#"
            port_name = "/dev/ttyAMA0"
            poll_interval_ms = 1000

            [[poll_groups]]
            class = "input"
            start = 211
            quantity = 2
            "#,
        )?;
        assert_eq!(config.port_name, "/dev/ttyAMA0");
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.offline_timeout_ms, 10_000);
        assert_eq!(
            config.poll_specs(),
            &[PollGroupSpec::new(RegisterClass::Input, 211, 2)]
        );
        Ok(())
    }

    #[test]
    fn test_toml_round_trip() -> Result<()> {
        let mut config = LinkConfig::default();
        config.poll_groups = Some(vec![PollGroupSpec::new(RegisterClass::Holding, 1700, 2)]);
        let parsed = LinkConfig::from_toml(&config.to_toml()?)?;
        assert_eq!(parsed, config);
        Ok(())
    }

    #[test]
    fn test_bad_slave_address() {
        assert!(LinkConfig::from_toml("slave_address = 0").is_err());
        assert!(LinkConfig::from_toml("slave_address = 248").is_err());
    }

    #[test]
    fn test_zero_durations_rejected() {
        for key in ["response_timeout_ms", "lock_timeout_ms", "poll_interval_ms"] {
            let err = LinkConfig::from_toml(&format!("{key} = 0")).unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
        }
        assert!(LinkConfig::from_toml("lock_timeout_ms = 1\npoll_interval_ms = 1").is_ok());
    }
}
