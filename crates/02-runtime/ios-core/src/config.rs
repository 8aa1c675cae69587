//! Runtime configuration for the HLE devices.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Number of content descriptors real firmware can keep open at once.
pub const DEFAULT_CONTENT_TABLE_CAPACITY: usize = 16;
/// Number of kernel file descriptors available to the guest.
pub const DEFAULT_MAX_IPC_FDS: usize = 24;
/// Delay between two hot-plug scan passes.
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 50;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Top-level configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IosConfig {
    /// Capacity of the content descriptor table.
    pub content_table_capacity: usize,
    /// Capacity of the kernel file descriptor table.
    pub max_ipc_fds: usize,
    pub usb: UsbConfig,
}

impl Default for IosConfig {
    fn default() -> Self {
        Self {
            content_table_capacity: DEFAULT_CONTENT_TABLE_CAPACITY,
            max_ipc_fds: DEFAULT_MAX_IPC_FDS,
            usb: UsbConfig::default(),
        }
    }
}

impl IosConfig {
    /// Parses and validates a TOML document; missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content_table_capacity == 0 {
            return Err(ConfigError::Invalid("content_table_capacity must be non-zero"));
        }
        if self.max_ipc_fds == 0 {
            return Err(ConfigError::Invalid("max_ipc_fds must be non-zero"));
        }
        if self.usb.scan_interval_ms == 0 {
            return Err(ConfigError::Invalid("usb.scan_interval_ms must be non-zero"));
        }
        Ok(())
    }
}

/// Host USB passthrough settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UsbConfig {
    /// `[vid, pid]` pairs allowed through to the guest.
    pub passthrough_devices: Vec<(u16, u16)>,
    pub scan_interval_ms: u64,
}

impl Default for UsbConfig {
    fn default() -> Self {
        Self {
            passthrough_devices: Vec::new(),
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
        }
    }
}

impl UsbConfig {
    pub fn is_whitelisted(&self, vid: u16, pid: u16) -> bool {
        self.passthrough_devices.contains(&(vid, pid))
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = IosConfig::from_toml_str("").unwrap();
        assert_eq!(config, IosConfig::default());
        assert_eq!(config.content_table_capacity, 16);
        assert_eq!(config.usb.scan_interval(), Duration::from_millis(50));
    }

    #[test]
    fn whitelist_is_parsed() {
        let config = IosConfig::from_toml_str(
            r#"
content_table_capacity = 4

[usb]
passthrough_devices = [[0x057e, 0x0308], [0x046d, 0x0a03]]
"#,
        )
        .unwrap();
        assert_eq!(config.content_table_capacity, 4);
        assert!(config.usb.is_whitelisted(0x057e, 0x0308));
        assert!(!config.usb.is_whitelisted(0x057e, 0x0309));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = IosConfig::from_toml_str("content_table_capacity = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(matches!(
            IosConfig::from_toml_str("bogus = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
