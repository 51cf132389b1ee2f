// src/config.rs

use core::time::Duration;
use serde::Deserialize;

use crate::common::{
    error::ConfigError,
    frame::LineSettings,
    hal_traits::VendorAllowList,
    timing::{POLL_INTERVAL, RESPONSE_TIMEOUT},
};

/// Engine settings. Every field has a default matching the probe's fixed
/// protocol, so an empty document is a valid configuration.
///
/// ```toml
/// poll_interval = "5s"
/// response_timeout = "1000ms"
/// vendor_ids = [0x0403, 0x1A86]
/// accept_cdc_class = true
/// channel_capacity = 64
///
/// [line]
/// baud_rate = 9600
/// data_bits = 8
/// stop_bits = "1"
/// parity = "none"
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub response_timeout: Duration,
    pub line: LineSettings,
    pub vendor_ids: Vec<u16>,
    pub accept_cdc_class: bool,
    /// Bound of each outbound event channel.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            poll_interval: POLL_INTERVAL,
            response_timeout: RESPONSE_TIMEOUT,
            line: LineSettings::PROBE_9600_8N1,
            vendor_ids: VendorAllowList::COMMON_BRIDGE_VENDORS.to_vec(),
            accept_cdc_class: true,
            channel_capacity: 64,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the engine cannot run with.
    ///
    /// The response timeout must be shorter than the poll interval so a
    /// timed-out transaction is cleared before the next tick.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid("poll_interval must be positive"));
        }
        if self.response_timeout.is_zero() {
            return Err(ConfigError::Invalid("response_timeout must be positive"));
        }
        if self.response_timeout >= self.poll_interval {
            return Err(ConfigError::Invalid(
                "response_timeout must be shorter than poll_interval",
            ));
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Invalid("channel_capacity must be positive"));
        }
        Ok(())
    }

    /// The device predicate described by `vendor_ids` and `accept_cdc_class`.
    pub fn device_filter(&self) -> VendorAllowList {
        VendorAllowList {
            vendor_ids: self.vendor_ids.clone(),
            accept_cdc_class: self.accept_cdc_class,
        }
    }
}
