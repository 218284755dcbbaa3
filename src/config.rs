//! Settings for finding an instrument.
//!
//! Everything has a default, so a config file only needs the keys it changes:
//!
//! ```json
//! { "idn_pattern": "RIGOL TECHNOLOGIES,MSO1...Z", "discovery": { "loops": 5 } }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const DEFAULT_RESOURCE_PATTERN:&str = "TCPIP::{addr}::5555::SOCKET";
pub const DEFAULT_IDN_PATTERN:&str = "RIGOL TECHNOLOGIES,DS1...Z";

/// Placeholder in `resource_pattern` that gets replaced by a discovered address
pub const ADDR_PLACEHOLDER:&str = "{addr}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	pub resource_pattern: String,
	pub idn_pattern: String,
	pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
	/// How many broadcasts to send
	pub loops: u32,
	/// How long to collect replies after each broadcast
	pub timeout_ms: u64,
	/// Timeout for the `*IDN?` probe of each candidate
	pub probe_timeout_ms: u64,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			resource_pattern: DEFAULT_RESOURCE_PATTERN.to_owned(),
			idn_pattern: DEFAULT_IDN_PATTERN.to_owned(),
			discovery: DiscoveryConfig::default(),
		}
	}
}

impl Default for DiscoveryConfig {
	fn default() -> Self {
		DiscoveryConfig{ loops: 3, timeout_ms: 500, probe_timeout_ms: 150 }
	}
}

impl DiscoveryConfig {
	pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_ms) }
	pub fn probe_timeout(&self) -> Duration { Duration::from_millis(self.probe_timeout_ms) }
}

impl Config {

	pub fn from_file<P: AsRef<Path>>(path:P) -> Result<Self> {
		let text = fs::read_to_string(path)?;
		Self::from_json(&text)
	}

	pub fn from_json(text:&str) -> Result<Self> { Ok(serde_json::from_str(text)?) }

}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn missing_keys_take_defaults() {
		let config = Config::from_json(r#"{ "discovery": { "loops": 5 } }"#).unwrap();
		assert_eq!(config.resource_pattern, DEFAULT_RESOURCE_PATTERN);
		assert_eq!(config.idn_pattern, DEFAULT_IDN_PATTERN);
		assert_eq!(config.discovery.loops, 5);
		assert_eq!(config.discovery.timeout(), Duration::from_millis(500));
		assert_eq!(config.discovery.probe_timeout(), Duration::from_millis(150));
	}

	#[test]
	fn malformed_config_is_an_error() {
		assert!(Config::from_json("{ \"discovery\": 3 }").is_err());
	}
}
