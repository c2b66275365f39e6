use serde_derive::Deserialize;
use std::path::PathBuf;
use xdg::BaseDirectories;

use super::APPLICATION_NAME;

const DEFAULT_SEAT: &str = "seat0";
const DEFAULT_ACTIVITY_INTERVAL_MS: u64 = 1000;

#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct InputBackendConfig {
	/// udev seat libinput is assigned to.
	pub seat: Option<String>,
	/// Minimum time between two `Activity` signals.
	pub activity_interval_ms: Option<u64>,
}

impl InputBackendConfig {
	pub fn seat(&self) -> &str {
		self.seat.as_deref().unwrap_or(DEFAULT_SEAT)
	}

	pub fn activity_interval_ms(&self) -> u64 {
		self.activity_interval_ms
			.unwrap_or(DEFAULT_ACTIVITY_INTERVAL_MS)
	}
}

#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
	#[serde(default)]
	pub input: InputBackendConfig,
}

fn find_backend_config() -> Option<PathBuf> {
	BaseDirectories::with_prefix(APPLICATION_NAME)
		.ok()
		.and_then(|dirs| dirs.find_config_file("backend.toml"))
}

pub fn read_backend_config() -> anyhow::Result<BackendConfig> {
	let path = match find_backend_config() {
		Some(path) => path,
		None => return Ok(Default::default()),
	};

	let config_file = std::fs::read_to_string(path)?;
	let config: BackendConfig = toml::from_str(&config_file)?;
	Ok(config)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_backend_config_uses_defaults() {
		let config: BackendConfig = toml::from_str("").unwrap();
		assert_eq!(config.input.seat(), "seat0");
		assert_eq!(config.input.activity_interval_ms(), 1000);
	}

	#[test]
	fn unknown_input_keys_are_rejected() {
		assert!(toml::from_str::<BackendConfig>("[input]\nignore_caps_lock_key = true\n").is_err());
	}
}
