use clap::ValueEnum;
use serde_derive::Deserialize;
use std::path::{Path, PathBuf};
use xdg::BaseDirectories;

use super::APPLICATION_NAME;

/// Which keyboard backlight implementation the daemon talks to.
#[derive(Deserialize, ValueEnum, Clone, Copy, Default, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
	/// UPower first, then the sysfs LED class.
	#[default]
	Auto,
	/// `org.freedesktop.UPower.KbdBacklight`
	Upower,
	/// `/sys/class/leds/<device>`
	Sysfs,
}

#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
	pub backend: Option<BackendKind>,
	/// LED class name used by the sysfs backend.
	pub device: Option<String>,
	pub show_notifications: Option<bool>,
	/// Where the brightness preferences are persisted.
	pub settings: Option<PathBuf>,
}

#[derive(Deserialize, Default, Debug)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
	#[serde(default)]
	pub server: ServerConfig,
}

fn find_user_config() -> Option<PathBuf> {
	BaseDirectories::with_prefix(APPLICATION_NAME)
		.ok()
		.and_then(|dirs| dirs.find_config_file("config.toml"))
}

pub fn read_user_config(path: Option<&Path>) -> anyhow::Result<UserConfig> {
	let path = match path.map(Path::to_owned).or_else(find_user_config) {
		Some(path) => path,
		None => return Ok(Default::default()),
	};

	let config_file = std::fs::read_to_string(path)?;
	let config: UserConfig = toml::from_str(&config_file)?;
	Ok(config)
}
