//! Persisted brightness preferences.
//!
//! The six properties live in a small TOML file in the user's config dir.
//! Unset properties are left out of the file, so a fresh install never pushes
//! a level to the hardware until the user picked one.

use async_channel::Sender;
use log::{debug, warn};
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use xdg::BaseDirectories;

use crate::config::APPLICATION_NAME;
use crate::events::{Event, PowerState};

const SETTINGS_FILE_NAME: &str = "settings.toml";
const WATCH_INTERVAL: Duration = Duration::from_millis(1500);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Property {
	LevelOnAc,
	LevelOnBattery,
	DimLevelOnAc,
	DimLevelOnBattery,
	TimeoutOnAc,
	TimeoutOnBattery,
}

impl Property {
	pub const ALL: [Property; 6] = [
		Property::LevelOnAc,
		Property::LevelOnBattery,
		Property::DimLevelOnAc,
		Property::DimLevelOnBattery,
		Property::TimeoutOnAc,
		Property::TimeoutOnBattery,
	];

	pub fn level(state: PowerState) -> Self {
		match state {
			PowerState::Ac => Property::LevelOnAc,
			PowerState::Battery => Property::LevelOnBattery,
		}
	}

	pub fn dim_level(state: PowerState) -> Self {
		match state {
			PowerState::Ac => Property::DimLevelOnAc,
			PowerState::Battery => Property::DimLevelOnBattery,
		}
	}

	pub fn timeout(state: PowerState) -> Self {
		match state {
			PowerState::Ac => Property::TimeoutOnAc,
			PowerState::Battery => Property::TimeoutOnBattery,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Property::LevelOnAc => "level-on-ac",
			Property::LevelOnBattery => "level-on-battery",
			Property::DimLevelOnAc => "dim-level-on-ac",
			Property::DimLevelOnBattery => "dim-level-on-battery",
			Property::TimeoutOnAc => "timeout-on-ac",
			Property::TimeoutOnBattery => "timeout-on-battery",
		}
	}
}

impl fmt::Display for Property {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Unknown property \"{0}\"")]
pub struct ParsePropertyError(String);

impl FromStr for Property {
	type Err = ParsePropertyError;

	fn from_str(input: &str) -> Result<Self, Self::Err> {
		Property::ALL
			.into_iter()
			.find(|property| property.name() == input)
			.ok_or_else(|| ParsePropertyError(input.to_owned()))
	}
}

#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct Settings {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub level_on_ac: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub level_on_battery: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub dim_level_on_ac: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub dim_level_on_battery: Option<u32>,
	/// Seconds of inactivity before dimming
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timeout_on_ac: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timeout_on_battery: Option<u32>,
}

impl Settings {
	fn slot(&mut self, property: Property) -> &mut Option<u32> {
		match property {
			Property::LevelOnAc => &mut self.level_on_ac,
			Property::LevelOnBattery => &mut self.level_on_battery,
			Property::DimLevelOnAc => &mut self.dim_level_on_ac,
			Property::DimLevelOnBattery => &mut self.dim_level_on_battery,
			Property::TimeoutOnAc => &mut self.timeout_on_ac,
			Property::TimeoutOnBattery => &mut self.timeout_on_battery,
		}
	}

	pub fn get(&self, property: Property) -> Option<u32> {
		match property {
			Property::LevelOnAc => self.level_on_ac,
			Property::LevelOnBattery => self.level_on_battery,
			Property::DimLevelOnAc => self.dim_level_on_ac,
			Property::DimLevelOnBattery => self.dim_level_on_battery,
			Property::TimeoutOnAc => self.timeout_on_ac,
			Property::TimeoutOnBattery => self.timeout_on_battery,
		}
	}

	pub fn set(&mut self, property: Property, value: u32) {
		*self.slot(property) = Some(value);
	}

	/// Properties whose value differs between `self` and `other`.
	pub fn changed_properties(&self, other: &Settings) -> Vec<Property> {
		Property::ALL
			.into_iter()
			.filter(|property| self.get(*property) != other.get(*property))
			.collect()
	}
}

/// Key/value store the controller reads its preferences from.
pub trait SettingsStore {
	fn get(&self, property: Property) -> Option<u32>;

	/// Updates the value and persists it.
	fn set(&mut self, property: Property, value: u32) -> anyhow::Result<()>;

	/// Re-reads the backing storage, returning the properties that changed.
	fn reload(&mut self) -> Vec<Property>;
}

#[derive(Error, Debug)]
pub enum SettingsError {
	#[error("failed to read {}: {source}", path.display())]
	Read { path: PathBuf, source: io::Error },
	#[error("failed to parse {}: {source}", path.display())]
	Parse {
		path: PathBuf,
		source: toml::de::Error,
	},
	#[error("failed to write {}: {source}", path.display())]
	Write { path: PathBuf, source: io::Error },
	#[error("failed to serialize settings: {0}")]
	Serialize(#[from] toml::ser::Error),
}

pub struct FileSettings {
	path: PathBuf,
	settings: Settings,
}

impl FileSettings {
	/// Never fails: unreadable or broken files fall back to unset values.
	pub fn load(path: PathBuf) -> Self {
		let settings = match read_settings(&path) {
			Ok(settings) => settings,
			Err(error) => {
				warn!("{error}, using defaults");
				Settings::default()
			}
		};
		debug!("Loaded settings from {}: {:?}", path.display(), settings);
		Self { path, settings }
	}
}

impl SettingsStore for FileSettings {
	fn get(&self, property: Property) -> Option<u32> {
		self.settings.get(property)
	}

	fn set(&mut self, property: Property, value: u32) -> anyhow::Result<()> {
		self.settings.set(property, value);
		write_settings_atomic(&self.path, &self.settings)?;
		Ok(())
	}

	fn reload(&mut self) -> Vec<Property> {
		match read_settings(&self.path) {
			Ok(settings) => {
				let changed = self.settings.changed_properties(&settings);
				self.settings = settings;
				changed
			}
			Err(error) => {
				warn!("{error}, keeping previous settings");
				Vec::new()
			}
		}
	}
}

fn read_settings(path: &Path) -> Result<Settings, SettingsError> {
	match fs::read_to_string(path) {
		Ok(content) => toml::from_str(&content).map_err(|source| SettingsError::Parse {
			path: path.to_owned(),
			source,
		}),
		Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Settings::default()),
		Err(source) => Err(SettingsError::Read {
			path: path.to_owned(),
			source,
		}),
	}
}

fn write_settings_atomic(path: &Path, settings: &Settings) -> Result<(), SettingsError> {
	let write_error = |source| SettingsError::Write {
		path: path.to_owned(),
		source,
	};
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).map_err(write_error)?;
	}
	let data = toml::to_string_pretty(settings)?;
	let tmp = PathBuf::from(format!("{}.tmp", path.display()));
	fs::write(&tmp, data).map_err(write_error)?;
	fs::rename(&tmp, path).map_err(write_error)?;
	Ok(())
}

pub fn default_settings_path() -> anyhow::Result<PathBuf> {
	let dirs = BaseDirectories::with_prefix(APPLICATION_NAME)?;
	Ok(dirs.place_config_file(SETTINGS_FILE_NAME)?)
}

fn modified(path: &Path) -> Option<SystemTime> {
	fs::metadata(path).ok().and_then(|m| m.modified().ok())
}

/// Polls the settings file and queues `SettingsFileChanged` on every mtime change.
pub fn spawn_watcher(path: PathBuf, sender: Sender<Event>) {
	thread::spawn(move || {
		let mut last_mtime = modified(&path);
		loop {
			thread::sleep(WATCH_INTERVAL);
			let mtime = modified(&path);
			if mtime == last_mtime {
				continue;
			}
			last_mtime = mtime;
			if sender.send_blocking(Event::SettingsFileChanged).is_err() {
				// Event loop is gone
				break;
			}
		}
	});
}
