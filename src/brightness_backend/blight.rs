use anyhow::bail;
use blight::Device;
use std::fs;
use thiserror::Error;

use super::{BrightnessBackend, BrightnessBackendConstructor};

const LEDS_PATH: &str = "/sys/class/leds";

#[derive(Error, Debug)]
#[error("No keyboard backlight LED found in {LEDS_PATH}")]
pub struct NoKbdLedError;

#[derive(Error, Debug)]
#[error("Level {level} is outside of 0..={max}")]
pub struct LevelOutOfRangeError {
	level: i32,
	max: u32,
}

pub(super) struct Blight {
	device: Device,
}

/// First `*kbd_backlight*` entry of the LED class.
fn find_kbd_led() -> Option<String> {
	let mut names: Vec<String> = fs::read_dir(LEDS_PATH)
		.ok()?
		.filter_map(|entry| entry.ok())
		.filter_map(|entry| entry.file_name().into_string().ok())
		.filter(|name| name.contains("kbd_backlight"))
		.collect();
	names.sort();
	names.into_iter().next()
}

impl BrightnessBackendConstructor for Blight {
	fn try_new(device_name: Option<String>) -> anyhow::Result<Self> {
		let device_name = match device_name.or_else(find_kbd_led) {
			Some(name) => name,
			None => bail!(NoKbdLedError),
		};
		Ok(Self {
			device: Device::new(Some(device_name.into()))?,
		})
	}
}

impl BrightnessBackend for Blight {
	fn get_max(&mut self) -> anyhow::Result<i32> {
		Ok(i32::try_from(self.device.max())?)
	}

	fn get_current(&mut self) -> anyhow::Result<i32> {
		self.device.reload();
		Ok(i32::try_from(self.device.current())?)
	}

	fn set(&mut self, val: i32) -> anyhow::Result<()> {
		let max = self.device.max();
		let Ok(level) = u32::try_from(val) else {
			bail!(LevelOutOfRangeError { level: val, max });
		};
		if level > max {
			bail!(LevelOutOfRangeError { level: val, max });
		}
		Ok(self.device.write_value(level)?)
	}
}
