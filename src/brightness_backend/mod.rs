use log::{info, warn};

use self::{blight::Blight, upower::UPowerKbdBacklight};
use crate::config::user::BackendKind;

mod blight;

mod upower;

pub type BrightnessBackendResult = anyhow::Result<Box<dyn BrightnessBackend>>;

pub trait BrightnessBackendConstructor: BrightnessBackend + Sized + 'static {
	fn try_new(device_name: Option<String>) -> anyhow::Result<Self>;

	fn try_new_boxed(device_name: Option<String>) -> BrightnessBackendResult {
		let backend = Self::try_new(device_name);
		match backend {
			Ok(backend) => Ok(Box::new(backend)),
			Err(e) => Err(e),
		}
	}
}

/// Raw keyboard backlight levels, `0..=get_max()`.
pub trait BrightnessBackend {
	fn get_max(&mut self) -> anyhow::Result<i32>;
	fn get_current(&mut self) -> anyhow::Result<i32>;

	fn set(&mut self, val: i32) -> anyhow::Result<()>;
}

pub fn get_preferred_backend(
	kind: BackendKind,
	device_name: Option<String>,
) -> BrightnessBackendResult {
	match kind {
		BackendKind::Upower => UPowerKbdBacklight::try_new_boxed(device_name),
		BackendKind::Sysfs => Blight::try_new_boxed(device_name),
		BackendKind::Auto => {
			info!("Trying UPower KbdBacklight Backend...");
			UPowerKbdBacklight::try_new_boxed(device_name.clone()).or_else(|e| {
				warn!("...UPower failed ({e}), falling back to sysfs LEDs");
				Blight::try_new_boxed(device_name)
			})
		}
	}
}
