use zbus::blocking::Connection;
use zbus::proxy;

use super::{BrightnessBackend, BrightnessBackendConstructor};

#[proxy(
	default_service = "org.freedesktop.UPower",
	default_path = "/org/freedesktop/UPower/KbdBacklight",
	interface = "org.freedesktop.UPower.KbdBacklight"
)]
pub trait KbdBacklight {
	#[zbus(name = "GetMaxBrightness")]
	fn get_max_brightness(&self) -> zbus::Result<i32>;

	#[zbus(name = "GetBrightness")]
	fn get_brightness(&self) -> zbus::Result<i32>;

	#[zbus(name = "SetBrightness")]
	fn set_brightness(&self, value: i32) -> zbus::Result<()>;
}

pub(super) struct UPowerKbdBacklight {
	proxy: KbdBacklightProxyBlocking<'static>,
}

impl BrightnessBackendConstructor for UPowerKbdBacklight {
	// UPower picks the device itself
	fn try_new(_device_name: Option<String>) -> anyhow::Result<Self> {
		let connection = Connection::system()?;
		let proxy = KbdBacklightProxyBlocking::new(&connection)?;
		// Fails when UPower exports no KbdBacklight object
		proxy.get_max_brightness()?;
		Ok(Self { proxy })
	}
}

impl BrightnessBackend for UPowerKbdBacklight {
	fn get_max(&mut self) -> anyhow::Result<i32> {
		Ok(self.proxy.get_max_brightness()?)
	}

	fn get_current(&mut self) -> anyhow::Result<i32> {
		Ok(self.proxy.get_brightness()?)
	}

	fn set(&mut self, val: i32) -> anyhow::Result<()> {
		Ok(self.proxy.set_brightness(val)?)
	}
}
