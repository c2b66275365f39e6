use async_channel::Sender;
use async_std::stream::StreamExt;
use log::{info, warn};
use zbus::{Connection, proxy};

use crate::events::Event;

#[proxy(
	default_service = "org.freedesktop.UPower",
	default_path = "/org/freedesktop/UPower",
	interface = "org.freedesktop.UPower"
)]
pub trait UPower {
	#[zbus(property)]
	fn on_battery(&self) -> zbus::Result<bool>;
}

pub trait PowerSource {
	fn on_battery(&self) -> bool;
}

/// Reads `OnBattery` once, for the controller's startup.
pub struct UPowerSource {
	proxy: Option<UPowerProxyBlocking<'static>>,
}

impl UPowerSource {
	pub fn new() -> Self {
		let proxy = zbus::blocking::Connection::system()
			.and_then(|conn| UPowerProxyBlocking::new(&conn));
		match proxy {
			Ok(proxy) => Self { proxy: Some(proxy) },
			Err(error) => {
				warn!("UPower unavailable, assuming AC power: {}", error);
				Self { proxy: None }
			}
		}
	}
}

impl PowerSource for UPowerSource {
	fn on_battery(&self) -> bool {
		let Some(proxy) = &self.proxy else {
			return false;
		};
		proxy.on_battery().unwrap_or_else(|error| {
			warn!("Failed to read OnBattery, assuming AC power: {}", error);
			false
		})
	}
}

pub async fn listen_to_on_battery(sender: Sender<Event>) -> zbus::Result<()> {
	let connection = Connection::system().await?;
	let proxy = UPowerProxy::new(&connection).await?;
	let mut changed_stream = proxy.receive_on_battery_changed().await;
	while let Some(msg) = changed_stream.next().await {
		match msg.get().await {
			Ok(on_battery) => {
				info!("Power source changed, on battery: {}", on_battery);
				if sender.send(Event::OnBatteryChanged(on_battery)).await.is_err() {
					break;
				}
			}
			Err(error) => warn!("UPower OnBattery isn't valid: {}", error),
		}
	}
	warn!("UPower stream ended unexpectedly");
	Ok(())
}
