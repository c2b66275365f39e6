use log::warn;
use std::collections::HashMap;
use zbus::blocking::Connection;
use zbus::proxy;
use zbus::zvariant::Value;

use crate::config::APPLICATION_NAME;

const NOTIFICATION_ICON: &str = "keyboard-brightness";
const NOTIFICATION_TIMEOUT_MS: i32 = -1;

#[proxy(
	default_service = "org.freedesktop.Notifications",
	default_path = "/org/freedesktop/Notifications",
	interface = "org.freedesktop.Notifications"
)]
pub trait Notifications {
	#[allow(clippy::too_many_arguments)]
	fn notify(
		&self,
		app_name: &str,
		replaces_id: u32,
		app_icon: &str,
		summary: &str,
		body: &str,
		actions: &[&str],
		hints: HashMap<&str, &Value<'_>>,
		expire_timeout: i32,
	) -> zbus::Result<u32>;
}

pub trait Notifier {
	/// Fire and forget; repeated calls update the same popup.
	fn show_percent(&mut self, percent: f32);
}

pub fn percent_summary(percent: f32) -> String {
	format!("Keyboard Brightness: {:.0} percent", percent)
}

/// `org.freedesktop.Notifications` on the session bus.
pub struct DesktopNotifier {
	proxy: Option<NotificationsProxyBlocking<'static>>,
	/// Id of the last shown notification, 0 before the first one.
	replaces_id: u32,
}

impl DesktopNotifier {
	pub fn new(enabled: bool) -> Self {
		let proxy = if enabled {
			match Connection::session().and_then(|conn| NotificationsProxyBlocking::new(&conn)) {
				Ok(proxy) => Some(proxy),
				Err(error) => {
					warn!("Notifications unavailable: {}", error);
					None
				}
			}
		} else {
			None
		};
		Self {
			proxy,
			replaces_id: 0,
		}
	}
}

impl Notifier for DesktopNotifier {
	fn show_percent(&mut self, percent: f32) {
		let Some(proxy) = &self.proxy else {
			return;
		};
		let value = Value::from(percent.round() as i32);
		let hints = HashMap::from([("value", &value)]);
		match proxy.notify(
			APPLICATION_NAME,
			self.replaces_id,
			NOTIFICATION_ICON,
			&percent_summary(percent),
			"",
			&[],
			hints,
			NOTIFICATION_TIMEOUT_MS,
		) {
			Ok(id) => self.replaces_id = id,
			Err(error) => warn!("Failed to show keyboard brightness notification: {}", error),
		}
	}
}
