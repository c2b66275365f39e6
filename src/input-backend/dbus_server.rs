use zbus::object_server::SignalEmitter;
use zbus::{Connection, connection, interface};

use crate::config::{DBUS_BACKEND_NAME, DBUS_PATH};

pub struct DbusServer;

#[interface(name = "org.kbdbacklightd")]
impl DbusServer {
	/// A keyboard backlight key went down.
	#[zbus(signal)]
	pub async fn key_pressed(signal_ctxt: &SignalEmitter<'_>, key_code: u16) -> zbus::Result<()>;

	/// Some input device saw user input. Rate limited by the backend.
	#[zbus(signal)]
	pub async fn activity(signal_ctxt: &SignalEmitter<'_>) -> zbus::Result<()>;
}

impl DbusServer {
	pub async fn init(self) -> zbus::Result<Connection> {
		connection::Builder::system()?
			.name(DBUS_BACKEND_NAME)?
			.serve_at(DBUS_PATH, self)?
			.build()
			.await
	}
}
