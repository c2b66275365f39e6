use async_std::stream::StreamExt;
use log::{debug, warn};
use zbus::{Connection, proxy};

use crate::idle::IdleHandle;

#[proxy(
	default_service = "org.freedesktop.login1",
	default_path = "/org/freedesktop/login1",
	interface = "org.freedesktop.login1.Manager"
)]
pub trait Login1 {
	#[zbus(signal, name = "PrepareForSleep")]
	fn prepare_for_sleep(&self, start: bool) -> zbus::Result<()>;
}

pub struct Login1 {}

impl Login1 {
	pub async fn init<'a>() -> zbus::Result<Login1Proxy<'a>> {
		let connection = Connection::system().await?;
		let proxy = Login1Proxy::builder(&connection).build().await?;

		Ok(proxy)
	}
}

/// Waking up from suspend counts as user activity.
pub async fn listen_to_prepare_for_sleep(idle: IdleHandle) -> zbus::Result<()> {
	let proxy = Login1::init().await?;
	let mut changed_stream = proxy.receive_prepare_for_sleep().await?;
	while let Some(msg) = changed_stream.next().await {
		match msg.args() {
			Ok(args) if !args.start => {
				debug!("Resumed from sleep");
				idle.notify_activity().await;
			}
			Ok(_) => (),
			Err(error) => warn!("Login1 args aren't valid: {}", error),
		}
	}
	warn!("Login1 stream ended unexpectedly");
	Ok(())
}
