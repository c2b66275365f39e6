use crate::args::ArgsServer;
use crate::brightness_backend;
use crate::config::user::ServerConfig;
use crate::config::{DBUS_BACKEND_NAME, DBUS_INTERFACE, DBUS_PATH};
use crate::controller::BacklightController;
use crate::events::{ButtonKey, Event};
use crate::idle::{self, IdleHandle};
use crate::login1;
use crate::notify::DesktopNotifier;
use crate::settings::{self, FileSettings};
use crate::upower::{self, UPowerSource};
use async_channel::{Receiver, Sender};
use async_std::stream::StreamExt;
use async_std::task;
use log::{error, info, warn};
use std::future::Future;
use std::path::PathBuf;
use zbus::{Connection, proxy};

#[proxy(
	interface = "org.kbdbacklightd",
	default_service = "org.kbdbacklightd",
	default_path = "/org/kbdbacklightd"
)]
trait InputBackend {
	#[zbus(signal)]
	fn key_pressed(&self, key_code: u16) -> zbus::Result<()>;

	#[zbus(signal)]
	fn activity(&self) -> zbus::Result<()>;
}

pub struct KbdBacklightApplication {
	controller: BacklightController,
	settings_path: PathBuf,
	idle: IdleHandle,
	sender: Sender<Event>,
	receiver: Receiver<Event>,
}

impl KbdBacklightApplication {
	pub fn new(
		server_config: &ServerConfig,
		args: &ArgsServer,
		sender: Sender<Event>,
		receiver: Receiver<Event>,
	) -> anyhow::Result<Self> {
		// Command line wins over the config file
		let kind = args.backend.or(server_config.backend).unwrap_or_default();
		let device = args.device.clone().or_else(|| server_config.device.clone());
		let backend = match brightness_backend::get_preferred_backend(kind, device) {
			Ok(backend) => Some(backend),
			Err(error) => {
				warn!("Unable to open a keyboard backlight: {:#}", error);
				None
			}
		};

		let settings_path = match args.settings.clone().or_else(|| server_config.settings.clone()) {
			Some(path) => path,
			None => settings::default_settings_path()?,
		};
		info!("Using settings file {}", settings_path.display());

		let idle = idle::spawn(sender.clone());
		let notifier = DesktopNotifier::new(server_config.show_notifications.unwrap_or(true));
		let controller = BacklightController::new(
			backend,
			&UPowerSource::new(),
			Box::new(FileSettings::load(settings_path.clone())),
			Box::new(idle.clone()),
			Box::new(notifier),
		);

		Ok(Self {
			controller,
			settings_path,
			idle,
			sender,
			receiver,
		})
	}

	/// Runs the event loop on the calling thread. Returns the exit code.
	pub fn start(mut self) -> i32 {
		if !self.controller.has_hardware() {
			warn!("No keyboard backlight found, nothing to do");
			return 0;
		}
		info!("Keyboard backlight has {} levels", self.controller.max_level() + 1);

		self.listen();

		while let Ok(event) = self.receiver.recv_blocking() {
			self.controller.handle_event(event);
		}
		error!("Event queue closed unexpectedly");
		1
	}

	fn listen(&self) {
		spawn_listener("UPower", upower::listen_to_on_battery(self.sender.clone()));
		spawn_listener(
			"Login1",
			login1::listen_to_prepare_for_sleep(self.idle.clone()),
		);
		spawn_listener(
			"LibInput backend keys",
			listen_to_key_presses(self.sender.clone()),
		);
		spawn_listener(
			"LibInput backend activity",
			listen_to_activity(self.idle.clone()),
		);
		settings::spawn_watcher(self.settings_path.clone(), self.sender.clone());
	}
}

fn spawn_listener<F>(name: &'static str, future: F)
where
	F: Future<Output = zbus::Result<()>> + Send + 'static,
{
	task::spawn(async move {
		if let Err(error) = future.await {
			warn!("{} listener stopped: {}", name, error);
		}
	});
}

async fn input_backend_proxy() -> zbus::Result<InputBackendProxy<'static>> {
	let connection = Connection::system().await?;
	info!(
		"Listening for {} signals from {} at {}",
		DBUS_INTERFACE, DBUS_BACKEND_NAME, DBUS_PATH
	);
	InputBackendProxy::new(&connection).await
}

async fn listen_to_key_presses(sender: Sender<Event>) -> zbus::Result<()> {
	let proxy = input_backend_proxy().await?;
	let mut key_stream = proxy.receive_key_pressed().await?;
	while let Some(msg) = key_stream.next().await {
		let args = match msg.args() {
			Ok(args) => args,
			Err(error) => {
				warn!("KeyPressed args aren't valid: {}", error);
				continue;
			}
		};
		let Some(key) = ButtonKey::from_key_code(args.key_code) else {
			continue;
		};
		if sender.send(Event::Button(key)).await.is_err() {
			break;
		}
	}
	warn!("LibInput backend key stream ended");
	Ok(())
}

async fn listen_to_activity(idle: IdleHandle) -> zbus::Result<()> {
	let proxy = input_backend_proxy().await?;
	let mut activity_stream = proxy.receive_activity().await?;
	while activity_stream.next().await.is_some() {
		idle.notify_activity().await;
	}
	warn!("LibInput backend activity stream ended");
	Ok(())
}
