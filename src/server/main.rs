mod application;
mod controller;
mod events;
mod idle;
mod login1;
mod notify;
mod settings;
mod upower;

#[path = "../args.rs"]
mod args;
#[path = "../argtypes.rs"]
mod argtypes;
#[path = "../config.rs"]
mod config;
#[path = "../global_utils.rs"]
mod global_utils;

#[path = "../brightness_backend/mod.rs"]
mod brightness_backend;

use application::KbdBacklightApplication;
use args::ArgsServer;
use argtypes::ArgTypes;
use async_channel::Sender;
use clap::Parser;
use config::{DBUS_PATH, DBUS_SERVER_NAME};
use events::{ButtonKey, Event};
use global_utils::assignment_parser;
use log::{debug, error, warn};
use settings::Property;
use std::future::pending;
use std::str::FromStr;
use zbus::{connection, interface};

struct DbusServer {
	sender: Sender<Event>,
}

impl DbusServer {
	fn parse_action(arg_type: ArgTypes, data: &str) -> Option<Event> {
		match arg_type {
			ArgTypes::KbdBrightnessRaise => Some(Event::Button(ButtonKey::KbdBrightnessUp)),
			ArgTypes::KbdBrightnessLower => Some(Event::Button(ButtonKey::KbdBrightnessDown)),
			ArgTypes::SetProperty => {
				let (key, value) = match assignment_parser(data) {
					Ok(parsed) => parsed,
					Err(error) => {
						warn!("Invalid SET-PROPERTY data: {}", error);
						return None;
					}
				};
				match Property::from_str(key) {
					Ok(property) => Some(Event::SetProperty(property, value)),
					Err(error) => {
						warn!("{}", error);
						None
					}
				}
			}
			ArgTypes::None => None,
		}
	}
}

#[interface(name = "org.kbdbacklightd")]
impl DbusServer {
	pub async fn handle_action(&self, arg_type: String, data: String) -> bool {
		let arg_type = match ArgTypes::from_str(&arg_type) {
			Ok(arg_type) => arg_type,
			Err(other_type) => {
				warn!("Unknown action in Dbus handle_action: {:?}", other_type);
				return false;
			}
		};
		debug!("Action {} \"{}\"", arg_type, data);
		let Some(event) = Self::parse_action(arg_type, &data) else {
			return false;
		};
		if let Err(error) = self.sender.send(event).await {
			error!("Channel Send error: {}", error);
			return false;
		}
		true
	}
}

impl DbusServer {
	async fn new(sender: Sender<Event>) -> zbus::Result<()> {
		let _connection = connection::Builder::session()?
			.name(DBUS_SERVER_NAME)?
			.serve_at(DBUS_PATH, DbusServer { sender })?
			.build()
			.await?;
		pending::<()>().await;
		Ok(())
	}
}

fn main() -> anyhow::Result<()> {
	let args = ArgsServer::parse();

	let default_filter = if args.verbose { "debug" } else { "info" };
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
		.init();

	// Parse Config
	let server_config = config::user::read_user_config(args.config.as_deref())?.server;

	let (sender, receiver) = async_channel::bounded::<Event>(32);
	// Start the DBus Server
	let dbus_sender = sender.clone();
	async_std::task::spawn(async move {
		if let Err(error) = DbusServer::new(dbus_sender).await {
			error!("Failed to start the DBus server: {}", error);
		}
	});

	let application = KbdBacklightApplication::new(&server_config, &args, sender, receiver)?;
	std::process::exit(application.start());
}
