#[path = "../args.rs"]
mod args;
#[path = "../argtypes.rs"]
mod argtypes;
#[path = "../config.rs"]
mod config;
#[path = "../global_utils.rs"]
mod global_utils;

use clap::Parser;
use zbus::{blocking::Connection, proxy};

use crate::args::ArgsClient;
use crate::argtypes::ArgTypes;

#[proxy(
	interface = "org.kbdbacklightd",
	default_service = "org.kbdbacklightd-server",
	default_path = "/org/kbdbacklightd"
)]
trait Server {
	async fn handle_action(&self, arg_type: String, data: String) -> zbus::Result<bool>;
}

fn get_proxy() -> zbus::Result<ServerProxyBlocking<'static>> {
	let connection = Connection::session()?;
	ServerProxyBlocking::new(&connection)
}

fn main() {
	let args = ArgsClient::parse();

	let actions = match parse_args(&args) {
		Ok(actions) => actions,
		Err(msg) => {
			eprintln!("{}", msg);
			std::process::exit(2);
		}
	};

	// Make sure that the server is running
	let proxy = match get_proxy() {
		Ok(proxy) => match proxy.0.introspect() {
			Ok(_) => proxy,
			Err(err) => {
				eprintln!("Could not connect to kbd-backlightd with error: {}", err);
				std::process::exit(1);
			}
		},
		Err(err) => {
			eprintln!("Dbus error: {}", err);
			std::process::exit(1);
		}
	};

	let mut exit_code = 0;
	for (arg_type, data) in actions {
		match proxy.handle_action(arg_type.to_string(), data.clone()) {
			Ok(true) => {}
			Ok(false) => {
				eprintln!("kbd-backlightd rejected {} \"{}\"", arg_type, data);
				exit_code = 1;
			}
			Err(err) => {
				eprintln!("Dbus error: {}", err);
				exit_code = 1;
			}
		}
	}
	std::process::exit(exit_code);
}

fn parse_args(args: &ArgsClient) -> Result<Vec<(ArgTypes, String)>, String> {
	let mut actions: Vec<(ArgTypes, String)> = Vec::new();

	// Preferences first, so a raise/lower in the same call sees them
	for assignment in &args.set {
		global_utils::assignment_parser(assignment).map_err(|err| err.to_string())?;
		actions.push((ArgTypes::SetProperty, assignment.to_owned()));
	}

	if args.raise {
		actions.push((ArgTypes::KbdBrightnessRaise, String::new()));
	}
	if args.lower {
		actions.push((ArgTypes::KbdBrightnessLower, String::new()));
	}

	Ok(actions)
}
