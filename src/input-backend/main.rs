use anyhow::Context;
use async_std::task;
use config::DBUS_PATH;
use dbus_server::DbusServer;
use evdev_rs::enums::{EV_KEY, int_to_ev_key};
use input::event::KeyboardEvent;
use input::event::keyboard::{KeyState, KeyboardEventTrait};
use input::{Event, Libinput, LibinputInterface};
use libc::O_RDWR;
use log::{debug, error, info, warn};
use nix::poll::{PollFd, PollFlags, poll};
use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, BorrowedFd};
use std::os::unix::{fs::OpenOptionsExt, io::OwnedFd};
use std::path::Path;
use std::time::{Duration, Instant};
use zbus::object_server::InterfaceRef;

#[path = "../config.rs"]
mod config;
mod dbus_server;

struct Interface;

impl LibinputInterface for Interface {
	fn open_restricted(&mut self, path: &Path, flags: i32) -> Result<OwnedFd, i32> {
		OpenOptions::new()
			.custom_flags(flags)
			.read(flags & O_RDWR != 0)
			.open(path)
			.map(|file| file.into())
			.map_err(|err| err.raw_os_error().unwrap_or(libc::EIO))
	}
	fn close_restricted(&mut self, fd: OwnedFd) {
		drop(File::from(fd));
	}
}

/// Limits `Activity` signals to one per interval.
struct ActivityThrottle {
	interval: Duration,
	last_sent: Option<Instant>,
}

impl ActivityThrottle {
	fn new(interval: Duration) -> Self {
		Self {
			interval,
			last_sent: None,
		}
	}

	fn ready(&mut self, now: Instant) -> bool {
		if let Some(last_sent) = self.last_sent {
			if now.saturating_duration_since(last_sent) < self.interval {
				return false;
			}
		}
		self.last_sent = Some(now);
		true
	}
}

fn backlight_key(code: u32) -> Option<EV_KEY> {
	match int_to_ev_key(code) {
		Some(key @ EV_KEY::KEY_KBDILLUMUP)
		| Some(key @ EV_KEY::KEY_KBDILLUMDOWN)
		| Some(key @ EV_KEY::KEY_KBDILLUMTOGGLE) => Some(key),
		_ => None,
	}
}

fn is_user_input(event: &Event) -> bool {
	matches!(
		event,
		Event::Keyboard(_)
			| Event::Pointer(_)
			| Event::Touch(_)
			| Event::Tablet(_)
			| Event::TabletPad(_)
			| Event::Gesture(_)
	)
}

fn main() -> anyhow::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	// Parse Config
	let input_config = config::backend::read_backend_config()
		.context("Failed to parse backend config file")?
		.input;

	// Create DBUS server
	let connection = task::block_on(DbusServer.init())?;
	let object_server = connection.object_server();
	let iface_ref = task::block_on(object_server.interface::<_, DbusServer>(DBUS_PATH))?;

	// Init libinput
	let mut input = Libinput::new_with_udev(Interface);
	let seat = input_config.seat();
	if input.udev_assign_seat(seat).is_err() {
		anyhow::bail!("Could not assign {}", seat);
	}
	info!("Watching input devices on {}", seat);

	let mut throttle =
		ActivityThrottle::new(Duration::from_millis(input_config.activity_interval_ms()));
	let borrowed_fd = unsafe { BorrowedFd::borrow_raw(input.as_raw_fd()) };
	let pollfd = PollFd::new(borrowed_fd, PollFlags::POLLIN);
	while poll(&mut [pollfd.clone()], None::<u8>).is_ok() {
		dispatch(&mut input, &mut throttle, &iface_ref);
	}

	Ok(())
}

fn dispatch(
	input: &mut Libinput,
	throttle: &mut ActivityThrottle,
	iface_ref: &InterfaceRef<DbusServer>,
) {
	if let Err(error) = input.dispatch() {
		warn!("libinput dispatch failed: {}", error);
		return;
	}
	for event in input.into_iter() {
		if is_user_input(&event) && throttle.ready(Instant::now()) {
			task::spawn(emit_activity(iface_ref.clone()));
		}

		let Event::Keyboard(KeyboardEvent::Key(event)) = event else {
			continue;
		};
		if event.key_state() != KeyState::Pressed {
			continue;
		}
		if let Some(key) = backlight_key(event.key()) {
			debug!("Keyboard backlight key {:?}", key);
			task::spawn(emit_key(key, iface_ref.clone()));
		}
	}
}

async fn emit_key(key: EV_KEY, iface_ref: InterfaceRef<DbusServer>) {
	if let Err(error) = DbusServer::key_pressed(iface_ref.signal_emitter(), key as u16).await {
		error!("Signal Error: {}", error)
	}
}

async fn emit_activity(iface_ref: InterfaceRef<DbusServer>) {
	if let Err(error) = DbusServer::activity(iface_ref.signal_emitter()).await {
		error!("Signal Error: {}", error)
	}
}
