//! Idle alarms over an external activity feed.
//!
//! The watcher does not detect activity itself: input sources call
//! [`IdleHandle::notify_activity`]. Each armed alarm fires once per idle
//! period; the first activity after any alarm fired emits `IdleReset`.

use async_channel::{Receiver, Sender};
use async_std::future::timeout;
use async_std::task;
use log::{debug, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::events::{Alarm, Event};

pub trait IdleTimer {
	/// (Re)arms `alarm` to fire after `timeout` without activity.
	fn arm(&mut self, alarm: Alarm, timeout: Duration);
	fn disarm(&mut self, alarm: Alarm);
}

#[derive(Debug, PartialEq, Eq)]
enum IdleCommand {
	Arm(Alarm, Duration),
	Disarm(Alarm),
	Activity,
}

#[derive(Clone, Copy, Debug)]
struct ArmedAlarm {
	timeout: Duration,
	fired: bool,
}

#[derive(Debug)]
struct IdleState {
	alarms: HashMap<Alarm, ArmedAlarm>,
	last_activity: Instant,
}

impl IdleState {
	fn new(now: Instant) -> Self {
		Self {
			alarms: HashMap::new(),
			last_activity: now,
		}
	}

	/// A new timeout takes effect from the next idle period if the alarm
	/// already fired in this one.
	fn arm(&mut self, alarm: Alarm, timeout: Duration) {
		let fired = self.alarms.get(&alarm).is_some_and(|armed| armed.fired);
		self.alarms.insert(alarm, ArmedAlarm { timeout, fired });
	}

	fn disarm(&mut self, alarm: Alarm) {
		self.alarms.remove(&alarm);
	}

	/// Returns true when this activity ends an idle period that fired an alarm.
	fn activity(&mut self, now: Instant) -> bool {
		self.last_activity = now;
		let mut reset = false;
		for armed in self.alarms.values_mut() {
			reset |= armed.fired;
			armed.fired = false;
		}
		reset
	}

	fn next_deadline(&self) -> Option<Instant> {
		self.alarms
			.values()
			.filter(|armed| !armed.fired)
			.map(|armed| self.last_activity + armed.timeout)
			.min()
	}

	fn expire(&mut self, now: Instant) -> Vec<Alarm> {
		let mut expired = Vec::new();
		for (alarm, armed) in self.alarms.iter_mut() {
			if !armed.fired && self.last_activity + armed.timeout <= now {
				armed.fired = true;
				expired.push(*alarm);
			}
		}
		expired
	}
}

/// Cheap handle to the watcher task.
#[derive(Clone)]
pub struct IdleHandle {
	commands: Sender<IdleCommand>,
}

impl IdleHandle {
	pub async fn notify_activity(&self) {
		if let Err(error) = self.commands.send(IdleCommand::Activity).await {
			warn!("Idle watcher is gone: {}", error);
		}
	}

	fn command(&self, command: IdleCommand) {
		// Unbounded, only fails once the watcher stopped
		if let Err(error) = self.commands.try_send(command) {
			warn!("Idle watcher is gone: {}", error);
		}
	}
}

impl IdleTimer for IdleHandle {
	fn arm(&mut self, alarm: Alarm, timeout: Duration) {
		self.command(IdleCommand::Arm(alarm, timeout));
	}

	fn disarm(&mut self, alarm: Alarm) {
		self.command(IdleCommand::Disarm(alarm));
	}
}

/// Starts the watcher, which sends `AlarmExpired`/`IdleReset` into `events`.
pub fn spawn(events: Sender<Event>) -> IdleHandle {
	let (commands, receiver) = async_channel::unbounded::<IdleCommand>();
	task::spawn(run(receiver, events));
	IdleHandle { commands }
}

async fn run(commands: Receiver<IdleCommand>, events: Sender<Event>) {
	let mut state = IdleState::new(Instant::now());
	loop {
		let command = match state.next_deadline() {
			Some(deadline) => {
				let wait = deadline.saturating_duration_since(Instant::now());
				match timeout(wait, commands.recv()).await {
					Ok(command) => command,
					Err(_) => {
						for alarm in state.expire(Instant::now()) {
							debug!("Idle alarm {:?} expired", alarm);
							if events.send(Event::AlarmExpired(alarm)).await.is_err() {
								return;
							}
						}
						continue;
					}
				}
			}
			None => commands.recv().await,
		};

		let Ok(command) = command else {
			// Every handle was dropped
			return;
		};
		match command {
			IdleCommand::Arm(alarm, timeout) => {
				debug!("Arming idle alarm {:?} for {:?}", alarm, timeout);
				state.arm(alarm, timeout);
			}
			IdleCommand::Disarm(alarm) => {
				debug!("Removing idle alarm {:?}", alarm);
				state.disarm(alarm);
			}
			IdleCommand::Activity => {
				if state.activity(Instant::now()) && events.send(Event::IdleReset).await.is_err() {
					return;
				}
			}
		}
	}
}
