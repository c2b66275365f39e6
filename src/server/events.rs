use evdev_rs::enums::{EV_KEY, int_to_ev_key};

use crate::settings::Property;

/// Power source a preference or idle alarm belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PowerState {
	Ac,
	Battery,
}

impl PowerState {
	pub fn from_on_battery(on_battery: bool) -> Self {
		if on_battery {
			PowerState::Battery
		} else {
			PowerState::Ac
		}
	}
}

/// Idle alarms armed with the idle watcher, one per power state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Alarm {
	DimOnAc,
	DimOnBattery,
}

impl Alarm {
	pub fn for_power_state(state: PowerState) -> Self {
		match state {
			PowerState::Ac => Alarm::DimOnAc,
			PowerState::Battery => Alarm::DimOnBattery,
		}
	}

	pub fn power_state(self) -> PowerState {
		match self {
			Alarm::DimOnAc => PowerState::Ac,
			Alarm::DimOnBattery => PowerState::Battery,
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonKey {
	KbdBrightnessUp,
	KbdBrightnessDown,
	KbdBrightnessToggle,
}

impl ButtonKey {
	/// Maps an evdev key code as sent by the libinput backend.
	pub fn from_key_code(key_code: u16) -> Option<Self> {
		match int_to_ev_key(key_code as u32) {
			Some(EV_KEY::KEY_KBDILLUMUP) => Some(ButtonKey::KbdBrightnessUp),
			Some(EV_KEY::KEY_KBDILLUMDOWN) => Some(ButtonKey::KbdBrightnessDown),
			Some(EV_KEY::KEY_KBDILLUMTOGGLE) => Some(ButtonKey::KbdBrightnessToggle),
			_ => None,
		}
	}
}

/// Everything the controller reacts to. Delivered in order through one queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
	Button(ButtonKey),
	AlarmExpired(Alarm),
	IdleReset,
	OnBatteryChanged(bool),
	/// A preference change requested over D-Bus, persisted by the controller.
	SetProperty(Property, u32),
	SettingsFileChanged,
}
