//! Keyboard backlight controller.
//!
//! Steps the level on button presses, dims after the idle alarm of the active
//! power state fires and restores on the next activity, and keeps one level
//! preference per power state.

use log::{debug, error, info, warn};
use std::time::Duration;

use crate::brightness_backend::BrightnessBackend;
use crate::events::{Alarm, ButtonKey, Event, PowerState};
use crate::idle::IdleTimer;
use crate::notify::Notifier;
use crate::settings::{Property, SettingsStore};
use crate::upower::PowerSource;

pub const MIN_LEVEL: i32 = 0;

/// Timeout value (seconds) that disables an idle alarm.
pub const TIMEOUT_DISABLED: u32 = 9;

const DEFAULT_DIM_LEVEL: u32 = 0;

pub fn calculate_step(max_level: i32) -> i32 {
	if max_level < 20 {
		1
	} else {
		max_level / 20
	}
}

pub struct BacklightController {
	/// `None` once the probe failed, the controller is inert from then on.
	backend: Option<Box<dyn BrightnessBackend>>,
	settings: Box<dyn SettingsStore>,
	idle: Box<dyn IdleTimer>,
	notifier: Box<dyn Notifier>,

	max_level: i32,
	step: i32,
	on_battery: bool,
	dimmed: bool,
	/// Set by a button press, keeps the next idle reset from restoring.
	block_restore: bool,
	last_level: i32,
}

impl BacklightController {
	pub fn new(
		backend: Option<Box<dyn BrightnessBackend>>,
		power: &dyn PowerSource,
		settings: Box<dyn SettingsStore>,
		idle: Box<dyn IdleTimer>,
		notifier: Box<dyn Notifier>,
	) -> Self {
		let mut controller = Self {
			backend,
			settings,
			idle,
			notifier,
			max_level: 0,
			step: 1,
			on_battery: false,
			dimmed: false,
			block_restore: false,
			last_level: 0,
		};

		let Some(backend) = controller.backend.as_mut() else {
			warn!("No keyboard backlight backend available");
			return controller;
		};
		match backend.get_max() {
			Ok(max_level) if max_level > 0 => controller.max_level = max_level,
			Ok(_) => {
				warn!("Keyboard backlight reports a maximum level of 0");
				controller.backend = None;
				return controller;
			}
			Err(error) => {
				warn!("Failed to get keyboard max brightness level: {:#}", error);
				controller.backend = None;
				return controller;
			}
		}

		controller.step = calculate_step(controller.max_level);
		controller.on_battery = power.on_battery();
		info!(
			"Keyboard backlight: max level {}, step {}, on battery: {}",
			controller.max_level, controller.step, controller.on_battery
		);

		controller.set_timeouts();
		controller.apply_preferences();
		if let Some(level) = controller.get_level() {
			controller.last_level = level;
		}
		controller
	}

	pub fn has_hardware(&self) -> bool {
		self.backend.is_some() && self.max_level > 0
	}

	pub fn max_level(&self) -> i32 {
		self.max_level
	}

	pub fn handle_event(&mut self, event: Event) {
		if !self.has_hardware() {
			return;
		}
		debug!("Handling {:?}", event);
		match event {
			Event::Button(key) => self.button_pressed(key),
			Event::AlarmExpired(alarm) => self.alarm_expired(alarm),
			Event::IdleReset => self.idle_reset(),
			Event::OnBatteryChanged(on_battery) => self.on_battery_changed(on_battery),
			Event::SetProperty(property, value) => self.set_property(property, value),
			Event::SettingsFileChanged => {
				for property in self.settings.reload() {
					self.property_changed(property);
				}
			}
		}
	}

	fn power_state(&self) -> PowerState {
		PowerState::from_on_battery(self.on_battery)
	}

	fn get_level(&mut self) -> Option<i32> {
		let backend = self.backend.as_mut()?;
		match backend.get_current() {
			Ok(level) => Some(level),
			Err(error) => {
				warn!("Failed to get keyboard brightness level: {:#}", error);
				None
			}
		}
	}

	fn set_level(&mut self, level: i32) -> bool {
		let Some(backend) = self.backend.as_mut() else {
			return false;
		};
		match backend.set(level) {
			Ok(()) => true,
			Err(error) => {
				warn!("Failed to set keyboard brightness level: {:#}", error);
				false
			}
		}
	}

	/// Stored level preference, clamped into the hardware range.
	fn read_level(&self, property: Property) -> Option<i32> {
		let value = self.settings.get(property)?;
		Some(i32::try_from(value).unwrap_or(i32::MAX).clamp(MIN_LEVEL, self.max_level))
	}

	fn set_level_from_input(&mut self, level: i32) {
		if !self.set_level(level) {
			return;
		}

		let percent = 100.0 * level as f32 / self.max_level as f32;
		self.notifier.show_percent(percent);

		let property = Property::level(self.power_state());
		// Levels written here are always within 0..=max_level
		if let Err(error) = self.settings.set(property, level as u32) {
			error!("Cannot set value for property {}: {:#}", property, error);
		}
	}

	fn step_up(&mut self) {
		let Some(level) = self.get_level() else {
			return;
		};
		if level == self.max_level {
			return;
		}
		let level = (level + self.step).min(self.max_level);
		self.set_level_from_input(level);
	}

	fn step_down(&mut self) {
		let Some(level) = self.get_level() else {
			return;
		};
		if level == MIN_LEVEL {
			return;
		}
		let level = (level - self.step).max(MIN_LEVEL);
		self.set_level_from_input(level);
	}

	fn button_pressed(&mut self, key: ButtonKey) {
		match key {
			ButtonKey::KbdBrightnessUp => {
				self.block_restore = true;
				self.step_up();
			}
			ButtonKey::KbdBrightnessDown => {
				self.block_restore = true;
				self.step_down();
			}
			ButtonKey::KbdBrightnessToggle => (),
		}
	}

	fn dim_brightness(&mut self) {
		let dim_level = self
			.read_level(Property::dim_level(self.power_state()))
			.unwrap_or(DEFAULT_DIM_LEVEL as i32);

		let Some(level) = self.get_level() else {
			warn!("Unable to get current keyboard brightness level");
			return;
		};
		self.last_level = level;

		// Only reduce if the current level is brighter than the dim level
		if self.last_level > dim_level {
			debug!(
				"Current keyboard brightness level before dimming: {}, new {}",
				self.last_level, dim_level
			);
			self.dimmed = self.set_level(dim_level);
		}
	}

	fn alarm_expired(&mut self, alarm: Alarm) {
		self.block_restore = false;

		// last_level must keep the level from before the first dim
		if self.dimmed {
			return;
		}
		if alarm.power_state() == self.power_state() {
			self.dim_brightness();
		}
	}

	fn idle_reset(&mut self) {
		if !self.dimmed {
			return;
		}
		if !self.block_restore {
			debug!("Alarm reset, setting level to {}", self.last_level);
			self.set_level(self.last_level);
		}
		self.dimmed = false;
	}

	/// Writes the level preference of `state` if it is the active, undimmed one.
	fn apply_level_preference(&mut self, state: PowerState) {
		let Some(level) = self.read_level(Property::level(state)) else {
			return;
		};
		if self.power_state() == state && !self.dimmed {
			self.set_level(level);
		}
	}

	fn apply_preferences(&mut self) {
		self.apply_level_preference(PowerState::Battery);
		self.apply_level_preference(PowerState::Ac);
	}

	fn on_battery_changed(&mut self, on_battery: bool) {
		self.on_battery = on_battery;
		self.apply_preferences();
	}

	fn set_timeout(&mut self, state: PowerState) {
		let alarm = Alarm::for_power_state(state);
		let timeout = self
			.settings
			.get(Property::timeout(state))
			.unwrap_or(TIMEOUT_DISABLED);
		debug!("Alarm {:?} timeout changed {}", alarm, timeout);

		if timeout == TIMEOUT_DISABLED || timeout == 0 {
			self.idle.disarm(alarm);
		} else {
			let timeout = Duration::from_millis(u64::from(timeout) * 1000);
			self.idle.arm(alarm, timeout);
		}
	}

	fn set_timeouts(&mut self) {
		self.set_timeout(PowerState::Ac);
		self.set_timeout(PowerState::Battery);
	}

	fn property_changed(&mut self, property: Property) {
		match property {
			Property::LevelOnAc => self.apply_level_preference(PowerState::Ac),
			Property::LevelOnBattery => self.apply_level_preference(PowerState::Battery),
			Property::TimeoutOnAc => self.set_timeout(PowerState::Ac),
			Property::TimeoutOnBattery => self.set_timeout(PowerState::Battery),
			// Read when the next alarm fires
			Property::DimLevelOnAc | Property::DimLevelOnBattery => (),
		}
	}

	fn set_property(&mut self, property: Property, value: u32) {
		if self.settings.get(property) == Some(value) {
			return;
		}
		if let Err(error) = self.settings.set(property, value) {
			error!("Cannot set value for property {}: {:#}", property, error);
		}
		self.property_changed(property);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use anyhow::bail;
	use std::cell::RefCell;
	use std::collections::HashMap;
	use std::rc::Rc;

	#[derive(Default)]
	struct Hardware {
		max: i32,
		level: i32,
		fail_get: bool,
		fail_set: bool,
		writes: Vec<i32>,
	}

	#[derive(Clone)]
	struct MockBackend(Rc<RefCell<Hardware>>);

	impl BrightnessBackend for MockBackend {
		fn get_max(&mut self) -> anyhow::Result<i32> {
			Ok(self.0.borrow().max)
		}

		fn get_current(&mut self) -> anyhow::Result<i32> {
			let hw = self.0.borrow();
			if hw.fail_get {
				bail!("GetBrightness failed");
			}
			Ok(hw.level)
		}

		fn set(&mut self, val: i32) -> anyhow::Result<()> {
			let mut hw = self.0.borrow_mut();
			if hw.fail_set {
				bail!("SetBrightness failed");
			}
			hw.level = val;
			hw.writes.push(val);
			Ok(())
		}
	}

	#[derive(Clone, Default)]
	struct MockSettings(Rc<RefCell<HashMap<Property, u32>>>);

	impl SettingsStore for MockSettings {
		fn get(&self, property: Property) -> Option<u32> {
			self.0.borrow().get(&property).copied()
		}

		fn set(&mut self, property: Property, value: u32) -> anyhow::Result<()> {
			self.0.borrow_mut().insert(property, value);
			Ok(())
		}

		fn reload(&mut self) -> Vec<Property> {
			Vec::new()
		}
	}

	#[derive(Clone, Default)]
	struct MockIdle(Rc<RefCell<HashMap<Alarm, Duration>>>);

	impl IdleTimer for MockIdle {
		fn arm(&mut self, alarm: Alarm, timeout: Duration) {
			self.0.borrow_mut().insert(alarm, timeout);
		}

		fn disarm(&mut self, alarm: Alarm) {
			self.0.borrow_mut().remove(&alarm);
		}
	}

	#[derive(Clone, Default)]
	struct MockNotifier(Rc<RefCell<Vec<f32>>>);

	impl Notifier for MockNotifier {
		fn show_percent(&mut self, percent: f32) {
			self.0.borrow_mut().push(percent);
		}
	}

	struct FixedPower(bool);

	impl PowerSource for FixedPower {
		fn on_battery(&self) -> bool {
			self.0
		}
	}

	struct Fixture {
		hw: Rc<RefCell<Hardware>>,
		settings: MockSettings,
		idle: MockIdle,
		notifications: MockNotifier,
		controller: BacklightController,
	}

	impl Fixture {
		fn new(max: i32, level: i32, on_battery: bool, settings: &[(Property, u32)]) -> Self {
			let hw = Rc::new(RefCell::new(Hardware {
				max,
				level,
				..Default::default()
			}));
			let store = MockSettings::default();
			store.0.borrow_mut().extend(settings.iter().copied());
			let idle = MockIdle::default();
			let notifications = MockNotifier::default();
			let controller = BacklightController::new(
				Some(Box::new(MockBackend(hw.clone()))),
				&FixedPower(on_battery),
				Box::new(store.clone()),
				Box::new(idle.clone()),
				Box::new(notifications.clone()),
			);
			hw.borrow_mut().writes.clear();
			Self {
				hw,
				settings: store,
				idle,
				notifications,
				controller,
			}
		}

		fn writes(&self) -> Vec<i32> {
			self.hw.borrow().writes.clone()
		}

		fn level(&self) -> i32 {
			self.hw.borrow().level
		}

		fn setting(&self, property: Property) -> Option<u32> {
			self.settings.get(property)
		}
	}

	#[test]
	fn step_is_a_twentieth_of_max_but_at_least_one() {
		for max in 0..20 {
			assert_eq!(calculate_step(max), 1);
		}
		assert_eq!(calculate_step(20), 1);
		assert_eq!(calculate_step(39), 1);
		assert_eq!(calculate_step(40), 2);
		assert_eq!(calculate_step(100), 5);
		assert_eq!(calculate_step(255), 12);
	}

	#[test]
	fn zero_max_level_leaves_controller_inert() {
		let mut fx = Fixture::new(0, 0, false, &[(Property::TimeoutOnAc, 30)]);
		assert!(!fx.controller.has_hardware());
		assert_eq!(fx.controller.max_level(), 0);
		assert!(fx.idle.0.borrow().is_empty());

		fx.controller.handle_event(Event::Button(ButtonKey::KbdBrightnessUp));
		fx.controller.handle_event(Event::OnBatteryChanged(true));
		assert!(fx.writes().is_empty());
		assert!(fx.notifications.0.borrow().is_empty());
	}

	#[test]
	fn missing_backend_leaves_controller_inert() {
		let controller = BacklightController::new(
			None,
			&FixedPower(false),
			Box::new(MockSettings::default()),
			Box::new(MockIdle::default()),
			Box::new(MockNotifier::default()),
		);
		assert!(!controller.has_hardware());
	}

	#[test]
	fn startup_arms_timeouts_applies_preference_and_snapshots_level() {
		let hw = Rc::new(RefCell::new(Hardware {
			max: 3,
			level: 1,
			..Default::default()
		}));
		let store = MockSettings::default();
		store.0.borrow_mut().extend([
			(Property::LevelOnAc, 2),
			(Property::LevelOnBattery, 1),
			(Property::TimeoutOnAc, 30),
			(Property::TimeoutOnBattery, TIMEOUT_DISABLED),
		]);
		let idle = MockIdle::default();
		let controller = BacklightController::new(
			Some(Box::new(MockBackend(hw.clone()))),
			&FixedPower(false),
			Box::new(store),
			Box::new(idle.clone()),
			Box::new(MockNotifier::default()),
		);

		assert!(controller.has_hardware());
		assert_eq!(controller.max_level(), 3);
		assert_eq!(hw.borrow().writes, vec![2]);
		assert_eq!(controller.last_level, 2);
		assert_eq!(
			*idle.0.borrow(),
			HashMap::from([(Alarm::DimOnAc, Duration::from_millis(30_000))])
		);
	}

	#[test]
	fn button_up_steps_notifies_and_persists() {
		let mut fx = Fixture::new(100, 50, false, &[]);
		fx.controller.handle_event(Event::Button(ButtonKey::KbdBrightnessUp));

		assert_eq!(fx.writes(), vec![55]);
		assert_eq!(*fx.notifications.0.borrow(), vec![55.0]);
		assert_eq!(fx.setting(Property::LevelOnAc), Some(55));
		assert_eq!(fx.setting(Property::LevelOnBattery), None);
		assert!(fx.controller.block_restore);
	}

	#[test]
	fn button_down_persists_battery_preference_on_battery() {
		let mut fx = Fixture::new(100, 50, true, &[]);
		fx.controller.handle_event(Event::Button(ButtonKey::KbdBrightnessDown));

		assert_eq!(fx.writes(), vec![45]);
		assert_eq!(fx.setting(Property::LevelOnBattery), Some(45));
		assert_eq!(fx.setting(Property::LevelOnAc), None);
	}

	#[test]
	fn step_up_clamps_at_max_and_is_idempotent_there() {
		let mut fx = Fixture::new(100, 98, false, &[]);
		fx.controller.handle_event(Event::Button(ButtonKey::KbdBrightnessUp));
		assert_eq!(fx.level(), 100);

		fx.controller.handle_event(Event::Button(ButtonKey::KbdBrightnessUp));
		assert_eq!(fx.writes(), vec![100]);
		assert_eq!(fx.notifications.0.borrow().len(), 1);
	}

	#[test]
	fn step_down_floors_at_zero_and_stops_there() {
		let mut fx = Fixture::new(3, 1, false, &[]);
		for _ in 0..3 {
			fx.controller.handle_event(Event::Button(ButtonKey::KbdBrightnessDown));
		}
		assert_eq!(fx.writes(), vec![0]);
		assert_eq!(fx.level(), MIN_LEVEL);
	}

	#[test]
	fn failed_read_aborts_step() {
		let mut fx = Fixture::new(100, 50, false, &[]);
		fx.hw.borrow_mut().fail_get = true;
		fx.controller.handle_event(Event::Button(ButtonKey::KbdBrightnessUp));
		assert!(fx.writes().is_empty());
		assert!(fx.notifications.0.borrow().is_empty());
		// The press still counts as a manual override
		assert!(fx.controller.block_restore);
	}

	#[test]
	fn failed_write_skips_notification_and_persistence() {
		let mut fx = Fixture::new(100, 50, false, &[]);
		fx.hw.borrow_mut().fail_set = true;
		fx.controller.handle_event(Event::Button(ButtonKey::KbdBrightnessUp));
		assert_eq!(fx.level(), 50);
		assert!(fx.notifications.0.borrow().is_empty());
		assert_eq!(fx.setting(Property::LevelOnAc), None);
	}

	#[test]
	fn toggle_key_is_ignored() {
		let mut fx = Fixture::new(100, 50, false, &[]);
		fx.controller.handle_event(Event::Button(ButtonKey::KbdBrightnessToggle));
		assert!(fx.writes().is_empty());
		assert!(!fx.controller.block_restore);
	}

	#[test]
	fn alarm_dims_to_dim_level() {
		let mut fx = Fixture::new(100, 80, false, &[(Property::DimLevelOnAc, 30)]);
		fx.controller.handle_event(Event::AlarmExpired(Alarm::DimOnAc));

		assert_eq!(fx.writes(), vec![30]);
		assert!(fx.controller.dimmed);
		assert_eq!(fx.controller.last_level, 80);
		assert!(fx.notifications.0.borrow().is_empty());
	}

	#[test]
	fn alarm_never_raises_brightness() {
		let mut fx = Fixture::new(100, 20, false, &[(Property::DimLevelOnAc, 30)]);
		fx.controller.handle_event(Event::AlarmExpired(Alarm::DimOnAc));

		assert!(fx.writes().is_empty());
		assert!(!fx.controller.dimmed);
	}

	#[test]
	fn alarm_of_inactive_power_state_only_clears_block() {
		let mut fx = Fixture::new(100, 80, true, &[(Property::DimLevelOnAc, 30)]);
		fx.controller.block_restore = true;
		fx.controller.handle_event(Event::AlarmExpired(Alarm::DimOnAc));

		assert!(fx.writes().is_empty());
		assert!(!fx.controller.dimmed);
		assert!(!fx.controller.block_restore);
	}

	#[test]
	fn failed_dim_write_stays_active() {
		let mut fx = Fixture::new(100, 80, false, &[(Property::DimLevelOnAc, 30)]);
		fx.hw.borrow_mut().fail_set = true;
		fx.controller.handle_event(Event::AlarmExpired(Alarm::DimOnAc));
		assert!(!fx.controller.dimmed);

		fx.hw.borrow_mut().fail_set = false;
		fx.controller.handle_event(Event::IdleReset);
		assert!(fx.writes().is_empty());
	}

	#[test]
	fn reset_restores_level_from_before_dimming() {
		let mut fx = Fixture::new(100, 80, true, &[(Property::DimLevelOnBattery, 30)]);
		fx.controller.handle_event(Event::AlarmExpired(Alarm::DimOnBattery));
		fx.controller.handle_event(Event::IdleReset);

		assert_eq!(fx.writes(), vec![30, 80]);
		assert!(!fx.controller.dimmed);
	}

	#[test]
	fn button_press_while_dimmed_suppresses_restore() {
		let mut fx = Fixture::new(100, 80, false, &[(Property::DimLevelOnAc, 30)]);
		fx.controller.handle_event(Event::AlarmExpired(Alarm::DimOnAc));
		fx.controller.handle_event(Event::Button(ButtonKey::KbdBrightnessUp));
		assert!(fx.controller.block_restore);

		fx.controller.handle_event(Event::IdleReset);
		assert_eq!(fx.writes(), vec![30, 35]);
		assert!(!fx.controller.dimmed);
	}

	#[test]
	fn reset_without_dimming_is_a_no_op() {
		let mut fx = Fixture::new(100, 80, false, &[]);
		fx.controller.handle_event(Event::IdleReset);
		assert!(fx.writes().is_empty());
	}

	#[test]
	fn power_flip_applies_other_preference() {
		let mut fx = Fixture::new(
			100,
			70,
			false,
			&[(Property::LevelOnAc, 70), (Property::LevelOnBattery, 20)],
		);
		fx.controller.handle_event(Event::OnBatteryChanged(true));
		assert_eq!(fx.writes(), vec![20]);

		fx.controller.handle_event(Event::OnBatteryChanged(false));
		assert_eq!(fx.writes(), vec![20, 70]);
	}

	#[test]
	fn power_flip_while_dimmed_keeps_dim_level() {
		let mut fx = Fixture::new(
			100,
			70,
			false,
			&[(Property::LevelOnBattery, 20), (Property::DimLevelOnAc, 10)],
		);
		fx.controller.handle_event(Event::AlarmExpired(Alarm::DimOnAc));
		fx.controller.handle_event(Event::OnBatteryChanged(true));
		assert_eq!(fx.writes(), vec![10]);
	}

	#[test]
	fn level_preference_change_applies_only_to_active_state() {
		let mut fx = Fixture::new(100, 50, false, &[]);
		fx.controller.handle_event(Event::SetProperty(Property::LevelOnBattery, 10));
		assert!(fx.writes().is_empty());
		assert_eq!(fx.setting(Property::LevelOnBattery), Some(10));

		fx.controller.handle_event(Event::SetProperty(Property::LevelOnAc, 60));
		assert_eq!(fx.writes(), vec![60]);
	}

	#[test]
	fn preferences_are_clamped_to_hardware_range() {
		let fx = Fixture::new(3, 0, false, &[(Property::LevelOnAc, 100)]);
		assert_eq!(fx.level(), 3);
		assert_eq!(fx.controller.read_level(Property::LevelOnAc), Some(3));
	}

	#[test]
	fn timeout_changes_rearm_or_disarm_alarms() {
		let mut fx = Fixture::new(100, 50, false, &[(Property::TimeoutOnBattery, 60)]);
		assert_eq!(
			fx.idle.0.borrow().get(&Alarm::DimOnBattery),
			Some(&Duration::from_secs(60))
		);

		fx.controller.handle_event(Event::SetProperty(Property::TimeoutOnAc, 15));
		assert_eq!(
			fx.idle.0.borrow().get(&Alarm::DimOnAc),
			Some(&Duration::from_secs(15))
		);

		fx.controller.handle_event(Event::SetProperty(
			Property::TimeoutOnBattery,
			TIMEOUT_DISABLED,
		));
		assert_eq!(fx.idle.0.borrow().get(&Alarm::DimOnBattery), None);

		fx.controller.handle_event(Event::SetProperty(Property::TimeoutOnAc, 0));
		assert!(fx.idle.0.borrow().is_empty());
	}

	#[test]
	fn timeout_change_does_not_touch_dim_state() {
		let mut fx = Fixture::new(100, 80, false, &[(Property::DimLevelOnAc, 30)]);
		fx.controller.handle_event(Event::AlarmExpired(Alarm::DimOnAc));
		fx.controller.property_changed(Property::TimeoutOnAc);
		assert!(fx.controller.dimmed);
		assert_eq!(fx.writes(), vec![30]);
	}

	#[test]
	fn second_alarm_while_dimmed_keeps_restore_level() {
		let mut fx = Fixture::new(100, 80, false, &[(Property::DimLevelOnAc, 30)]);
		fx.controller.handle_event(Event::AlarmExpired(Alarm::DimOnAc));
		fx.controller.handle_event(Event::SetProperty(Property::TimeoutOnAc, 20));
		fx.controller.handle_event(Event::AlarmExpired(Alarm::DimOnAc));
		assert_eq!(fx.controller.last_level, 80);
		assert_eq!(fx.writes(), vec![30]);

		fx.controller.handle_event(Event::IdleReset);
		assert_eq!(fx.writes(), vec![30, 80]);
		assert_eq!(fx.level(), 80);
		assert!(!fx.controller.dimmed);
	}
}
