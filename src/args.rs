use clap::Parser;
use std::path::PathBuf;

use crate::config::user::BackendKind;

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help(false))]
pub struct ArgsServer {
	/// Use a custom config file instead of looking for one.
	#[arg(long, value_name = "Config File Path")]
	pub config: Option<PathBuf>,

	/// Keyboard backlight backend, overrides the config file
	#[arg(long, value_enum, value_name = "auto|upower|sysfs")]
	pub backend: Option<BackendKind>,

	/// LED class device used by the sysfs backend, overrides the config file
	#[arg(long, value_name = "LED class name (/sys/class/leds/NAME)")]
	pub device: Option<String>,

	/// Use a custom settings file for the persisted brightness preferences
	#[arg(long, value_name = "Settings File Path")]
	pub settings: Option<PathBuf>,

	/// Log debug messages
	#[arg(long, short, default_value_t = false)]
	pub verbose: bool,
}

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct ArgsClient {
	/// Raise the keyboard backlight by one step, like the hardware key
	#[arg(long, default_value_t = false, conflicts_with = "lower")]
	pub raise: bool,

	/// Lower the keyboard backlight by one step, like the hardware key
	#[arg(long, default_value_t = false)]
	pub lower: bool,

	/// Change a persisted preference.
	/// Keys: level-on-ac, level-on-battery, dim-level-on-ac, dim-level-on-battery,
	/// timeout-on-ac, timeout-on-battery (seconds, 9 disables)
	#[arg(long, value_name = "key=value")]
	pub set: Vec<String>,
}
