#![allow(dead_code)]

#[path = "config/backend.rs"]
pub mod backend;
#[path = "config/user.rs"]
pub mod user;

pub const DBUS_PATH: &str = "/org/kbdbacklightd";
pub const DBUS_INTERFACE: &str = "org.kbdbacklightd";
pub const DBUS_BACKEND_NAME: &str = "org.kbdbacklightd";
pub const DBUS_SERVER_NAME: &str = "org.kbdbacklightd-server";

pub const APPLICATION_NAME: &str = "kbd-backlightd";
