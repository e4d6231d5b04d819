//! Configuration parsing for joycmd
//!
//! This crate handles parsing the KDL configuration file that maps joystick
//! button combos to shell commands, and bootstrapping a default file on first
//! run. It also holds the joystick identification queries the daemon and the
//! CLI both need to resolve a device to its section.

mod bootstrap;
mod error;
pub mod joystick;
mod model;
mod parser;

pub use bootstrap::{ensure_config_exists, DEFAULT_CONFIG, DEFAULT_CONFIG_PATH};
pub use error::ConfigError;
pub use model::*;
pub use parser::{load_config, parse_config, parse_config_str};
