//! Configuration data model

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

/// Name of the section used by devices without a section of their own
pub const DEFAULT_SECTION: &str = "default";

/// Root configuration structure
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub global: GlobalConfig,
    /// Device sections in file order
    pub devices: Vec<DeviceSection>,
}

/// Global settings
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    pub log_level: LogLevel,
    /// Candidate device paths are `<device_prefix><n>`
    pub device_prefix: String,
    /// Number of candidate device paths probed on each scan
    pub max_devices: u32,
    pub scan_interval: Duration,
    pub poll_timeout: Duration,
    pub dispatch: DispatchMode,
    /// Command interpreter used to run combo commands (`<shell> -c <command>`)
    pub shell: PathBuf,
    /// How long shutdown waits for running commands
    pub shutdown_grace: Duration,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            device_prefix: "/dev/input/js".to_string(),
            max_devices: 32,
            scan_interval: Duration::from_millis(2000),
            poll_timeout: Duration::from_millis(500),
            dispatch: DispatchMode::Queued,
            shell: PathBuf::from("/bin/sh"),
            shutdown_grace: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown log level: {}", s)),
        }
    }
}

/// How fired combos run their commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    /// Commands are handed to a background worker; the event loop never waits
    #[default]
    Queued,
    /// Commands run to completion on the event loop before it continues
    Blocking,
}

impl std::str::FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" | "async" => Ok(Self::Queued),
            "blocking" | "sync" => Ok(Self::Blocking),
            _ => Err(format!("Unknown dispatch mode: {}", s)),
        }
    }
}

/// Combos for devices whose name matches `name`
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSection {
    pub name: String,
    pub combos: Vec<ComboDef>,
}

/// A single chord definition as written in the configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComboDef {
    /// Button indices in file order; negative entries are wildcards
    pub buttons: Vec<i64>,
    pub command: String,
}

/// How a device name was resolved to a section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionMatch {
    /// A section carries the device's name
    Exact,
    /// No named section, the default section applies
    Default,
    /// Neither a named nor a default section exists
    None,
}

impl Config {
    /// Find a section by name, ignoring case.
    ///
    /// Matching is exact apart from case: "Pad" never matches "Pad Pro".
    pub fn section(&self, name: &str) -> Option<&DeviceSection> {
        let wanted = name.to_lowercase();
        self.devices
            .iter()
            .find(|section| section.name.to_lowercase() == wanted)
    }

    /// Resolve the section that applies to a device with the given name.
    pub fn resolve(&self, device_name: &str) -> (SectionMatch, Option<&DeviceSection>) {
        if let Some(section) = self.section(device_name) {
            return (SectionMatch::Exact, Some(section));
        }
        match self.section(DEFAULT_SECTION) {
            Some(section) => (SectionMatch::Default, Some(section)),
            None => (SectionMatch::None, None),
        }
    }

    /// The combo table for a device, in load order.
    pub fn combos_for(&self, device_name: &str) -> &[ComboDef] {
        match self.resolve(device_name) {
            (_, Some(section)) => &section.combos,
            (_, None) => &[],
        }
    }

    /// Total number of combos across all sections
    pub fn combo_count(&self) -> usize {
        self.devices.iter().map(|section| section.combos.len()).sum()
    }
}
