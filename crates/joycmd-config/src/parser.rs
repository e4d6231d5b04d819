//! KDL configuration parser

use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::model::*;

/// Parse a configuration file from the given path
pub fn parse_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config_str(&content)
}

/// Parse a configuration file, treating a missing file as an empty configuration.
///
/// Every other I/O or parse error is returned unchanged.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    match parse_config(path) {
        Err(ConfigError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                "Configuration file {} not found, running without combos",
                path.display()
            );
            Ok(Config::default())
        }
        other => other,
    }
}

/// Parse configuration from a string
pub fn parse_config_str(content: &str) -> Result<Config, ConfigError> {
    let doc: kdl::KdlDocument = content.parse().map_err(|e: kdl::KdlError| {
        // kdl carries its own miette version, so rebuild the span by hand
        let offset = e.span.offset();
        let len = e.span.len();
        let span = miette::SourceSpan::from((offset, len));
        ConfigError::ParseError {
            src: content.to_string(),
            span,
            source: e,
        }
    })?;

    let mut config = Config::default();

    for node in doc.nodes() {
        match node.name().value() {
            "global" => {
                config.global = parse_global(node)?;
            }
            "device" => {
                let Some(section) = parse_device(node) else {
                    continue;
                };
                if config.section(&section.name).is_some() {
                    tracing::warn!(
                        "Duplicate device section '{}' ignored, the first one wins",
                        section.name
                    );
                    continue;
                }
                config.devices.push(section);
            }
            name => {
                tracing::warn!("Unknown top-level node: {}", name);
            }
        }
    }

    Ok(config)
}

fn parse_global(node: &kdl::KdlNode) -> Result<GlobalConfig, ConfigError> {
    let mut global = GlobalConfig::default();

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let option = child.name().value();
            match option {
                "log-level" => {
                    global.log_level = string_option(child)?
                        .parse()
                        .map_err(|message| ConfigError::Invalid { message })?;
                }
                "device-prefix" => {
                    global.device_prefix = string_option(child)?.to_string();
                }
                "max-devices" => {
                    let value = positive_option(child)?;
                    global.max_devices = u32::try_from(value).map_err(|_| ConfigError::Invalid {
                        message: format!("max-devices is too large: {}", value),
                    })?;
                }
                "scan-interval-ms" => {
                    global.scan_interval = Duration::from_millis(positive_option(child)?);
                }
                "poll-timeout-ms" => {
                    global.poll_timeout = Duration::from_millis(positive_option(child)?);
                }
                "dispatch" => {
                    global.dispatch = string_option(child)?
                        .parse()
                        .map_err(|message| ConfigError::Invalid { message })?;
                }
                "shell" => {
                    global.shell = shellexpand::tilde(string_option(child)?).into_owned().into();
                }
                "shutdown-grace-ms" => {
                    global.shutdown_grace = Duration::from_millis(integer_option(child)?);
                }
                name => {
                    tracing::warn!("Unknown global config option: {}", name);
                }
            }
        }
    }

    Ok(global)
}

fn first_argument(node: &kdl::KdlNode) -> Result<&kdl::KdlValue, ConfigError> {
    node.entries()
        .iter()
        .find(|entry| entry.name().is_none())
        .map(|entry| entry.value())
        .ok_or_else(|| ConfigError::Invalid {
            message: format!("{} needs a value", node.name().value()),
        })
}

fn string_option(node: &kdl::KdlNode) -> Result<&str, ConfigError> {
    first_argument(node)?
        .as_string()
        .ok_or_else(|| ConfigError::Invalid {
            message: format!("{} must be a string", node.name().value()),
        })
}

fn integer_option(node: &kdl::KdlNode) -> Result<u64, ConfigError> {
    first_argument(node)?
        .as_i64()
        .and_then(|value| u64::try_from(value).ok())
        .ok_or_else(|| ConfigError::Invalid {
            message: format!("{} must be a non-negative integer", node.name().value()),
        })
}

fn positive_option(node: &kdl::KdlNode) -> Result<u64, ConfigError> {
    match integer_option(node)? {
        0 => Err(ConfigError::Invalid {
            message: format!("{} must be greater than zero", node.name().value()),
        }),
        value => Ok(value),
    }
}

/// Parse a `device "<name>" { ... }` node.
///
/// A device without a name is skipped rather than failing the whole file.
fn parse_device(node: &kdl::KdlNode) -> Option<DeviceSection> {
    let Some(name) = node
        .entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
    else {
        tracing::warn!("Device section without a name ignored (expected `device \"My Pad\" {{ ... }}`)");
        return None;
    };

    let mut section = DeviceSection {
        name,
        combos: Vec::new(),
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "combo" => {
                    if let Some(combo) = parse_combo(child, &section.name) {
                        section.combos.push(combo);
                    }
                }
                name => {
                    tracing::warn!("Unknown device config option: {}", name);
                }
            }
        }
    }

    Some(section)
}

/// Parse `combo <button>... "<command>"`.
///
/// Malformed entries are reported and skipped so later combos still load.
fn parse_combo(node: &kdl::KdlNode, device: &str) -> Option<ComboDef> {
    let mut buttons = Vec::new();
    let mut command: Option<String> = None;

    for entry in node.entries() {
        if let Some(property) = entry.name() {
            tracing::warn!(
                "Skipping combo in '{}': unexpected property '{}'",
                device,
                property.value()
            );
            return None;
        }

        let value = entry.value();
        if let Some(button) = value.as_i64() {
            if !buttons.contains(&button) {
                buttons.push(button);
            }
        } else if let Some(text) = value.as_string() {
            if command.is_some() {
                tracing::warn!("Skipping combo in '{}': more than one command", device);
                return None;
            }
            command = Some(text.trim().to_string());
        } else {
            tracing::warn!(
                "Skipping combo in '{}': '{}' is not a button number",
                device,
                value
            );
            return None;
        }
    }

    let command = match command {
        Some(command) if !command.is_empty() => command,
        _ => {
            tracing::warn!("Skipping combo in '{}': missing command", device);
            return None;
        }
    };

    if buttons.iter().all(|&button| button < 0) {
        tracing::warn!(
            "Skipping combo '{}' in '{}': no buttons besides wildcards",
            command,
            device
        );
        return None;
    }

    Some(ComboDef { buttons, command })
}
