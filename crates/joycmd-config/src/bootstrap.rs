//! First-run creation of a default configuration file

use std::path::Path;

use crate::error::ConfigError;

/// Location used when no `--config` is given
pub const DEFAULT_CONFIG_PATH: &str = "/etc/joycmd/joycmd.kdl";

/// Contents written to a freshly created configuration file
pub const DEFAULT_CONFIG: &str = r#"// joycmd configuration file
//
// Each `combo` maps a set of joystick buttons to a shell command. The command
// runs once each time the whole set is held down together.
//
//     combo <button> <button> ... "<command>"
//
// Button numbers are the ones reported by the kernel joystick driver
// (`joycmdctl devices` lists attached joysticks). Negative numbers are
// wildcards and are ignored.
//
// Devices are matched by name, ignoring case. Devices without a section of
// their own use the "default" section.

global {
    log-level "info"
    scan-interval-ms 2000
    poll-timeout-ms 500
    dispatch "queued"
}

device "default" {
    // combo 9 10 "killsteam"
    // combo 0 1 2 "notify-send 'secret combo'"
}
"#;

/// Create the configuration file (and its directory) if it does not exist.
///
/// Returns `Ok(true)` when a new file was written and `Ok(false)` when one was
/// already present. An existing file is never touched.
pub fn ensure_config_exists(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, DEFAULT_CONFIG)?;

    Ok(true)
}
