//! Button combos and the edge-triggered firing rule
//!
//! A combo fires when its buttons go from "not all held" to "all held" and
//! then stays quiet until one of them is let go:
//!
//! ```text
//!              all required buttons pressed
//!   ┌────────┐ ─────────────────────────────► ┌────────┐
//!   │ IDLE   │        (dispatch once)         │ ACTIVE │ ◄─┐ more events while
//!   └────────┘ ◄───────────────────────────── └────────┘ ──┘ the chord is held
//!              any required button released
//! ```
//!
//! Wildcard (negative) entries from the configuration never take part in the
//! all-pressed test.

use joycmd_config::ComboDef;
use thiserror::Error;

/// Why a configured combo cannot be used on a device
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComboError {
    #[error("no buttons besides wildcards")]
    NoButtons,

    #[error("button {button} is beyond the device's {button_count} buttons")]
    OutOfRange { button: usize, button_count: usize },
}

/// A chord bound to one device session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combo {
    /// Required buttons in configuration order, without duplicates or wildcards
    buttons: Vec<usize>,
    command: String,
    /// Set once fired, until one of `buttons` is released
    active: bool,
}

impl Combo {
    /// Build a combo for a device with `button_count` buttons.
    ///
    /// Fails when no real buttons remain after dropping wildcards or when an
    /// index is beyond the device's buttons.
    pub fn from_def(def: &ComboDef, button_count: usize) -> Result<Self, ComboError> {
        let mut buttons = Vec::with_capacity(def.buttons.len());
        for &button in &def.buttons {
            let Ok(index) = usize::try_from(button) else {
                continue;
            };
            if index >= button_count {
                return Err(ComboError::OutOfRange {
                    button: index,
                    button_count,
                });
            }
            if !buttons.contains(&index) {
                buttons.push(index);
            }
        }

        if buttons.is_empty() {
            return Err(ComboError::NoButtons);
        }

        Ok(Self {
            buttons,
            command: def.command.clone(),
            active: false,
        })
    }

    #[allow(dead_code)]
    pub fn buttons(&self) -> &[usize] {
        &self.buttons
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    #[allow(dead_code)]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether `index` is one of the required buttons
    pub fn involves(&self, index: usize) -> bool {
        self.buttons.contains(&index)
    }

    /// Whether every required button is pressed in `state`
    pub fn is_satisfied(&self, state: &[bool]) -> bool {
        self.buttons
            .iter()
            .all(|&index| state.get(index).copied().unwrap_or(false))
    }

    /// Apply the firing rule against the current button state.
    ///
    /// Returns `true` exactly when the combo fires.
    pub fn evaluate(&mut self, state: &[bool]) -> bool {
        match (self.is_satisfied(state), self.active) {
            (true, false) => {
                self.active = true;
                true
            }
            (false, true) => {
                self.active = false;
                false
            }
            _ => false,
        }
    }

    /// Mark the combo active if it is already held, without firing.
    ///
    /// Used for the initial state a device reports when opened, so a chord
    /// that is held while plugging in only fires after being pressed again.
    pub fn arm(&mut self, state: &[bool]) {
        self.active = self.is_satisfied(state);
    }
}

/// Build the combo table for one device, keeping load order.
///
/// Combos that reference buttons the device does not have are dropped.
pub fn build_table(defs: &[ComboDef], button_count: usize, device_name: &str) -> Vec<Combo> {
    defs.iter()
        .filter_map(|def| match Combo::from_def(def, button_count) {
            Ok(combo) => Some(combo),
            Err(e) => {
                tracing::warn!(
                    "Skipping combo {:?} -> '{}' for '{}': {}",
                    def.buttons,
                    def.command,
                    device_name,
                    e
                );
                None
            }
        })
        .collect()
}
