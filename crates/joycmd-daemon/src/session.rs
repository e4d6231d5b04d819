//! Per-device session state and the combo matcher

use std::fmt;
use std::path::{Path, PathBuf};

use crate::combo::Combo;
use crate::device::JsEvent;

/// Stable identifier of a device session.
///
/// Identifiers are never reused: a device that reappears at the same path
/// gets a new session with a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub(crate) u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Runtime record of one open device
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    path: PathBuf,
    name: String,
    /// Pressed state per button, indexed by button number
    buttons: Vec<bool>,
    combos: Vec<Combo>,
}

impl Session {
    pub fn new(
        id: SessionId,
        path: PathBuf,
        name: String,
        button_count: usize,
        combos: Vec<Combo>,
    ) -> Self {
        Self {
            id,
            path,
            name,
            buttons: vec![false; button_count],
            combos,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn button_count(&self) -> usize {
        self.buttons.len()
    }

    #[allow(dead_code)]
    pub fn is_pressed(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }

    pub fn combos(&self) -> &[Combo] {
        &self.combos
    }

    pub fn combo(&self, index: usize) -> &Combo {
        &self.combos[index]
    }

    /// Feed one joystick record into the session.
    ///
    /// Returns the indices (into [`Session::combos`]) of the combos that
    /// fired, in load order. Initial-state records update the button state and
    /// arm combos that are already held, but never fire anything.
    pub fn apply(&mut self, event: &JsEvent) -> Vec<usize> {
        match event.button() {
            Some((index, pressed)) if event.initial => {
                self.seed_button(index, pressed);
                Vec::new()
            }
            Some((index, pressed)) => self.on_button_event(index, pressed),
            None => Vec::new(),
        }
    }

    /// Record a button transition and run the firing rule for every combo
    /// that uses the button.
    ///
    /// Out-of-range indices are ignored.
    pub fn on_button_event(&mut self, index: usize, pressed: bool) -> Vec<usize> {
        let Some(slot) = self.buttons.get_mut(index) else {
            tracing::trace!(
                "Ignoring button {} on '{}' ({} buttons)",
                index,
                self.name,
                self.buttons.len()
            );
            return Vec::new();
        };
        *slot = pressed;

        let state = &self.buttons;
        self.combos
            .iter_mut()
            .enumerate()
            .filter(|(_, combo)| combo.involves(index))
            .filter_map(|(i, combo)| combo.evaluate(state).then_some(i))
            .collect()
    }

    fn seed_button(&mut self, index: usize, pressed: bool) {
        let Some(slot) = self.buttons.get_mut(index) else {
            return;
        };
        *slot = pressed;

        let state = &self.buttons;
        for combo in self.combos.iter_mut().filter(|combo| combo.involves(index)) {
            combo.arm(state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joycmd_config::ComboDef;

    fn session(combos: &[(&[i64], &str)]) -> Session {
        let combos = combos
            .iter()
            .map(|(buttons, command)| {
                Combo::from_def(
                    &ComboDef {
                        buttons: buttons.to_vec(),
                        command: command.to_string(),
                    },
                    12,
                )
                .unwrap()
            })
            .collect();
        Session::new(SessionId(1), PathBuf::from("/dev/input/js0"), "Pad1".to_string(), 12, combos)
    }

    #[test]
    fn test_press_hold_release_cycle() {
        // {9,10} -> "cmd-A": press 9, press 10, release 9, press 9
        let mut session = session(&[(&[9, 10], "cmd-A")]);

        assert!(session.apply(&JsEvent::press(9)).is_empty());
        assert_eq!(session.apply(&JsEvent::press(10)), vec![0]);
        assert_eq!(session.combo(0).command(), "cmd-A");

        assert!(session.apply(&JsEvent::release(9)).is_empty());
        assert!(!session.combo(0).is_active());

        assert_eq!(session.apply(&JsEvent::press(9)), vec![0]);
    }

    #[test]
    fn test_repeated_events_while_held_fire_once() {
        let mut session = session(&[(&[0, 1], "cmd")]);

        let mut fired = 0;
        for event in [
            JsEvent::press(0),
            JsEvent::press(1),
            JsEvent::press(1),
            JsEvent::press(0),
            JsEvent::press(4),
            JsEvent::release(4),
        ] {
            fired += session.apply(&event).len();
        }
        assert_eq!(fired, 1);
    }

    #[test]
    fn test_unreferenced_button_never_fires() {
        let mut session = session(&[(&[0, 1], "cmd")]);
        for index in 2..12u8 {
            assert!(session.apply(&JsEvent::press(index)).is_empty());
            assert!(session.apply(&JsEvent::release(index)).is_empty());
        }
    }

    #[test]
    fn test_overlapping_combos_fire_in_load_order() {
        let mut session = session(&[(&[0, 1], "first"), (&[1], "second"), (&[1, 2], "third")]);

        session.apply(&JsEvent::press(0));
        assert_eq!(session.apply(&JsEvent::press(1)), vec![0, 1]);
    }

    #[test]
    fn test_out_of_range_event_ignored() {
        let mut session = session(&[(&[0], "cmd")]);
        assert!(session.apply(&JsEvent::press(200)).is_empty());
        assert!(!session.is_pressed(200));
    }

    #[test]
    fn test_axis_and_odd_values_ignored() {
        let mut session = session(&[(&[0], "cmd")]);
        let axis = JsEvent {
            kind: crate::device::EventKind::Axis,
            ..JsEvent::press(0)
        };
        assert!(session.apply(&axis).is_empty());
        assert!(session.apply(&JsEvent::button_record(0, 7, false)).is_empty());
        assert!(!session.is_pressed(0));
    }

    #[test]
    fn test_initial_state_arms_without_firing() {
        let mut session = session(&[(&[0, 1], "cmd")]);

        assert!(session.apply(&JsEvent::button_record(0, 1, true)).is_empty());
        assert!(session.apply(&JsEvent::button_record(1, 1, true)).is_empty());
        assert!(session.combo(0).is_active());

        // Held through the plug-in: no dispatch until released and pressed again
        assert!(session.apply(&JsEvent::press(1)).is_empty());
        assert!(session.apply(&JsEvent::release(1)).is_empty());
        assert_eq!(session.apply(&JsEvent::press(1)), vec![0]);
    }
}
