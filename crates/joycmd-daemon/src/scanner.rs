//! Periodic discovery of joystick devices
//!
//! The scanner probes a fixed range of device paths (`/dev/input/js0` ..
//! `/dev/input/js31` by default) and registers every device it can open that
//! is not already live. Paths that fail to open are retried on the next scan;
//! nothing is plugged in there most of the time.

use std::path::PathBuf;
use std::time::Duration;

use joycmd_config::joystick::candidate_paths;
use joycmd_config::Config;
use tokio::time::Instant;

use crate::combo::build_table;
use crate::device::DeviceProbe;
use crate::registry::Registry;
use crate::session::SessionId;

pub struct Scanner<P> {
    probe: P,
    candidates: Vec<PathBuf>,
    interval: Duration,
    last_scan: Option<Instant>,
}

impl<P: DeviceProbe> Scanner<P> {
    pub fn new(probe: P, device_prefix: &str, max_devices: u32, interval: Duration) -> Self {
        Self {
            probe,
            candidates: candidate_paths(device_prefix, max_devices),
            interval,
            last_scan: None,
        }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }

    /// Whether a scan is due at `now`. The first scan is always due.
    pub fn is_due(&self, now: Instant) -> bool {
        self.until_due(now).is_zero()
    }

    /// Time left until the next scan is due
    pub fn until_due(&self, now: Instant) -> Duration {
        match self.last_scan {
            Some(last) => (last + self.interval).saturating_duration_since(now),
            None => Duration::ZERO,
        }
    }

    /// Probe every candidate path that has no live session.
    ///
    /// Each opened device gets the combo table its name resolves to and is
    /// registered. Returns the ids of the new sessions.
    pub fn scan(&mut self, registry: &mut Registry<P::Handle>, config: &Config) -> Vec<SessionId> {
        self.last_scan = Some(Instant::now());

        let mut added = Vec::new();
        for path in &self.candidates {
            if registry.contains_path(path) {
                continue;
            }

            let opened = match self.probe.open(path) {
                Ok(opened) => opened,
                Err(e) if e.is_absent() => continue,
                Err(e) => {
                    tracing::debug!("Skipping {}: {}", path.display(), e);
                    continue;
                }
            };

            let (matched, _) = config.resolve(&opened.name);
            tracing::debug!(
                "Device '{}' at {} uses {:?} combo section",
                opened.name,
                path.display(),
                matched
            );

            let combos = build_table(
                config.combos_for(&opened.name),
                opened.button_count,
                &opened.name,
            );
            if combos.is_empty() {
                tracing::warn!("No combos configured for device '{}'", opened.name);
            }

            if let Some(id) = registry.register(
                path.clone(),
                opened.name,
                opened.button_count,
                combos,
                opened.handle,
            ) {
                added.push(id);
            }
        }

        added
    }
}
