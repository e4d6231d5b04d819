//! Registry of live device sessions
//!
//! The registry owns every [`Session`] together with the handle it reads
//! from. Sessions are keyed by [`SessionId`] (iteration order is registration
//! order) and deduplicated by device path.
//!
//! # Lifecycle
//!
//! - The discovery scanner calls [`Registry::register`] for each newly opened
//!   device. Registering a path that is already live is a no-op.
//! - The event loop calls [`Registry::evict`] when a read reports that the
//!   device is gone. The handle is dropped (closing the device) and the
//!   path becomes free for the next scan.
//! - [`Registry::teardown`] evicts everything on shutdown.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::combo::Combo;
use crate::session::{Session, SessionId};

/// A live session and the handle it reads events from
#[derive(Debug)]
pub struct Entry<H> {
    pub session: Session,
    pub handle: H,
}

#[derive(Debug)]
pub struct Registry<H> {
    entries: BTreeMap<SessionId, Entry<H>>,
    by_path: HashMap<PathBuf, SessionId>,
    next_id: u64,
}

impl<H> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> Registry<H> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            by_path: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a live session already owns `path`
    pub fn contains_path(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    /// Create a session for a newly opened device.
    ///
    /// Returns `None` (and drops `handle`) if `path` already has a live
    /// session.
    pub fn register(
        &mut self,
        path: PathBuf,
        name: String,
        button_count: usize,
        combos: Vec<Combo>,
        handle: H,
    ) -> Option<SessionId> {
        if self.by_path.contains_key(&path) {
            tracing::debug!("{} is already registered, ignoring", path.display());
            return None;
        }

        let id = SessionId(self.next_id);
        self.next_id += 1;

        let session = Session::new(id, path.clone(), name, button_count, combos);
        tracing::info!(
            "Device '{}' connected at {} ({} buttons, {} combo(s), session {})",
            session.name(),
            session.path().display(),
            session.button_count(),
            session.combos().len(),
            session.id()
        );

        self.by_path.insert(path, id);
        self.entries.insert(id, Entry { session, handle });

        Some(id)
    }

    /// Remove a session and close its handle.
    ///
    /// Returns the evicted session, or `None` if it was already gone.
    pub fn evict(&mut self, id: SessionId) -> Option<Session> {
        let Entry { session, handle } = self.entries.remove(&id)?;
        self.by_path.remove(session.path());
        drop(handle);

        tracing::info!(
            "Device '{}' disconnected from {} (session {})",
            session.name(),
            session.path().display(),
            session.id()
        );

        Some(session)
    }

    /// Evict every session. Returns how many were live.
    pub fn teardown(&mut self) -> usize {
        let ids: Vec<SessionId> = self.entries.keys().copied().collect();
        for &id in &ids {
            self.evict(id);
        }
        ids.len()
    }

    #[allow(dead_code)]
    pub fn get(&self, id: SessionId) -> Option<&Entry<H>> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: SessionId) -> Option<&mut Entry<H>> {
        self.entries.get_mut(&id)
    }

    /// Handles of all live sessions, in registration order
    pub fn handles(&self) -> impl Iterator<Item = (SessionId, &H)> {
        self.entries.iter().map(|(id, entry)| (*id, &entry.handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::JsEvent;
    use joycmd_config::ComboDef;

    fn combos() -> Vec<Combo> {
        vec![Combo::from_def(
            &ComboDef {
                buttons: vec![9, 10],
                command: "cmd-A".to_string(),
            },
            12,
        )
        .unwrap()]
    }

    fn register(registry: &mut Registry<()>, path: &str, name: &str) -> Option<SessionId> {
        registry.register(PathBuf::from(path), name.to_string(), 12, combos(), ())
    }

    #[test]
    fn test_register_rejects_duplicate_path() {
        let mut registry = Registry::new();

        let first = register(&mut registry, "/dev/input/js0", "Pad1");
        assert!(first.is_some());
        assert!(register(&mut registry, "/dev/input/js0", "Pad1").is_none());
        assert_eq!(registry.len(), 1);
        assert!(registry.contains_path(Path::new("/dev/input/js0")));
    }

    #[test]
    fn test_evict_is_idempotent() {
        let mut registry = Registry::new();
        let id = register(&mut registry, "/dev/input/js0", "Pad1").unwrap();

        let evicted = registry.evict(id).unwrap();
        assert_eq!(evicted.name(), "Pad1");
        assert!(registry.evict(id).is_none());
        assert!(registry.is_empty());
        assert!(!registry.contains_path(Path::new("/dev/input/js0")));
    }

    #[test]
    fn test_reregister_after_evict_starts_fresh() {
        let mut registry = Registry::new();
        let old = register(&mut registry, "/dev/input/js0", "Pad1").unwrap();

        {
            let entry = registry.get_mut(old).unwrap();
            entry.session.apply(&JsEvent::press(9));
            assert_eq!(entry.session.apply(&JsEvent::press(10)), vec![0]);
        }
        registry.evict(old);

        let new = register(&mut registry, "/dev/input/js0", "Pad1").unwrap();
        assert_ne!(old, new);

        let session = &registry.get(new).unwrap().session;
        assert!(!session.is_pressed(9));
        assert!(!session.is_pressed(10));
        assert!(session.combos().iter().all(|combo| !combo.is_active()));
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut registry = Registry::new();
        let pad1 = register(&mut registry, "/dev/input/js0", "Pad1").unwrap();
        let pad2 = register(&mut registry, "/dev/input/js1", "Pad2").unwrap();

        {
            let session = &mut registry.get_mut(pad1).unwrap().session;
            session.apply(&JsEvent::press(9));
            assert_eq!(session.apply(&JsEvent::press(10)), vec![0]);
        }

        let other = &registry.get(pad2).unwrap().session;
        assert!(!other.is_pressed(9));
        assert!(!other.is_pressed(10));
        assert!(!other.combo(0).is_active());
    }

    #[test]
    fn test_iteration_follows_registration_order() {
        let mut registry = Registry::new();
        register(&mut registry, "/dev/input/js3", "C");
        register(&mut registry, "/dev/input/js0", "A");
        register(&mut registry, "/dev/input/js1", "B");

        let names: Vec<&str> = registry
            .handles()
            .map(|(id, _)| registry.get(id).unwrap().session.name())
            .collect();
        assert_eq!(names, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_teardown_evicts_everything() {
        let mut registry = Registry::new();
        register(&mut registry, "/dev/input/js0", "Pad1");
        register(&mut registry, "/dev/input/js1", "Pad2");

        assert_eq!(registry.teardown(), 2);
        assert!(registry.is_empty());
        assert_eq!(registry.handles().count(), 0);
    }
}
