//! Waiting for input across all sessions and draining it
//!
//! One pass of the event loop looks like this:
//!
//! ```text
//!  Wait ──timeout──────────────────────────────► (back to the loop)
//!   │
//!   └─ready─► DrainEvents ─► MatchUpdate* ─────► (back to the loop)
//!                  │
//!                  └─device gone─► Evict ──────► (back to the loop)
//! ```
//!
//! [`Multiplexer::wait`] is the only place the event loop suspends. Draining
//! and matching run to completion without yielding.

use std::io;
use std::time::Duration;

use futures::future::{select_all, FutureExt};

use crate::device::{DeviceHealth, EventKind, EventSource, ReadOutcome};
use crate::dispatcher::{Dispatch, DispatchRequest};
use crate::registry::{Entry, Registry};
use crate::session::SessionId;

/// Result of one bounded wait
#[derive(Debug)]
pub enum WaitOutcome {
    /// Nothing became readable in time
    Timeout,
    /// Sessions with pending input, in registry order
    Ready(Vec<SessionId>),
    /// The readiness primitive itself failed
    Failed(io::Error),
}

#[derive(Debug, Clone, Copy)]
pub struct Multiplexer {
    timeout: Duration,
}

impl Multiplexer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait up to `limit` (capped at the configured timeout) for any session
    /// to become readable.
    pub async fn wait<H: EventSource>(&self, registry: &Registry<H>, limit: Duration) -> WaitOutcome {
        let limit = limit.min(self.timeout);

        if registry.is_empty() {
            tokio::time::sleep(limit).await;
            return WaitOutcome::Timeout;
        }

        let waits: Vec<_> = registry
            .handles()
            .map(|(id, handle)| Box::pin(async move { handle.readable().await.map(|()| id) }))
            .collect();

        match tokio::time::timeout(limit, select_all(waits)).await {
            Err(_) => WaitOutcome::Timeout,
            Ok((Err(e), _, _)) => WaitOutcome::Failed(e),
            Ok((Ok(first), _, pending)) => {
                let mut ready = vec![first];
                // Pick up every other session that is readable right now
                for wait in pending {
                    if let Some(Ok(id)) = wait.now_or_never() {
                        ready.push(id);
                    }
                }
                ready.sort();
                WaitOutcome::Ready(ready)
            }
        }
    }
}

/// Read every pending record of one session and run it through the matcher.
///
/// Stops at the first `WouldBlock` (healthy) or `Disconnected` (gone).
pub fn drain<H: EventSource>(entry: &mut Entry<H>, dispatcher: &dyn Dispatch) -> DeviceHealth {
    loop {
        match entry.handle.read_event() {
            ReadOutcome::Event(event) => {
                if let EventKind::Other(raw) = event.kind {
                    tracing::trace!("Ignoring record of type {:#04x}", raw);
                }
                if let Some((index, pressed)) = event.button() {
                    tracing::debug!(
                        "Button {} {} on '{}'{}",
                        index,
                        if pressed { "pressed" } else { "released" },
                        entry.session.name(),
                        if event.initial { " (initial state)" } else { "" }
                    );
                }

                for fired in entry.session.apply(&event) {
                    let combo = entry.session.combo(fired);
                    dispatcher.dispatch(DispatchRequest::new(entry.session.name(), combo.command()));
                }
            }
            ReadOutcome::WouldBlock => return DeviceHealth::Open,
            ReadOutcome::Disconnected => return DeviceHealth::Disconnected,
        }
    }
}

/// Drain the ready sessions in order, evicting any that disconnected.
///
/// Returns the ids of evicted sessions.
pub fn service_ready<H: EventSource>(
    registry: &mut Registry<H>,
    ready: &[SessionId],
    dispatcher: &dyn Dispatch,
) -> Vec<SessionId> {
    let mut evicted = Vec::new();

    for &id in ready {
        let Some(entry) = registry.get_mut(id) else {
            continue;
        };
        if drain(entry, dispatcher) == DeviceHealth::Disconnected {
            registry.evict(id);
            evicted.push(id);
        }
    }

    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Write;
    use std::path::PathBuf;

    use joycmd_config::ComboDef;

    use crate::combo::Combo;
    use crate::device::{handle_pair, JoystickHandle, JsEvent};
    use crate::dispatcher::tests::RecordingDispatch;

    /// Scripted source: records, then WouldBlock or Disconnected once empty
    struct Script {
        outcomes: VecDeque<ReadOutcome>,
        then: ReadOutcome,
    }

    impl Script {
        fn new(events: &[JsEvent], then: ReadOutcome) -> Self {
            Self {
                outcomes: events.iter().copied().map(ReadOutcome::Event).collect(),
                then,
            }
        }
    }

    impl EventSource for Script {
        async fn readable(&self) -> io::Result<()> {
            Ok(())
        }

        fn read_event(&mut self) -> ReadOutcome {
            self.outcomes.pop_front().unwrap_or(self.then)
        }
    }

    fn combos(defs: &[(&[i64], &str)]) -> Vec<Combo> {
        defs.iter()
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
            .collect()
    }

    fn register<H>(registry: &mut Registry<H>, path: &str, name: &str, handle: H) -> SessionId {
        registry
            .register(
                PathBuf::from(path),
                name.to_string(),
                12,
                combos(&[(&[9, 10], "cmd-A")]),
                handle,
            )
            .unwrap()
    }

    fn write_events(writer: &mut std::os::unix::net::UnixStream, events: &[JsEvent]) {
        for event in events {
            writer.write_all(&event.encode()).unwrap();
        }
    }

    #[test]
    fn test_drain_dispatches_once_per_hold() {
        let mut registry = Registry::new();
        let script = Script::new(
            &[
                JsEvent::press(9),
                JsEvent::press(10),
                JsEvent::press(10),
                JsEvent::release(9),
                JsEvent::press(9),
            ],
            ReadOutcome::WouldBlock,
        );
        let id = register(&mut registry, "/dev/input/js0", "Pad1", script);
        let dispatcher = RecordingDispatch::default();

        let health = drain(registry.get_mut(id).unwrap(), &dispatcher);

        assert_eq!(health, DeviceHealth::Open);
        assert_eq!(dispatcher.commands(), vec!["cmd-A", "cmd-A"]);
        assert_eq!(dispatcher.requests.borrow()[0].device, "Pad1");
    }

    #[test]
    fn test_disconnect_evicts_and_stops_draining() {
        let mut registry = Registry::new();
        let mut script = Script::new(&[JsEvent::press(9)], ReadOutcome::Disconnected);
        // Records queued after the disconnect must never be seen
        script.outcomes.push_back(ReadOutcome::Disconnected);
        script
            .outcomes
            .push_back(ReadOutcome::Event(JsEvent::press(10)));
        let id = register(&mut registry, "/dev/input/js0", "Pad1", script);
        let dispatcher = RecordingDispatch::default();

        let evicted = service_ready(&mut registry, &[id], &dispatcher);

        assert_eq!(evicted, vec![id]);
        assert!(registry.is_empty());
        assert!(dispatcher.commands().is_empty());
    }

    #[test]
    fn test_service_ready_skips_unknown_ids() {
        let mut registry: Registry<Script> = Registry::new();
        let dispatcher = RecordingDispatch::default();
        let evicted = service_ready(&mut registry, &[SessionId(42)], &dispatcher);
        assert!(evicted.is_empty());
    }

    #[test]
    fn test_firing_on_one_device_leaves_other_untouched() {
        let mut registry = Registry::new();
        let pad1 = register(
            &mut registry,
            "/dev/input/js0",
            "Pad1",
            Script::new(&[JsEvent::press(9), JsEvent::press(10)], ReadOutcome::WouldBlock),
        );
        let pad2 = register(
            &mut registry,
            "/dev/input/js1",
            "Pad2",
            Script::new(&[], ReadOutcome::WouldBlock),
        );
        let dispatcher = RecordingDispatch::default();

        service_ready(&mut registry, &[pad1, pad2], &dispatcher);

        assert_eq!(dispatcher.commands(), vec!["cmd-A"]);
        let other = &registry.get(pad2).unwrap().session;
        assert!(!other.is_pressed(9));
        assert!(!other.combo(0).is_active());
    }

    #[tokio::test]
    async fn test_wait_times_out_without_input() {
        let mut registry = Registry::new();
        let (handle, _writer) = handle_pair();
        register(&mut registry, "/dev/input/js0", "Pad1", handle);

        let multiplexer = Multiplexer::new(Duration::from_millis(50));
        let outcome = multiplexer.wait(&registry, Duration::from_secs(10)).await;
        assert!(matches!(outcome, WaitOutcome::Timeout));
    }

    #[tokio::test]
    async fn test_wait_with_no_sessions_times_out() {
        let registry: Registry<JoystickHandle> = Registry::new();
        let multiplexer = Multiplexer::new(Duration::from_millis(20));
        let outcome = multiplexer.wait(&registry, Duration::from_secs(1)).await;
        assert!(matches!(outcome, WaitOutcome::Timeout));
    }

    #[tokio::test]
    async fn test_wait_reports_all_ready_sessions_in_order() {
        let mut registry = Registry::new();
        let (handle1, mut writer1) = handle_pair();
        let (handle2, _writer2) = handle_pair();
        let (handle3, mut writer3) = handle_pair();
        let first = register(&mut registry, "/dev/input/js0", "Pad1", handle1);
        register(&mut registry, "/dev/input/js1", "Pad2", handle2);
        let third = register(&mut registry, "/dev/input/js2", "Pad3", handle3);

        write_events(&mut writer3, &[JsEvent::press(1)]);
        write_events(&mut writer1, &[JsEvent::press(1)]);

        let multiplexer = Multiplexer::new(Duration::from_secs(1));
        match multiplexer.wait(&registry, Duration::from_secs(1)).await {
            WaitOutcome::Ready(ids) => assert_eq!(ids, vec![first, third]),
            other => panic!("Expected Ready, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_real_handle_cycle_with_unplug() {
        let mut registry = Registry::new();
        let (handle, mut writer) = handle_pair();
        let id = register(&mut registry, "/dev/input/js0", "Pad1", handle);
        let multiplexer = Multiplexer::new(Duration::from_secs(1));
        let dispatcher = RecordingDispatch::default();

        write_events(&mut writer, &[JsEvent::press(9), JsEvent::press(10)]);
        let WaitOutcome::Ready(ready) = multiplexer.wait(&registry, Duration::from_secs(1)).await
        else {
            panic!("Expected input");
        };
        assert!(service_ready(&mut registry, &ready, &dispatcher).is_empty());
        assert_eq!(dispatcher.commands(), vec!["cmd-A"]);

        // Unplug mid-hold
        drop(writer);
        let WaitOutcome::Ready(ready) = multiplexer.wait(&registry, Duration::from_secs(1)).await
        else {
            panic!("Expected hang-up to wake the wait");
        };
        assert_eq!(service_ready(&mut registry, &ready, &dispatcher), vec![id]);
        assert!(registry.is_empty());
        assert_eq!(dispatcher.commands(), vec!["cmd-A"]);
    }
}
