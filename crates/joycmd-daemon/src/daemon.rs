//! The joycmd event loop
//!
//! [`Daemon`] ties discovery, waiting, draining and dispatch together. Each
//! [`Daemon::step`] runs a scan when one is due, then waits for input no
//! longer than the poll timeout or the time left until the next scan,
//! whichever is shorter.

use joycmd_config::Config;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::device::{DeviceProbe, EventSource};
use crate::dispatcher::Dispatch;
use crate::multiplexer::{service_ready, Multiplexer, WaitOutcome};
use crate::registry::Registry;
use crate::scanner::Scanner;

pub struct Daemon<P: DeviceProbe, D> {
    config: Config,
    registry: Registry<P::Handle>,
    scanner: Scanner<P>,
    multiplexer: Multiplexer,
    dispatcher: D,
}

impl<P, D> Daemon<P, D>
where
    P: DeviceProbe,
    P::Handle: EventSource,
    D: Dispatch,
{
    pub fn new(config: Config, probe: P, dispatcher: D) -> Self {
        let scanner = Scanner::new(
            probe,
            &config.global.device_prefix,
            config.global.max_devices,
            config.global.scan_interval,
        );
        let multiplexer = Multiplexer::new(config.global.poll_timeout);

        Self {
            config,
            registry: Registry::new(),
            scanner,
            multiplexer,
            dispatcher,
        }
    }

    #[allow(dead_code)]
    pub fn registry(&self) -> &Registry<P::Handle> {
        &self.registry
    }

    pub fn into_dispatcher(self) -> D {
        self.dispatcher
    }

    /// One iteration of the event loop
    pub async fn step(&mut self) {
        if self.scanner.is_due(Instant::now()) {
            let added = self.scanner.scan(&mut self.registry, &self.config);
            if !added.is_empty() {
                tracing::debug!("{} device(s) live", self.registry.len());
            }
        }

        let limit = self.scanner.until_due(Instant::now());
        match self.multiplexer.wait(&self.registry, limit).await {
            WaitOutcome::Timeout => {}
            WaitOutcome::Ready(ready) => {
                service_ready(&mut self.registry, &ready, &self.dispatcher);
            }
            WaitOutcome::Failed(e) => {
                tracing::error!("Waiting for joystick input failed: {}", e);
                tokio::time::sleep(self.multiplexer.timeout()).await;
            }
        }
    }

    /// Run until `shutdown` turns true (or its sender goes away), then close
    /// every device.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Watching {} device path(s) starting at {}0",
            self.scanner.candidates().len(),
            self.config.global.device_prefix
        );

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = self.step() => {}
            }
        }

        let closed = self.registry.teardown();
        tracing::info!("Closed {} device(s)", closed);
    }
}
