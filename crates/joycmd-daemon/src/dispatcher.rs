//! Running the commands of fired combos
//!
//! [`CommandDispatcher`] runs each command as `<shell> -c <command>`. Exit
//! statuses are never reported back to the event loop.
//!
//! In queued mode the event loop only pushes a [`DispatchRequest`] onto a
//! channel; a worker task owns process spawning and reaping, so a slow
//! command cannot hold up input from any device. On shutdown the channel is
//! closed, the worker starts whatever is still queued and waits (up to a
//! grace period) for running commands before returning.
//!
//! Blocking mode runs the command on the event loop and waits for it.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use joycmd_config::DispatchMode;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};

/// A command to run on behalf of a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub device: String,
    pub command: String,
}

impl DispatchRequest {
    pub fn new(device: &str, command: &str) -> Self {
        Self {
            device: device.to_string(),
            command: command.to_string(),
        }
    }
}

/// Receiver of fired combos
pub trait Dispatch {
    fn dispatch(&self, request: DispatchRequest);
}

pub struct CommandDispatcher {
    mode: Mode,
}

enum Mode {
    Queued {
        queue: mpsc::UnboundedSender<DispatchRequest>,
        worker: JoinHandle<()>,
    },
    Blocking {
        shell: PathBuf,
    },
}

impl CommandDispatcher {
    /// Create a dispatcher for the configured mode.
    ///
    /// Queued mode spawns its worker task, so this must run inside a tokio
    /// runtime.
    pub fn new(mode: DispatchMode, shell: PathBuf, shutdown_grace: Duration) -> Self {
        match mode {
            DispatchMode::Queued => Self::queued(shell, shutdown_grace),
            DispatchMode::Blocking => Self::blocking(shell),
        }
    }

    pub fn queued(shell: PathBuf, shutdown_grace: Duration) -> Self {
        let (queue, requests) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(requests, shell, shutdown_grace));
        Self {
            mode: Mode::Queued { queue, worker },
        }
    }

    pub fn blocking(shell: PathBuf) -> Self {
        Self {
            mode: Mode::Blocking { shell },
        }
    }

    /// Stop accepting requests and drain the worker.
    pub async fn shutdown(self) {
        if let Mode::Queued { queue, worker } = self.mode {
            drop(queue);
            if let Err(e) = worker.await {
                tracing::error!("Command worker failed: {}", e);
            }
        }
    }
}

impl Dispatch for CommandDispatcher {
    fn dispatch(&self, request: DispatchRequest) {
        match &self.mode {
            Mode::Queued { queue, .. } => {
                if let Err(e) = queue.send(request) {
                    tracing::warn!("Command worker is gone, dropping '{}'", e.0.command);
                }
            }
            Mode::Blocking { shell } => run_blocking(shell, &request),
        }
    }
}

async fn run_worker(
    mut requests: mpsc::UnboundedReceiver<DispatchRequest>,
    shell: PathBuf,
    shutdown_grace: Duration,
) {
    let mut running = JoinSet::new();

    while let Some(request) = requests.recv().await {
        spawn_command(&shell, &request, &mut running);
        // Reap whatever already finished
        while running.try_join_next().is_some() {}
    }

    if running.is_empty() {
        return;
    }

    tracing::debug!("Waiting for {} running command(s)", running.len());
    let drained = tokio::time::timeout(shutdown_grace, async {
        while running.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        tracing::warn!(
            "{} command(s) still running at shutdown, leaving them behind",
            running.len()
        );
        running.detach_all();
    }
}

fn spawn_command(shell: &Path, request: &DispatchRequest, running: &mut JoinSet<()>) {
    tracing::debug!("Executing: {} (device '{}')", request.command, request.device);

    let spawned = tokio::process::Command::new(shell)
        .arg("-c")
        .arg(&request.command)
        .stdin(Stdio::null())
        .spawn();

    match spawned {
        Ok(mut child) => {
            running.spawn(async move {
                let _ = child.wait().await;
            });
        }
        Err(e) => {
            tracing::debug!("Could not run '{}': {}", request.command, e);
        }
    }
}

fn run_blocking(shell: &Path, request: &DispatchRequest) {
    tracing::debug!("Executing: {} (device '{}')", request.command, request.device);

    if let Err(e) = std::process::Command::new(shell)
        .arg("-c")
        .arg(&request.command)
        .stdin(Stdio::null())
        .status()
    {
        tracing::debug!("Could not run '{}': {}", request.command, e);
    }
}
