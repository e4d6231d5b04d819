//! Joystick device access
//!
//! Devices are the kernel joystick interface (`/dev/input/jsN`). Each open
//! device is a non-blocking file registered with the tokio reactor, and every
//! read is reported as a tagged [`ReadOutcome`] so callers never inspect
//! `errno` to notice that a device went away.

use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{self, Read};
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use joycmd_config::joystick::{query_button_count, query_name, FALLBACK_NAME};
use nix::fcntl::OFlag;
use thiserror::Error;
use tokio::io::unix::AsyncFd;

/// Size of a `struct js_event` record
pub const EVENT_SIZE: usize = 8;

/// Button count assumed for devices that refuse the button-count query
pub const FALLBACK_BUTTON_COUNT: usize = 32;

const JS_EVENT_BUTTON: u8 = 0x01;
const JS_EVENT_AXIS: u8 = 0x02;
const JS_EVENT_INIT: u8 = 0x80;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to watch {path} for input: {source}")]
    Register {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DeviceError {
    /// True when the device node simply does not exist (nothing plugged in).
    pub fn is_absent(&self) -> bool {
        match self {
            DeviceError::Open { source, .. } => source.kind() == io::ErrorKind::NotFound,
            DeviceError::Register { .. } => false,
        }
    }
}

/// Kind of a joystick event record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Button,
    Axis,
    Other(u8),
}

/// A decoded `struct js_event`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsEvent {
    /// Event timestamp in milliseconds
    #[allow(dead_code)]
    pub time: u32,
    pub value: i16,
    pub kind: EventKind,
    /// Button or axis number
    pub number: u8,
    /// Synthetic record describing the state at open time
    pub initial: bool,
}

impl JsEvent {
    pub fn decode(buf: &[u8; EVENT_SIZE]) -> Self {
        let raw_type = buf[6];
        let kind = match raw_type & !JS_EVENT_INIT {
            JS_EVENT_BUTTON => EventKind::Button,
            JS_EVENT_AXIS => EventKind::Axis,
            other => EventKind::Other(other),
        };

        Self {
            time: u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]),
            value: i16::from_ne_bytes([buf[4], buf[5]]),
            kind,
            number: buf[7],
            initial: raw_type & JS_EVENT_INIT != 0,
        }
    }

    /// `(index, pressed)` for button records with a value of 0 or 1.
    ///
    /// Axis records and out-of-protocol values yield `None`.
    pub fn button(&self) -> Option<(usize, bool)> {
        if self.kind != EventKind::Button {
            return None;
        }
        match self.value {
            0 => Some((self.number as usize, false)),
            1 => Some((self.number as usize, true)),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn encode(&self) -> [u8; EVENT_SIZE] {
        let mut raw_type = match self.kind {
            EventKind::Button => JS_EVENT_BUTTON,
            EventKind::Axis => JS_EVENT_AXIS,
            EventKind::Other(other) => other,
        };
        if self.initial {
            raw_type |= JS_EVENT_INIT;
        }

        let mut buf = [0u8; EVENT_SIZE];
        buf[0..4].copy_from_slice(&self.time.to_ne_bytes());
        buf[4..6].copy_from_slice(&self.value.to_ne_bytes());
        buf[6] = raw_type;
        buf[7] = self.number;
        buf
    }

    #[cfg(test)]
    pub fn press(number: u8) -> Self {
        Self::button_record(number, 1, false)
    }

    #[cfg(test)]
    pub fn release(number: u8) -> Self {
        Self::button_record(number, 0, false)
    }

    #[cfg(test)]
    pub fn button_record(number: u8, value: i16, initial: bool) -> Self {
        Self {
            time: 0,
            value,
            kind: EventKind::Button,
            number,
            initial,
        }
    }
}

/// Result of a single non-blocking read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Event(JsEvent),
    /// Nothing more to read right now
    WouldBlock,
    /// The device is gone; the handle is useless from now on
    Disconnected,
}

/// Health of an open device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceHealth {
    Open,
    Disconnected,
}

/// Anything that yields joystick records without blocking
pub trait EventSource {
    /// Wait until there is input (or a hang-up) to read.
    ///
    /// Readiness is cleared before returning: the caller is expected to read
    /// until [`ReadOutcome::WouldBlock`], which re-arms the notification.
    fn readable(&self) -> impl Future<Output = io::Result<()>>;

    fn read_event(&mut self) -> ReadOutcome;
}

/// An open joystick registered for readiness notifications
#[derive(Debug)]
pub struct JoystickHandle {
    fd: AsyncFd<File>,
}

impl JoystickHandle {
    /// Wrap an already non-blocking descriptor.
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_owned_fd(fd: OwnedFd) -> io::Result<Self> {
        Ok(Self {
            fd: AsyncFd::new(File::from(fd))?,
        })
    }
}

impl EventSource for JoystickHandle {
    async fn readable(&self) -> io::Result<()> {
        let mut guard = self.fd.readable().await?;
        guard.clear_ready();
        Ok(())
    }

    fn read_event(&mut self) -> ReadOutcome {
        let mut buf = [0u8; EVENT_SIZE];
        loop {
            match self.fd.get_mut().read(&mut buf) {
                Ok(EVENT_SIZE) => return ReadOutcome::Event(JsEvent::decode(&buf)),
                Ok(0) => return ReadOutcome::Disconnected,
                Ok(n) => {
                    tracing::warn!("Discarding short joystick record ({} bytes)", n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return ReadOutcome::WouldBlock,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    tracing::debug!("Joystick read failed: {}", e);
                    return ReadOutcome::Disconnected;
                }
            }
        }
    }
}

/// A freshly opened device, ready to be registered
#[derive(Debug)]
pub struct OpenedDevice<H> {
    pub name: String,
    pub button_count: usize,
    pub handle: H,
}

/// Opens candidate device paths
pub trait DeviceProbe {
    type Handle;

    fn open(&self, path: &Path) -> Result<OpenedDevice<Self::Handle>, DeviceError>;
}

/// Probe for kernel joystick devices
#[derive(Debug, Default, Clone, Copy)]
pub struct JoystickProbe;

impl DeviceProbe for JoystickProbe {
    type Handle = JoystickHandle;

    fn open(&self, path: &Path) -> Result<OpenedDevice<JoystickHandle>, DeviceError> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(OFlag::O_NONBLOCK.bits())
            .open(path)
            .map_err(|source| DeviceError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let name = query_name(&file).unwrap_or_else(|| FALLBACK_NAME.to_string());
        let button_count = query_button_count(&file).unwrap_or(FALLBACK_BUTTON_COUNT);

        let handle =
            JoystickHandle::from_owned_fd(OwnedFd::from(file)).map_err(|source| {
                DeviceError::Register {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

        Ok(OpenedDevice {
            name,
            button_count,
            handle,
        })
    }
}

/// A connected pair: the handle end, and a writer end standing in for the kernel
#[cfg(test)]
pub(crate) fn handle_pair() -> (JoystickHandle, std::os::unix::net::UnixStream) {
    let (reader, writer) = std::os::unix::net::UnixStream::pair().unwrap();
    reader.set_nonblocking(true).unwrap();
    let handle = JoystickHandle::from_owned_fd(OwnedFd::from(reader)).unwrap();
    (handle, writer)
}
