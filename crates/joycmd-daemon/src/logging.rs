//! Tracing setup
//!
//! The subscriber is installed before the configuration is read so parse
//! warnings are not lost. Its filter sits behind a reload layer: once the
//! configuration is loaded, `log-level` replaces the startup filter unless
//! `--debug` or `RUST_LOG` chose the level.

use joycmd_config::LogLevel;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Level used until the configuration has been read
const STARTUP_LEVEL: &str = "info";

/// Handle for adjusting the filter after startup
pub struct LogControl {
    handle: reload::Handle<EnvFilter, Registry>,
    /// Set when `--debug` or `RUST_LOG` picked the filter
    pinned: bool,
}

impl LogControl {
    /// Switch to the configured level, unless the command line or the
    /// environment already picked one.
    pub fn apply_config_level(&self, level: LogLevel) {
        if self.pinned {
            return;
        }
        if let Err(e) = self.handle.reload(EnvFilter::new(level.as_filter())) {
            tracing::warn!("Could not apply log-level '{}': {}", level.as_filter(), e);
        }
    }
}

/// `--debug` wins over `RUST_LOG`, which wins over the startup level.
///
/// The flag tells whether the choice should survive the configured level.
pub fn startup_filter(debug: bool) -> (EnvFilter, bool) {
    if debug {
        return (EnvFilter::new("debug"), true);
    }
    match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(STARTUP_LEVEL), false),
    }
}

/// Build the fmt subscriber with a reloadable filter.
pub fn build_subscriber<W>(
    filter: EnvFilter,
    pinned: bool,
    writer: W,
) -> (impl Subscriber + Send + Sync + 'static, LogControl)
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    let (filter, handle) = reload::Layer::new(filter);
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer));

    (subscriber, LogControl { handle, pinned })
}

/// Install the global subscriber, writing to stderr.
pub fn init(debug: bool) -> LogControl {
    let (filter, pinned) = startup_filter(debug);
    let (subscriber, control) = build_subscriber(filter, pinned, std::io::stderr);
    subscriber.init();
    control
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    /// In-memory log sink
    #[derive(Clone, Default)]
    pub(crate) struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    pub(crate) fn capturing(
        filter: &str,
        pinned: bool,
    ) -> (impl Subscriber + Send + Sync + 'static, LogControl, Capture) {
        let capture = Capture::default();
        let writer = capture.clone();
        let (subscriber, control) =
            build_subscriber(EnvFilter::new(filter), pinned, move || writer.clone());
        (subscriber, control, capture)
    }

    #[test]
    fn test_debug_flag_pins_filter() {
        let (_, pinned) = startup_filter(true);
        assert!(pinned);
    }

    #[test]
    fn test_configured_level_replaces_startup_filter() {
        let (subscriber, control, capture) = capturing(STARTUP_LEVEL, false);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("before reload");
            control.apply_config_level(LogLevel::Warn);
            tracing::info!("hidden after reload");
            tracing::warn!("shown after reload");
        });

        let out = capture.contents();
        assert!(out.contains("before reload"));
        assert!(!out.contains("hidden after reload"));
        assert!(out.contains("shown after reload"));
    }

    #[test]
    fn test_pinned_filter_ignores_configured_level() {
        let (subscriber, control, capture) = capturing("debug", true);

        tracing::subscriber::with_default(subscriber, || {
            control.apply_config_level(LogLevel::Error);
            tracing::debug!("still visible");
        });

        assert!(capture.contents().contains("still visible"));
    }
}
