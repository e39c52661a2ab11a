//! Structured logging facade.
//!
//! A [`Logger`] is built once at startup and cloned into whatever needs it.
//! It owns a `tracing` dispatcher wired to the [`TextFormat`] encoder and a
//! [`RotatingSink`], admitting `debug` and above. Nothing here is global:
//! events reach the sink only when emitted inside [`Logger::scope`].
//!
//! Two views:
//!
//! ```rust,no_run
//! use tracing::info;
//! use warden::{infof, Logger, SinkConfig};
//!
//! # fn main() -> Result<(), warden::Error> {
//! let logger = Logger::new(&SinkConfig::default())?;
//!
//! // structured: typed key/value fields
//! logger.scope(|| info!(url = "http://example.com", status = 200, "fetched"));
//!
//! // formatted: printf-style message
//! infof!(logger, "fetched {} with status {}", "http://example.com", 200);
//! # Ok(()) }
//! ```
//!
//! The sink writes each record as it is emitted and the logger is never torn
//! down explicitly.

mod config;
mod format;
mod sink;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Mutex;

use tracing::dispatcher::{self, Dispatch};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;

pub use config::SinkConfig;
pub use format::TextFormat;
pub use sink::RotatingSink;

use crate::error::Error;

/// Handle to the process-wide log destination. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Logger {
    dispatch: Dispatch,
}

impl Logger {
    /// Opens the rotating sink described by `config`.
    pub fn new(config: &SinkConfig) -> Result<Self, Error> {
        let sink = RotatingSink::open(config)?;
        Ok(Self::with_writer(Mutex::new(sink)))
    }

    /// Same encoder and level, any writer. `Mutex<W>` for a plain
    /// `io::Write`; `std::io::stdout` for the console.
    pub fn with_writer<W>(writer: W) -> Self
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(LevelFilter::DEBUG)
            .with_writer(writer)
            .event_format(TextFormat::default())
            .finish();
        Self { dispatch: Dispatch::new(subscriber) }
    }

    /// Runs `f` with this logger as the current `tracing` dispatcher.
    pub fn scope<T>(&self, f: impl FnOnce() -> T) -> T {
        dispatcher::with_default(&self.dispatch, f)
    }

    /// Also route events emitted outside any [`scope`](Logger::scope), such
    /// as the server's own lifecycle events, to this logger. Fails if a
    /// global subscriber is already set.
    pub fn install_global(&self) -> Result<(), Error> {
        dispatcher::set_global_default(self.dispatch.clone())
            .map_err(|e| Error::Config(e.to_string()))
    }
}

/// `debug` record with a formatted message: `debugf!(logger, "hit {}", url)`.
#[macro_export]
macro_rules! debugf {
    ($logger:expr, $($arg:tt)+) => {
        $logger.scope(|| ::tracing::debug!($($arg)+))
    };
}

/// `info` record with a formatted message.
#[macro_export]
macro_rules! infof {
    ($logger:expr, $($arg:tt)+) => {
        $logger.scope(|| ::tracing::info!($($arg)+))
    };
}

/// `warn` record with a formatted message.
#[macro_export]
macro_rules! warnf {
    ($logger:expr, $($arg:tt)+) => {
        $logger.scope(|| ::tracing::warn!($($arg)+))
    };
}

/// `error` record with a formatted message.
#[macro_export]
macro_rules! errorf {
    ($logger:expr, $($arg:tt)+) => {
        $logger.scope(|| ::tracing::error!($($arg)+))
    };
}
